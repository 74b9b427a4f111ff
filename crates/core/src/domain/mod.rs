pub mod cart;
pub mod order;

pub use cart::{Cart, CartError, CartItem, ItemSource};
pub use order::{
    ChatContact, CustomerDetails, OrderError, OrderId, OrderLine, OrderRecord, OrderTotals,
};

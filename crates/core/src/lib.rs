pub mod audit;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod money;
pub mod pricing;
pub mod search;
pub mod session;
pub mod submission;

pub use currency::{ConversionUnavailable, CurrencyConverter, RateProvider, RateProviderError};
pub use domain::{
    Cart, CartError, CartItem, ChatContact, CustomerDetails, ItemSource, OrderId, OrderRecord,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DialogAction, DialogEvent, DialogState, FlowEngine, FlowTransitionError};
pub use money::{round_money, Currency, Money};
pub use pricing::{LandedCostEngine, PriceQuote, PricingEngine, PricingError, ShippingTier, Weight};
pub use search::{ProductListing, ProductSearch, SearchError};
pub use session::{Session, SessionId, SessionStore};
pub use submission::{
    OperatorNotifier, OrderStore, OrderSubmitter, SpreadsheetSink, SubmissionError,
    SubmissionReceipt,
};

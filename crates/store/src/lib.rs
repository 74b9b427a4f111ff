pub mod json_file;
pub mod memory;

pub use json_file::JsonFileOrderStore;
pub use memory::InMemoryOrderStore;

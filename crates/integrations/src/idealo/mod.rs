//! Product search on idealo.de, fetched through the ScrapingBee rendering proxy.

pub mod client;
pub mod parser;
pub mod selectors;

pub use client::ScrapingBeeSearch;
pub use parser::parse_listings;

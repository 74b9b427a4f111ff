use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One product hit from the external price-comparison search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    pub title: String,
    pub price: String,
    pub image_url: Option<String>,
    pub link: String,
    pub offers_count: Option<String>,
}

/// Provider outage. An empty result list is `Ok(vec![])`, never this error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("product search is temporarily unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductListing>, SearchError>;
}

/// Used when no search provider is configured.
#[derive(Clone, Debug, Default)]
pub struct DisabledSearch;

#[async_trait]
impl ProductSearch for DisabledSearch {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<ProductListing>, SearchError> {
        Err(SearchError::Unavailable("search provider is not configured".to_owned()))
    }
}

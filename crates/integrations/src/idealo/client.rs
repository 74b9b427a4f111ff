use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use landed_core::search::{ProductListing, ProductSearch, SearchError};

use super::parser::{parse_listings, IDEALO_ORIGIN};
use super::selectors::RESULT_CLASS;

const SEARCH_PATH: &str = "/preisvergleich/MainSearchProductCategory.html";

/// Renders idealo search pages through ScrapingBee and parses the result cards.
pub struct ScrapingBeeSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    target_origin: String,
}

impl ScrapingBeeSearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            target_origin: IDEALO_ORIGIN.to_owned(),
        })
    }

    /// Page URL handed to the renderer for `query`.
    pub fn target_url(&self, query: &str) -> Result<reqwest::Url, SearchError> {
        let page = format!("{}{SEARCH_PATH}", self.target_origin);
        reqwest::Url::parse_with_params(&page, &[("q", query)])
            .map_err(|error| SearchError::Unavailable(format!("invalid search url: {error}")))
    }
}

#[async_trait]
impl ProductSearch for ScrapingBeeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductListing>, SearchError> {
        let target = self.target_url(query)?;
        let wait_for = format!(".{RESULT_CLASS}");

        info!(event_name = "search.requested", query, limit, "searching idealo");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.expose_secret()),
                ("url", target.as_str()),
                ("premium_proxy", "true"),
                ("country_code", "de"),
                ("wait", "5000"),
                ("wait_for", wait_for.as_str()),
                ("wait_browser", "networkidle2"),
                ("block_resources", "false"),
            ])
            .send()
            .await
            .map_err(|error| {
                warn!(
                    event_name = "search.request_failed",
                    error = %error,
                    "search request failed"
                );
                SearchError::Unavailable(error.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                event_name = "search.provider_status",
                status = status.as_u16(),
                "search provider returned an error status"
            );
            return Err(SearchError::Unavailable(format!("provider status {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|error| SearchError::Unavailable(format!("unreadable body: {error}")))?;
        Ok(parse_listings(&html, limit))
    }
}

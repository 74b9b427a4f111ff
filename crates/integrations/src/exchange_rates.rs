use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use landed_core::currency::{RateProvider, RateProviderError};
use landed_core::money::Currency;

/// Client for `GET {base_url}/{BASE}` returning `{ "rates": { "RUB": 98.1, ... } }`.
pub struct ExchangeRateApiProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    rates: HashMap<String, f64>,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url_for(&self, base: &Currency) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), base.code())
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    async fn latest_rates(
        &self,
        base: &Currency,
    ) -> Result<HashMap<String, f64>, RateProviderError> {
        let url = self.url_for(base);
        debug!(event_name = "currency.rates_requested", url = %url, "requesting latest rates");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| RateProviderError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateProviderError::Status(status.as_u16()));
        }

        let payload = response
            .json::<LatestRates>()
            .await
            .map_err(|error| RateProviderError::Payload(error.to_string()))?;
        Ok(payload.rates)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use landed_core::currency::{CurrencyConverter, RateProvider, RateProviderError};
    use landed_core::money::Currency;

    use super::ExchangeRateApiProvider;

    fn provider(server: &MockServer) -> ExchangeRateApiProvider {
        ExchangeRateApiProvider::new(format!("{}/v4/latest/", server.uri()), Duration::from_secs(2))
            .expect("client")
    }

    #[tokio::test]
    async fn parses_rates_for_base_currency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "EUR",
                "date": "2030-01-01",
                "rates": { "EUR": 1.0, "RUB": 100.0, "USD": 1.08 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rates = provider(&server).latest_rates(&Currency::eur()).await.expect("rates");

        assert_eq!(rates.get("RUB"), Some(&100.0));
        assert_eq!(rates.len(), 3);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/EUR"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = provider(&server).latest_rates(&Currency::eur()).await.expect_err("outage");

        assert_eq!(error, RateProviderError::Status(503));
    }

    #[tokio::test]
    async fn garbage_payload_is_a_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let error = provider(&server).latest_rates(&Currency::eur()).await.expect_err("garbage");

        assert!(matches!(error, RateProviderError::Payload(_)));
    }

    #[tokio::test]
    async fn converter_hits_the_provider_once_per_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/EUR"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "rates": { "RUB": 100.0 } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let converter = CurrencyConverter::new(
            Arc::new(provider(&server)),
            Decimal::new(35, 3),
            Duration::from_secs(3600),
        );
        for _ in 0..3 {
            let rub = converter
                .convert(Decimal::new(12_180, 2), &Currency::eur(), &Currency::rub())
                .await
                .expect("converted");
            assert_eq!(rub.amount, Decimal::new(1_260_630, 2));
        }
    }
}

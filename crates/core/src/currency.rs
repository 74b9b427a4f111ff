use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::money::{round_money, Currency, Money};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateProviderError {
    #[error("rate request failed: {0}")]
    Request(String),
    #[error("rate provider answered with status {0}")]
    Status(u16),
    #[error("rate payload could not be decoded: {0}")]
    Payload(String),
}

/// Source of "latest rates for base currency X".
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn latest_rates(&self, base: &Currency)
        -> Result<HashMap<String, f64>, RateProviderError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no exchange rate available for {from} -> {to}")]
pub struct ConversionUnavailable {
    pub from: Currency,
    pub to: Currency,
}

#[derive(Clone, Copy, Debug)]
struct CachedRate {
    raw: Decimal,
    fetched_at: Instant,
}

/// Converts amounts with a fixed markup over the market rate.
///
/// Raw rates are cached per currency pair for `ttl`. Only successful lookups
/// are cached, so a failed call is retried on the next conversion.
pub struct CurrencyConverter {
    provider: Arc<dyn RateProvider>,
    markup: Decimal,
    ttl: Duration,
    cache: RwLock<HashMap<(Currency, Currency), CachedRate>>,
}

impl CurrencyConverter {
    pub fn new(provider: Arc<dyn RateProvider>, markup: Decimal, ttl: Duration) -> Self {
        Self { provider, markup, ttl, cache: RwLock::new(HashMap::new()) }
    }

    pub fn markup(&self) -> Decimal {
        self.markup
    }

    pub async fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
    ) -> Result<Money, ConversionUnavailable> {
        if from == to {
            return Ok(Money::new(amount, to.clone()));
        }

        let raw = self.raw_rate(from, to).await?;
        let converted = raw
            .checked_mul(Decimal::ONE + self.markup)
            .and_then(|effective| amount.checked_mul(effective));
        let Some(converted) = converted else {
            warn!(
                event_name = "currency.conversion_overflow",
                from = %from,
                to = %to,
                amount = %amount,
                "converted amount is out of range"
            );
            return Err(ConversionUnavailable { from: from.clone(), to: to.clone() });
        };
        Ok(Money::new(round_money(converted), to.clone()))
    }

    /// Number of currency pairs with a live cached rate.
    pub async fn cached_pairs(&self) -> usize {
        let cache = self.cache.read().await;
        cache.values().filter(|entry| entry.fetched_at.elapsed() < self.ttl).count()
    }

    async fn raw_rate(
        &self,
        from: &Currency,
        to: &Currency,
    ) -> Result<Decimal, ConversionUnavailable> {
        let key = (from.clone(), to.clone());
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.raw);
                }
            }
        }

        let unavailable = || ConversionUnavailable { from: from.clone(), to: to.clone() };
        let rates = self.provider.latest_rates(from).await.map_err(|error| {
            warn!(
                event_name = "currency.rate_fetch_failed",
                from = %from,
                to = %to,
                error = %error,
                "exchange rate lookup failed; conversion suppressed"
            );
            unavailable()
        })?;

        let raw = rates
            .get(to.code())
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .and_then(|rate| Decimal::try_from(rate).ok())
            .ok_or_else(|| {
                warn!(
                    event_name = "currency.rate_missing",
                    from = %from,
                    to = %to,
                    "provider response has no usable rate for target currency"
                );
                unavailable()
            })?;

        debug!(
            event_name = "currency.rate_cached",
            from = %from,
            to = %to,
            rate = %raw,
            "cached exchange rate"
        );
        let mut cache = self.cache.write().await;
        cache.insert(key, CachedRate { raw, fetched_at: Instant::now() });
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::{ConversionUnavailable, CurrencyConverter, RateProvider, RateProviderError};
    use crate::money::Currency;

    #[derive(Default)]
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<HashMap<String, f64>, RateProviderError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn with_script(responses: Vec<Result<HashMap<String, f64>, RateProviderError>>) -> Self {
            Self { responses: Mutex::new(responses.into()), calls: Mutex::new(0) }
        }

        async fn calls(&self) -> usize {
            *self.calls.lock().await
        }
    }

    #[async_trait]
    impl RateProvider for ScriptedProvider {
        async fn latest_rates(
            &self,
            _base: &Currency,
        ) -> Result<HashMap<String, f64>, RateProviderError> {
            *self.calls.lock().await += 1;
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(RateProviderError::Request("script exhausted".to_owned())))
        }
    }

    fn rates(rub: f64) -> Result<HashMap<String, f64>, RateProviderError> {
        Ok(HashMap::from([("RUB".to_owned(), rub), ("USD".to_owned(), 1.1)]))
    }

    fn converter(provider: Arc<ScriptedProvider>, ttl: Duration) -> CurrencyConverter {
        CurrencyConverter::new(provider, Decimal::new(35, 3), ttl)
    }

    #[tokio::test]
    async fn applies_markup_over_raw_rate() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![rates(100.0)]));
        let converter = converter(provider, Duration::from_secs(3600));

        let converted = converter
            .convert(Decimal::from(10), &Currency::eur(), &Currency::rub())
            .await
            .expect("rate should be available");

        assert_eq!(converted.amount, Decimal::new(103_500, 2));
        assert_eq!(converted.currency, Currency::rub());
    }

    #[tokio::test]
    async fn cached_rate_is_reused_within_interval() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![rates(100.0), rates(200.0)]));
        let converter = converter(provider.clone(), Duration::from_secs(3600));

        let first = converter
            .convert(Decimal::from(1), &Currency::eur(), &Currency::rub())
            .await
            .expect("first conversion");
        let second = converter
            .convert(Decimal::from(1), &Currency::eur(), &Currency::rub())
            .await
            .expect("second conversion");

        assert_eq!(first, second);
        assert_eq!(second.amount, Decimal::new(10_350, 2));
        assert_eq!(provider.calls().await, 1);
        assert_eq!(converter.cached_pairs().await, 1);
    }

    #[tokio::test]
    async fn expired_rate_is_fetched_again() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![rates(100.0), rates(200.0)]));
        let converter = converter(provider.clone(), Duration::ZERO);

        let _ = converter.convert(Decimal::from(1), &Currency::eur(), &Currency::rub()).await;
        let second = converter
            .convert(Decimal::from(1), &Currency::eur(), &Currency::rub())
            .await
            .expect("second conversion");

        assert_eq!(second.amount, Decimal::new(20_700, 2));
        assert_eq!(provider.calls().await, 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![
            Err(RateProviderError::Status(503)),
            rates(90.0),
        ]));
        let converter = converter(provider.clone(), Duration::from_secs(3600));

        let failed = converter.convert(Decimal::from(1), &Currency::eur(), &Currency::rub()).await;
        assert_eq!(
            failed,
            Err(ConversionUnavailable { from: Currency::eur(), to: Currency::rub() })
        );

        let recovered = converter
            .convert(Decimal::from(1), &Currency::eur(), &Currency::rub())
            .await
            .expect("next call should retry the provider");
        assert_eq!(recovered.amount, Decimal::new(9_315, 2));
        assert_eq!(provider.calls().await, 2);
    }

    #[tokio::test]
    async fn missing_target_currency_is_unavailable() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![Ok(HashMap::from([(
            "USD".to_owned(),
            1.1,
        )]))]));
        let converter = converter(provider, Duration::from_secs(3600));

        let result = converter.convert(Decimal::from(1), &Currency::eur(), &Currency::rub()).await;
        assert!(result.is_err());
        assert_eq!(converter.cached_pairs().await, 0);
    }

    #[tokio::test]
    async fn same_currency_is_identity_without_provider_call() {
        let provider = Arc::new(ScriptedProvider::default());
        let converter = converter(provider.clone(), Duration::from_secs(3600));

        let converted = converter
            .convert(Decimal::new(1234, 2), &Currency::eur(), &Currency::eur())
            .await
            .expect("identity conversion");

        assert_eq!(converted.amount, Decimal::new(1234, 2));
        assert_eq!(provider.calls().await, 0);
    }

    #[tokio::test]
    async fn out_of_range_amount_is_unavailable_instead_of_panicking() {
        let provider = Arc::new(ScriptedProvider::with_script(vec![rates(100.0)]));
        let converter = converter(provider, Duration::from_secs(3600));

        let result = converter.convert(Decimal::MAX, &Currency::eur(), &Currency::rub()).await;
        assert_eq!(
            result,
            Err(ConversionUnavailable { from: Currency::eur(), to: Currency::rub() })
        );

        let converted = converter
            .convert(Decimal::from(10), &Currency::eur(), &Currency::rub())
            .await
            .expect("cached rate still converts in-range amounts");
        assert_eq!(converted.amount, Decimal::new(103_500, 2));
    }
}

use std::sync::Arc;
use std::time::Duration;

use landed_bot::{
    conversation_dispatcher, BotRunner, DialogController, PriceFormatter, ReconnectPolicy,
    TelegramTransport,
};
use landed_core::audit::{AuditSink, TracingAuditSink};
use landed_core::config::{AppConfig, ConfigError};
use landed_core::currency::CurrencyConverter;
use landed_core::pricing::{LandedCostEngine, ShippingTable};
use landed_core::search::{DisabledSearch, ProductSearch};
use landed_core::session::SessionStore;
use landed_core::submission::{
    NoopOperatorNotifier, NoopSpreadsheetSink, OperatorNotifier, OrderStoreError, OrderSubmitter,
    SpreadsheetSink,
};
use landed_integrations::{
    ExchangeRateApiProvider, ScrapingBeeSearch, TelegramApi, TelegramOperatorNotifier,
    WebhookSpreadsheetSink,
};
use landed_store::JsonFileOrderStore;
use thiserror::Error;
use tracing::info;

/// Headroom on top of the long-poll timeout before an HTTP request is abandoned.
const POLL_REQUEST_SLACK_SECS: u64 = 10;

pub struct Application {
    pub config: AppConfig,
    pub orders: Arc<JsonFileOrderStore>,
    pub converter: Arc<CurrencyConverter>,
    pub sessions: Arc<SessionStore>,
    pub runner: BotRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("orders directory is not writable: {0}")]
    OrdersDirectory(#[source] OrderStoreError),
    #[error("could not build the {client} http client: {detail}")]
    HttpClient { client: &'static str, detail: String },
}

fn http_client_error(client: &'static str) -> impl FnOnce(reqwest::Error) -> BootstrapError {
    move |error| BootstrapError::HttpClient { client, detail: error.to_string() }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let orders = Arc::new(JsonFileOrderStore::new(config.orders.directory.clone()));
    orders.probe_writable().await.map_err(BootstrapError::OrdersDirectory)?;
    info!(
        event_name = "system.bootstrap.orders_ready",
        correlation_id = "bootstrap",
        directory = %orders.directory().display(),
        "orders directory is writable"
    );

    let provider =
        ExchangeRateApiProvider::new(&config.currency.provider_base_url, config.currency.timeout())
            .map_err(http_client_error("exchange rate"))?;
    let converter = Arc::new(CurrencyConverter::new(
        Arc::new(provider),
        config.currency.markup,
        config.currency.cache_ttl(),
    ));

    let pricing = Arc::new(LandedCostEngine::new(
        config.pricing.rates(),
        Arc::new(ShippingTable::standard()),
    ));

    let search: Arc<dyn ProductSearch> = match (config.search.enabled, &config.search.api_key) {
        (true, Some(api_key)) => Arc::new(
            ScrapingBeeSearch::new(
                &config.search.endpoint,
                api_key.clone(),
                Duration::from_secs(config.search.timeout_secs),
            )
            .map_err(http_client_error("product search"))?,
        ),
        _ => Arc::new(DisabledSearch),
    };

    let spreadsheet_timeout = Duration::from_secs(config.spreadsheet.timeout_secs);
    let spreadsheet: Arc<dyn SpreadsheetSink> = match &config.spreadsheet.webhook_url {
        Some(url) => Arc::new(
            WebhookSpreadsheetSink::new(url, spreadsheet_timeout)
                .map_err(http_client_error("spreadsheet webhook"))?,
        ),
        None => Arc::new(NoopSpreadsheetSink),
    };

    let api = TelegramApi::new(
        &config.telegram.api_base_url,
        config.telegram.bot_token.clone(),
        Duration::from_secs(config.telegram.poll_timeout_secs + POLL_REQUEST_SLACK_SECS),
    )
    .map_err(http_client_error("telegram"))?;

    let operator_chat_id =
        config.telegram.operator_chat_id.as_deref().and_then(|value| value.trim().parse().ok());
    let notifier: Arc<dyn OperatorNotifier> = match operator_chat_id {
        Some(chat_id) => Arc::new(TelegramOperatorNotifier::new(api.clone(), chat_id)),
        None => Arc::new(NoopOperatorNotifier),
    };

    info!(
        event_name = "system.bootstrap.integrations",
        correlation_id = "bootstrap",
        search_enabled = config.search.enabled,
        spreadsheet_enabled = config.spreadsheet.webhook_url.is_some(),
        operator_notifications = operator_chat_id.is_some(),
        "collaborators configured"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let submitter = Arc::new(OrderSubmitter::new(
        orders.clone(),
        spreadsheet,
        notifier,
        pricing.clone(),
        audit.clone(),
        spreadsheet_timeout,
    ));

    let sessions =
        Arc::new(SessionStore::new(config.session.idle_ttl(), config.session.max_sessions));
    let formatter = PriceFormatter::new(
        config.pricing.source_currency.clone(),
        config.pricing.display_currency.clone(),
        Some(converter.clone()),
    );
    let controller = Arc::new(DialogController::new(
        sessions.clone(),
        pricing,
        formatter,
        search,
        config.search.result_limit,
        submitter,
        audit,
    ));

    let transport = Arc::new(TelegramTransport::new(api, config.telegram.poll_timeout_secs));
    let runner =
        BotRunner::new(transport, conversation_dispatcher(controller), ReconnectPolicy::default());

    Ok(Application { config, orders, converter, sessions, runner })
}

#[cfg(test)]
mod tests {
    use landed_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(options)?;
        bootstrap_with_config(config).await
    }

    fn options(directory: std::path::PathBuf, bot_token: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                bot_token: bot_token.map(str::to_owned),
                orders_directory: Some(directory),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let dir = tempfile::tempdir().expect("tempdir");

        let result = bootstrap(options(dir.path().join("orders"), Some(""))).await;

        let Err(BootstrapError::Config(error)) = result else {
            panic!("expected a configuration error");
        };
        assert!(error.to_string().contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_the_application_and_creates_the_orders_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orders = dir.path().join("orders");

        let app = bootstrap(options(orders.clone(), Some("12345:test-token")))
            .await
            .expect("bootstrap should succeed with a token and writable directory");

        assert!(orders.is_dir());
        assert_eq!(app.orders.directory(), orders.as_path());
        assert!(app.sessions.is_empty().await);
        assert_eq!(app.converter.cached_pairs().await, 0);
    }

    #[tokio::test]
    async fn bootstrap_rejects_an_orders_path_that_is_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("orders");
        std::fs::write(&blocker, b"not a directory").expect("write blocker");

        let result = bootstrap(options(blocker, Some("12345:test-token"))).await;

        assert!(matches!(result, Err(BootstrapError::OrdersDirectory(_))));
    }
}

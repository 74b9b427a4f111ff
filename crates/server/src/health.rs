use std::future::Future;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use landed_core::currency::CurrencyConverter;
use landed_store::JsonFileOrderStore;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    orders: Arc<JsonFileOrderStore>,
    converter: Arc<CurrencyConverter>,
}

impl HealthState {
    pub fn new(orders: Arc<JsonFileOrderStore>, converter: Arc<CurrencyConverter>) -> Self {
        Self { orders, converter }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub orders: HealthCheck,
    pub currency: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Serves `/health` until `shutdown` resolves.
pub async fn spawn<F>(
    bind_address: &str,
    port: u16,
    state: HealthState,
    shutdown: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    Ok(tokio::spawn(async move {
        if let Err(error) =
            axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
        {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    }))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let orders = orders_check(&state.orders).await;
    let currency = currency_check(&state.converter).await;
    let ready = orders.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "landed-server runtime initialized".to_owned(),
        },
        orders,
        currency,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn orders_check(store: &JsonFileOrderStore) -> HealthCheck {
    match store.probe_writable().await {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: format!("orders directory `{}` is writable", store.directory().display()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("orders store unavailable: {error}") }
        }
    }
}

/// An empty cache is not a failure: prices fall back to the source currency.
async fn currency_check(converter: &CurrencyConverter) -> HealthCheck {
    match converter.cached_pairs().await {
        0 => HealthCheck {
            status: "cold",
            detail: "no fresh exchange rates cached; prices show in source currency".to_owned(),
        },
        pairs => {
            HealthCheck { status: "ready", detail: format!("{pairs} fresh rate pair(s) cached") }
        }
    }
}

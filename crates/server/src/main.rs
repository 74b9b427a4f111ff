mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use landed_core::config::{AppConfig, LoadOptions};
use landed_core::session::SessionStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

fn init_logging(config: &AppConfig) {
    use landed_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so wiring failures are reported
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let health_server = health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.orders.clone(), app.converter.clone()),
        async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        },
    )
    .await?;
    let sweeper = spawn_session_sweeper(app.sessions.clone());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        orders_directory = %app.orders.directory().display(),
        "landed-server started"
    );

    let outcome = tokio::select! {
        result = app.runner.start() => {
            if let Err(error) = &result {
                tracing::error!(
                    event_name = "system.server.runner_stopped",
                    correlation_id = "shutdown",
                    error = %error,
                    "bot runner gave up"
                );
            }
            result
        }
        signal = tokio::signal::ctrl_c() => signal.map_err(anyhow::Error::from),
    };

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "landed-server stopping"
    );
    sweeper.abort();
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, health_server).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "health endpoint did not stop within the grace period"
        );
    }

    outcome
}

fn spawn_session_sweeper(sessions: Arc<SessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle().await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                tracing::debug!(
                    event_name = "system.sessions.evicted",
                    evicted,
                    remaining,
                    "idle sessions evicted"
                );
            }
        }
    })
}

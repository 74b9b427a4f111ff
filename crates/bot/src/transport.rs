use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use landed_core::errors::InterfaceError;

use crate::events::{EventContext, EventDispatcher, HandlerResult, InboundEvent, InboundUpdate};
use crate::keyboards::Reply;
use crate::render;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport delivery failed: {0}")]
    Deliver(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream ended cleanly.
    async fn next_update(&self) -> Result<Option<InboundUpdate>, TransportError>;
    async fn acknowledge(&self, update: &InboundUpdate) -> Result<(), TransportError>;
    async fn deliver(&self, chat_id: i64, reply: &Reply) -> Result<(), TransportError>;
}

/// Pulls updates from a transport, dispatches them and delivers the replies.
///
/// Updates are handled one at a time in arrival order, each on its own task so a
/// panicking handler costs only that update. The retry budget resets whenever a
/// connection has delivered at least one update.
pub struct BotRunner {
    transport: Arc<dyn BotTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

struct PumpFailure {
    error: TransportError,
    handled: usize,
}

impl BotRunner {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(PumpFailure { error, handled }) => {
                    if handled > 0 {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "transport.failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "bot transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "transport.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "bot transport retries exhausted; runner stopping"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpFailure> {
        let mut handled = 0;
        let fail = |error: TransportError, handled: usize| PumpFailure { error, handled };

        info!(attempt, "opening bot transport connection");
        self.transport.connect().await.map_err(|error| fail(error, 0))?;
        info!(attempt, "bot transport connected");

        loop {
            let update = match self.transport.next_update().await {
                Ok(Some(update)) => update,
                Ok(None) => {
                    info!(attempt, handled, "bot transport stream closed");
                    return Ok(());
                }
                Err(error) => return Err(fail(error, handled)),
            };
            let correlation_id = format!("update-{}", update.update_id);

            info!(
                event_name = "ingress.update_received",
                update_id = update.update_id,
                event_type = ?update.event.event_type(),
                correlation_id = %correlation_id,
                session_id = update.sender.user_id,
                "received bot update"
            );

            if let Err(error) = self.transport.acknowledge(&update).await {
                warn!(
                    event_name = "ingress.ack_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to acknowledge update"
                );
            }

            let context = EventContext { correlation_id: correlation_id.clone() };
            let dispatcher = Arc::clone(&self.dispatcher);
            let dispatched = update.clone();
            let outcome =
                tokio::spawn(async move { dispatcher.dispatch(&dispatched, &context).await })
                    .await;
            let replies = match outcome {
                Ok(Ok(HandlerResult::Responded(replies))) => replies,
                Ok(Ok(HandlerResult::Processed)) => Vec::new(),
                Ok(Ok(HandlerResult::Ignored)) => {
                    debug!(correlation_id = %correlation_id, "update ignored");
                    Vec::new()
                }
                Err(join_error) => {
                    error!(
                        event_name = "bot.update_panicked",
                        correlation_id = %correlation_id,
                        update_id = update.update_id,
                        error = %join_error,
                        "update handler panicked; continuing loop"
                    );
                    let failure = InterfaceError::Internal {
                        message: join_error.to_string(),
                        correlation_id: correlation_id.clone(),
                    };
                    vec![render::internal_error(&failure)]
                }
                Ok(Err(error)) => {
                    warn!(
                        event_name = "ingress.dispatch_failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "event dispatch failed; continuing loop"
                    );
                    if matches!(update.event, InboundEvent::Callback { .. }) {
                        vec![render::stale_action()]
                    } else {
                        Vec::new()
                    }
                }
            };

            for reply in &replies {
                if let Err(error) = self.transport.deliver(update.sender.chat_id, reply).await {
                    warn!(
                        event_name = "egress.delivery_failed",
                        correlation_id = %correlation_id,
                        chat_id = update.sender.chat_id,
                        error = %error,
                        "failed to deliver reply"
                    );
                }
            }
            handled += 1;
        }
    }
}

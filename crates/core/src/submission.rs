use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::{Cart, ChatContact, CustomerDetails, ItemSource, OrderId, OrderRecord};
use crate::money::Money;
use crate::pricing::PricingEngine;

/// How many taken ids one submission steps past before giving up.
const MAX_ID_COLLISIONS: usize = 16;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderStoreError {
    #[error("order store io failure: {0}")]
    Io(String),
    #[error("order record could not be serialized: {0}")]
    Serialization(String),
    #[error("order {0} is already recorded")]
    AlreadyExists(OrderId),
}

/// Authoritative local record of submitted orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes one record and returns where it landed.
    async fn persist(&self, order: &OrderRecord) -> Result<String, OrderStoreError>;
    async fn list(&self) -> Result<Vec<OrderRecord>, OrderStoreError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("remote responded with status {0}")]
    Status(u16),
    #[error("remote rejected the payload: {0}")]
    Rejected(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetRow {
    pub values: Vec<String>,
}

impl SpreadsheetRow {
    /// Column order: id, date, name, phone, email, address, notes, total, item count,
    /// item lines, links, chat user id, chat username.
    pub fn from_order(order: &OrderRecord) -> Self {
        let mut items = String::new();
        let mut links = String::new();
        for line in &order.items {
            let total = Money::new(line.line_total, order.currency.clone()).display();
            let source = match line.source {
                ItemSource::Calculation => "calculation",
                ItemSource::Search => "search",
            };
            let _ = writeln!(items, "{}. {} - {} ({})", line.position, line.title, total, source);
            if let Some(link) = &line.link {
                let _ = writeln!(links, "{}. {}", line.position, link);
            }
        }

        let values = vec![
            order.order_id.to_string(),
            order.created_at.format("%d.%m.%Y %H:%M:%S").to_string(),
            order.customer.name.clone(),
            order.customer.phone.clone(),
            order.customer.email.clone(),
            order.customer.address.clone(),
            order.feature_notes.clone(),
            Money::new(order.totals.grand_total, order.currency.clone()).display(),
            order.items_count.to_string(),
            items.trim_end().to_owned(),
            links.trim_end().to_owned(),
            order.contact.user_id.clone(),
            order.contact.username.clone().unwrap_or_default(),
        ];
        Self { values }
    }
}

#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn append_row(&self, row: &SpreadsheetRow) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Accepts every row without sending it anywhere.
#[derive(Clone, Debug, Default)]
pub struct NoopSpreadsheetSink;

#[async_trait]
impl SpreadsheetSink for NoopSpreadsheetSink {
    async fn append_row(&self, _row: &SpreadsheetRow) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NoopOperatorNotifier;

#[async_trait]
impl OperatorNotifier for NoopOperatorNotifier {
    async fn notify(&self, _message: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

pub fn render_operator_message(order: &OrderRecord) -> String {
    let money = |amount| Money::new(amount, order.currency.clone()).display();
    let mut message = String::new();
    let _ = writeln!(message, "New order #{}", order.order_id);
    let _ = writeln!(message);
    let _ = writeln!(message, "Customer: {}", order.customer.name);
    let _ = writeln!(message, "Phone: {}", order.customer.phone);
    let _ = writeln!(message, "Email: {}", order.customer.email);
    let _ = writeln!(message, "Address: {}", order.customer.address);
    let _ = writeln!(message, "Contact: {}", order.contact.handle());
    let _ = writeln!(message);
    let _ = writeln!(message, "Items ({}):", order.items_count);
    for line in &order.items {
        let _ = writeln!(
            message,
            "{}. {} x{} = {}",
            line.position,
            line.title,
            line.quantity,
            money(line.line_total)
        );
        if let Some(link) = &line.link {
            let _ = writeln!(message, "   {link}");
        }
    }
    if !order.feature_notes.is_empty() {
        let _ = writeln!(message);
        let _ = writeln!(message, "Notes: {}", order.feature_notes);
    }
    let _ = writeln!(message);
    let _ = writeln!(message, "Goods net of VAT: {}", money(order.totals.net_price));
    let _ = writeln!(message, "Commission: {}", money(order.totals.commission));
    let _ = write!(message, "Total: {}", money(order.totals.grand_total));
    message
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("cannot submit an order with an empty cart")]
    EmptyCart,
    #[error("order {order_id} could not be recorded: {source}")]
    Persistence { order_id: OrderId, source: OrderStoreError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub order: OrderRecord,
    pub location: String,
    pub spreadsheet_recorded: bool,
    pub operator_notified: bool,
}

/// Persists orders locally, then forwards them best-effort.
pub struct OrderSubmitter {
    store: Arc<dyn OrderStore>,
    spreadsheet: Arc<dyn SpreadsheetSink>,
    notifier: Arc<dyn OperatorNotifier>,
    engine: Arc<dyn PricingEngine>,
    audit: Arc<dyn AuditSink>,
    secondary_timeout: Duration,
}

impl OrderSubmitter {
    pub fn new(
        store: Arc<dyn OrderStore>,
        spreadsheet: Arc<dyn SpreadsheetSink>,
        notifier: Arc<dyn OperatorNotifier>,
        engine: Arc<dyn PricingEngine>,
        audit: Arc<dyn AuditSink>,
        secondary_timeout: Duration,
    ) -> Self {
        Self { store, spreadsheet, notifier, engine, audit, secondary_timeout }
    }

    pub async fn submit(
        &self,
        customer: CustomerDetails,
        contact: ChatContact,
        cart: &Cart,
        context: &AuditContext,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if cart.is_empty() {
            return Err(SubmissionError::EmptyCart);
        }

        let created_at = Utc::now();
        let mut order = OrderRecord::assemble(
            OrderId::generate(created_at),
            created_at,
            customer,
            contact,
            cart,
            self.engine.as_ref(),
        )
        .map_err(|_| SubmissionError::EmptyCart)?;

        let mut collisions = 0;
        let persisted = loop {
            match self.store.persist(&order).await {
                Err(OrderStoreError::AlreadyExists(taken)) if collisions < MAX_ID_COLLISIONS => {
                    collisions += 1;
                    order.order_id = OrderId::after(taken);
                    warn!(
                        event_name = "submission.order_id_taken",
                        order_id = %taken,
                        next_order_id = %order.order_id,
                        "order id already recorded; moving to the next one"
                    );
                }
                result => break result,
            }
        };
        let order_id = order.order_id;
        let context = context.with_order(order_id);

        let location = match persisted {
            Ok(location) => location,
            Err(source) => {
                warn!(
                    event_name = "submission.persist_failed",
                    order_id = %order_id,
                    error = %source,
                    "order could not be recorded locally"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "submission.persist_failed",
                        AuditCategory::Submission,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", source.to_string()),
                );
                return Err(SubmissionError::Persistence { order_id, source });
            }
        };
        info!(
            event_name = "submission.order_persisted",
            order_id = %order_id,
            location = %location,
            items = order.items_count,
            "order recorded"
        );
        self.audit.emit(
            AuditEvent::new(
                &context,
                "submission.order_persisted",
                AuditCategory::Submission,
                AuditOutcome::Success,
            )
            .with_metadata("location", location.clone()),
        );

        let row = SpreadsheetRow::from_order(&order);
        let message = render_operator_message(&order);
        let (sheet, notify) = tokio::join!(
            self.bounded(self.spreadsheet.append_row(&row)),
            self.bounded(self.notifier.notify(&message)),
        );

        let spreadsheet_recorded = self.settle(&context, "spreadsheet", sheet);
        let operator_notified = self.settle(&context, "operator", notify);

        Ok(SubmissionReceipt { order, location, spreadsheet_recorded, operator_notified })
    }

    async fn bounded<F>(&self, delivery: F) -> Result<(), DeliveryError>
    where
        F: std::future::Future<Output = Result<(), DeliveryError>>,
    {
        match tokio::time::timeout(self.secondary_timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(self.secondary_timeout)),
        }
    }

    fn settle(
        &self,
        context: &AuditContext,
        channel: &'static str,
        result: Result<(), DeliveryError>,
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    event_name = "submission.forward_failed",
                    channel,
                    order_id = context.order_id.map(|id| id.0).unwrap_or_default(),
                    error = %error,
                    "secondary order delivery failed"
                );
                self.audit.emit(
                    AuditEvent::new(
                        context,
                        "submission.forward_failed",
                        AuditCategory::Submission,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("channel", channel)
                    .with_metadata("error", error.to_string()),
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::{
        render_operator_message, DeliveryError, NoopOperatorNotifier, NoopSpreadsheetSink,
        OperatorNotifier, OrderStore, OrderStoreError, OrderSubmitter, SpreadsheetRow,
        SpreadsheetSink, SubmissionError,
    };
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::{Cart, CartItem, ChatContact, CustomerDetails, OrderId, OrderRecord};
    use crate::money::{Currency, Money};
    use crate::pricing::{LandedCostEngine, PricingEngine, ShippingTier, Weight};

    #[derive(Default)]
    struct RecordingStore {
        orders: Mutex<Vec<OrderRecord>>,
        attempts: AtomicUsize,
        fail: bool,
        /// Persist calls answered with `AlreadyExists` before records are accepted.
        taken: AtomicUsize,
    }

    #[async_trait]
    impl OrderStore for RecordingStore {
        async fn persist(&self, order: &OrderRecord) -> Result<String, OrderStoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OrderStoreError::Io("disk full".to_owned()));
            }
            let taken = self.taken.load(Ordering::SeqCst);
            if taken > 0 {
                self.taken.store(taken - 1, Ordering::SeqCst);
                return Err(OrderStoreError::AlreadyExists(order.order_id));
            }
            self.orders.lock().await.push(order.clone());
            Ok(format!("memory://order_{}", order.order_id))
        }

        async fn list(&self) -> Result<Vec<OrderRecord>, OrderStoreError> {
            Ok(self.orders.lock().await.clone())
        }
    }

    struct FailingSheet;

    #[async_trait]
    impl SpreadsheetSink for FailingSheet {
        async fn append_row(&self, _row: &SpreadsheetRow) -> Result<(), DeliveryError> {
            Err(DeliveryError::Status(503))
        }
    }

    struct StalledNotifier;

    #[async_trait]
    impl OperatorNotifier for StalledNotifier {
        async fn notify(&self, _message: &str) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Anna Petrova".to_owned(),
            phone: "+7 900 000 00 00".to_owned(),
            email: "anna@example.com".to_owned(),
            address: "Moscow, Tverskaya 1".to_owned(),
        }
    }

    fn contact() -> ChatContact {
        ChatContact { user_id: "42".to_owned(), username: Some("anna".to_owned()) }
    }

    fn cart() -> Cart {
        let quote = LandedCostEngine::default()
            .quote(
                &Money::new(Decimal::from(100), Currency::eur()),
                ShippingTier::Ems,
                Weight::from_grams(1000),
            )
            .expect("quote");
        let mut cart = Cart::new();
        cart.add(
            CartItem::from_quote(
                quote,
                1,
                Some("https://shop.example/jacket".to_owned()),
                Some("size M".to_owned()),
            )
            .expect("item"),
        );
        cart
    }

    fn submitter(
        store: Arc<RecordingStore>,
        sheet: Arc<dyn SpreadsheetSink>,
        notifier: Arc<dyn OperatorNotifier>,
        audit: InMemoryAuditSink,
    ) -> OrderSubmitter {
        OrderSubmitter::new(
            store,
            sheet,
            notifier,
            Arc::new(LandedCostEngine::default()),
            Arc::new(audit),
            Duration::from_millis(50),
        )
    }

    fn audit_context() -> AuditContext {
        AuditContext::new(Some("42".to_owned()), None, "upd-1", "dialog")
    }

    #[tokio::test]
    async fn empty_cart_fails_before_any_persistence_attempt() {
        let store = Arc::new(RecordingStore::default());
        let service = submitter(
            Arc::clone(&store),
            Arc::new(NoopSpreadsheetSink),
            Arc::new(NoopOperatorNotifier),
            InMemoryAuditSink::default(),
        );

        let result = service.submit(customer(), contact(), &Cart::new(), &audit_context()).await;

        assert_eq!(result, Err(SubmissionError::EmptyCart));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn secondary_failures_do_not_fail_submission() {
        let store = Arc::new(RecordingStore::default());
        let audit = InMemoryAuditSink::default();
        let service = submitter(
            Arc::clone(&store),
            Arc::new(FailingSheet),
            Arc::new(StalledNotifier),
            audit.clone(),
        );

        let receipt = service
            .submit(customer(), contact(), &cart(), &audit_context())
            .await
            .expect("local persistence succeeded");

        assert!(!receipt.spreadsheet_recorded);
        assert!(!receipt.operator_notified);
        assert_eq!(receipt.order.totals.grand_total, Decimal::new(12_180, 2));
        assert_eq!(store.orders.lock().await.len(), 1);

        let failures = audit
            .events()
            .into_iter()
            .filter(|event| event.event_type == "submission.forward_failed")
            .count();
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported() {
        let store = Arc::new(RecordingStore { fail: true, ..RecordingStore::default() });
        let service = submitter(
            Arc::clone(&store),
            Arc::new(NoopSpreadsheetSink),
            Arc::new(NoopOperatorNotifier),
            InMemoryAuditSink::default(),
        );

        let error = service
            .submit(customer(), contact(), &cart(), &audit_context())
            .await
            .expect_err("persistence failed");

        assert!(matches!(error, SubmissionError::Persistence { .. }));
    }

    #[tokio::test]
    async fn taken_order_ids_are_skipped_not_overwritten() {
        let store =
            Arc::new(RecordingStore { taken: AtomicUsize::new(2), ..RecordingStore::default() });
        let service = submitter(
            Arc::clone(&store),
            Arc::new(NoopSpreadsheetSink),
            Arc::new(NoopOperatorNotifier),
            InMemoryAuditSink::default(),
        );

        let receipt = service
            .submit(customer(), contact(), &cart(), &audit_context())
            .await
            .expect("order lands under a free id");

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        let stored = store.orders.lock().await.clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].order_id, receipt.order.order_id);
        assert_eq!(receipt.location, format!("memory://order_{}", receipt.order.order_id));
    }

    #[tokio::test]
    async fn endless_id_collisions_surface_as_persistence_failure() {
        let store = Arc::new(RecordingStore {
            taken: AtomicUsize::new(usize::MAX),
            ..RecordingStore::default()
        });
        let service = submitter(
            Arc::clone(&store),
            Arc::new(NoopSpreadsheetSink),
            Arc::new(NoopOperatorNotifier),
            InMemoryAuditSink::default(),
        );

        let error = service
            .submit(customer(), contact(), &cart(), &audit_context())
            .await
            .expect_err("no free id");

        assert!(matches!(
            error,
            SubmissionError::Persistence { source: OrderStoreError::AlreadyExists(_), .. }
        ));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 17);
    }

    #[tokio::test]
    async fn successful_submission_reports_every_channel() {
        let store = Arc::new(RecordingStore::default());
        let audit = InMemoryAuditSink::default();
        let service = submitter(
            Arc::clone(&store),
            Arc::new(NoopSpreadsheetSink),
            Arc::new(NoopOperatorNotifier),
            audit.clone(),
        );

        let receipt =
            service.submit(customer(), contact(), &cart(), &audit_context()).await.expect("ok");

        assert!(receipt.spreadsheet_recorded && receipt.operator_notified);
        assert!(receipt.location.starts_with("memory://order_"));
        let events = audit.events();
        assert_eq!(events[0].event_type, "submission.order_persisted");
        assert_eq!(events[0].order_id, Some(receipt.order.order_id));
    }

    fn sample_order() -> OrderRecord {
        let created = Utc.with_ymd_and_hms(2030, 3, 9, 14, 5, 7).single().expect("timestamp");
        OrderRecord::assemble(
            OrderId(1_900_000_000),
            created,
            customer(),
            contact(),
            &cart(),
            &LandedCostEngine::default(),
        )
        .expect("order")
    }

    #[test]
    fn spreadsheet_row_keeps_column_order() {
        let row = SpreadsheetRow::from_order(&sample_order());

        assert_eq!(row.values.len(), 13);
        assert_eq!(row.values[0], "1900000000");
        assert_eq!(row.values[1], "09.03.2030 14:05:07");
        assert_eq!(row.values[2], "Anna Petrova");
        assert_eq!(row.values[6], "size M");
        assert_eq!(row.values[7], "€121.80");
        assert_eq!(row.values[8], "1");
        assert!(row.values[9].starts_with("1. Calculated item"));
        assert!(row.values[9].ends_with("- €121.80 (calculation)"));
        assert_eq!(row.values[10], "1. https://shop.example/jacket");
        assert_eq!(row.values[11], "42");
        assert_eq!(row.values[12], "anna");
    }

    #[test]
    fn operator_message_lists_customer_items_and_totals() {
        let message = render_operator_message(&sample_order());

        assert!(message.starts_with("New order #1900000000"));
        assert!(message.contains("Contact: @anna"));
        assert!(message.contains("x1 = €121.80"));
        assert!(message.contains("Notes: size M"));
        assert!(message.ends_with("Total: €121.80"));
    }
}

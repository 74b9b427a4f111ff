use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::cart::{Cart, ItemSource};
use crate::money::{round_money, Currency};
use crate::pricing::PricingEngine;

/// Numeric order identifier derived from the submission timestamp (unix seconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

static LAST_ORDER_ID: AtomicU64 = AtomicU64::new(0);

impl OrderId {
    /// Seconds since epoch, bumped past the last id handed out by this process.
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::claim(u64::try_from(now.timestamp()).unwrap_or_default())
    }

    /// The next id past one that is already taken, e.g. by a record left from an earlier run.
    pub fn after(taken: OrderId) -> Self {
        Self::claim(taken.0.saturating_add(1))
    }

    fn claim(candidate: u64) -> Self {
        let mut last = LAST_ORDER_ID.load(Ordering::SeqCst);
        loop {
            let next = candidate.max(last + 1);
            match LAST_ORDER_ID.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return Self(next),
                Err(observed) => last = observed,
            }
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Who placed the order on the chat side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContact {
    pub user_id: String,
    pub username: Option<String>,
}

impl ChatContact {
    pub fn handle(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => format!("id {}", self.user_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub position: usize,
    pub title: String,
    pub source: ItemSource,
    pub listed_price: Option<Decimal>,
    pub tier: Option<String>,
    pub weight: Option<String>,
    pub quantity: u32,
    pub unit_net_price: Decimal,
    pub unit_commission: Decimal,
    pub unit_total: Decimal,
    pub line_total: Decimal,
    pub link: Option<String>,
    pub features: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub net_price: Decimal,
    pub commission: Decimal,
    pub grand_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub currency: Currency,
    pub customer: CustomerDetails,
    pub contact: ChatContact,
    pub items: Vec<OrderLine>,
    pub items_count: usize,
    pub totals: OrderTotals,
    pub feature_notes: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("cannot assemble an order from an empty cart")]
    EmptyCart,
}

impl OrderRecord {
    pub fn assemble(
        order_id: OrderId,
        created_at: DateTime<Utc>,
        customer: CustomerDetails,
        contact: ChatContact,
        cart: &Cart,
        engine: &dyn PricingEngine,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let items: Vec<OrderLine> = cart
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let quote = item.effective_quote(engine);
                let quantity = Decimal::from(item.quantity);
                let (unit_net_price, unit_commission, unit_total) = quote
                    .as_ref()
                    .map(|quote| (quote.net_price, quote.commission, quote.total))
                    .unwrap_or((Decimal::ZERO, Decimal::ZERO, Decimal::ZERO));
                OrderLine {
                    position: index + 1,
                    title: item.display_title(),
                    source: item.source,
                    listed_price: item.listed_price,
                    tier: item.tier.map(|tier| tier.code().to_owned()),
                    weight: item.weight.map(|weight| weight.to_string()),
                    quantity: item.quantity,
                    unit_net_price,
                    unit_commission,
                    unit_total,
                    line_total: round_money(unit_total.saturating_mul(quantity)),
                    link: item.link.clone(),
                    features: item.features.clone(),
                }
            })
            .collect();

        let sum = |pick: fn(&OrderLine) -> Decimal| {
            round_money(
                items
                    .iter()
                    .map(|line| pick(line).saturating_mul(Decimal::from(line.quantity)))
                    .fold(Decimal::ZERO, Decimal::saturating_add),
            )
        };
        let totals = OrderTotals {
            net_price: sum(|line| line.unit_net_price),
            commission: sum(|line| line.unit_commission),
            grand_total: round_money(
                items
                    .iter()
                    .map(|line| line.line_total)
                    .fold(Decimal::ZERO, Decimal::saturating_add),
            ),
        };

        let feature_notes = items
            .iter()
            .filter_map(|line| line.features.as_deref())
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        let currency = cart.items()[0].currency.clone();
        Ok(Self {
            order_id,
            created_at,
            currency,
            customer,
            contact,
            items_count: items.len(),
            items,
            totals,
            feature_notes,
        })
    }
}

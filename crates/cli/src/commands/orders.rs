use chrono::{DateTime, Utc};
use landed_core::domain::OrderRecord;
use landed_core::money::Money;
use landed_core::submission::OrderStore;
use landed_store::JsonFileOrderStore;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{load_config, runtime, to_json, CommandResult};

#[derive(Debug, Serialize)]
struct OrderSummary {
    order_id: u64,
    created_at: DateTime<Utc>,
    customer: String,
    contact: String,
    items_count: usize,
    grand_total: Decimal,
    currency: String,
}

impl From<&OrderRecord> for OrderSummary {
    fn from(order: &OrderRecord) -> Self {
        Self {
            order_id: order.order_id.0,
            created_at: order.created_at,
            customer: order.customer.name.clone(),
            contact: order.contact.handle(),
            items_count: order.items_count,
            grand_total: order.totals.grand_total,
            currency: order.currency.code().to_owned(),
        }
    }
}

pub fn list(json_output: bool) -> CommandResult {
    let config = match load_config("orders.list") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("orders.list") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let store = JsonFileOrderStore::new(config.orders.directory.clone());
    let orders = match runtime.block_on(store.list()) {
        Ok(orders) => orders,
        Err(error) => return CommandResult::failure("orders.list", "store", error.to_string(), 4),
    };
    let summaries: Vec<OrderSummary> = orders.iter().map(OrderSummary::from).collect();

    if json_output {
        return to_json("orders.list", &summaries);
    }

    if summaries.is_empty() {
        return CommandResult::raw(format!(
            "no orders stored in `{}`",
            store.directory().display()
        ));
    }

    let mut lines =
        vec![format!("{} order(s) in `{}`:", summaries.len(), store.directory().display())];
    for (summary, order) in summaries.iter().zip(&orders) {
        let total = Money::new(summary.grand_total, order.currency.clone());
        lines.push(format!(
            "- #{} {} {} ({}) items={} total={}",
            summary.order_id,
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.customer,
            summary.contact,
            summary.items_count,
            total.display()
        ));
    }
    CommandResult::raw(lines.join("\n"))
}

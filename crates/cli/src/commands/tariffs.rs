use landed_core::money::{Currency, Money};
use landed_core::pricing::{ShippingTable, ShippingTier};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{to_json, CommandResult};

#[derive(Debug, Serialize)]
struct TierReport {
    code: &'static str,
    label: &'static str,
    rows: Vec<TariffRow>,
}

#[derive(Debug, Serialize)]
struct TariffRow {
    weight: String,
    grams: u32,
    cost: Decimal,
}

pub fn run(json_output: bool) -> CommandResult {
    let table = ShippingTable::standard();
    let mut reports = Vec::new();
    for tier in table.tiers() {
        match tier_report(&table, tier) {
            Ok(report) => reports.push(report),
            Err(error) => return CommandResult::failure("tariffs", "pricing", error, 5),
        }
    }

    if json_output {
        return to_json("tariffs", &reports);
    }

    let currency = Currency::eur();
    let mut lines = Vec::new();
    for report in &reports {
        lines.push(format!("{} ({}):", report.label, report.code));
        for row in &report.rows {
            let cost = Money::new(row.cost, currency.clone());
            lines.push(format!("- up to {}: {}", row.weight, cost.display()));
        }
    }
    CommandResult::raw(lines.join("\n"))
}

fn tier_report(table: &ShippingTable, tier: ShippingTier) -> Result<TierReport, String> {
    let rows = table
        .weights(tier)
        .map_err(|error| error.to_string())?
        .into_iter()
        .map(|(weight, cost)| TariffRow { weight: weight.to_string(), grams: weight.grams(), cost })
        .collect();
    Ok(TierReport { code: tier.code(), label: tier.label(), rows })
}

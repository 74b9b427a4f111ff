use std::sync::Arc;

use landed_core::money::Money;
use landed_core::pricing::{
    parse_listed_price, LandedCostEngine, PriceQuote, PricingEngine, PricingTraceStep,
    ShippingTable, ShippingTier, Weight,
};
use serde::Serialize;

use crate::commands::{load_config, to_json, CommandResult};

#[derive(Debug, Serialize)]
struct QuoteReport {
    quote: PriceQuote,
    total_with_notional_vat: String,
    trace: Vec<PricingTraceStep>,
}

pub fn run(price: &str, tier: &str, weight: &str, json_output: bool) -> CommandResult {
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let inputs = parse_listed_price(price).and_then(|price| {
        Ok((price, tier.parse::<ShippingTier>()?, weight.parse::<Weight>()?))
    });
    let (price, tier, weight) = match inputs {
        Ok(inputs) => inputs,
        Err(error) => {
            return CommandResult::failure("quote", "invalid_input", error.to_string(), 4);
        }
    };

    let engine =
        LandedCostEngine::new(config.pricing.rates(), Arc::new(ShippingTable::standard()));
    let listed = Money::new(price, config.pricing.source_currency.clone());
    let quote = match engine.quote(&listed, tier, weight) {
        Ok(quote) => quote,
        Err(error) => return CommandResult::failure("quote", "pricing", error.to_string(), 5),
    };

    if json_output {
        let report = QuoteReport {
            total_with_notional_vat: quote.total_with_notional_vat().to_string(),
            trace: quote.trace(),
            quote,
        };
        return to_json("quote", &report);
    }

    CommandResult::raw(render_human(&quote))
}

fn render_human(quote: &PriceQuote) -> String {
    let money = |amount| quote.money(amount).display();
    let mut lines = vec![format!(
        "landed cost for {} via {} ({}):",
        money(quote.listed_price),
        quote.tier.label(),
        quote.weight
    )];
    for step in quote.trace() {
        lines.push(format!("- {}: {} = {}", step.stage, step.detail, money(step.amount)));
    }
    lines.push(format!(
        "saved VAT: {} (with VAT the item would cost {})",
        money(quote.savings),
        money(quote.total_with_notional_vat())
    ));
    lines.join("\n")
}

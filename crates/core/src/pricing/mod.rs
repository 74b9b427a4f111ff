pub mod engine;
pub mod tariff;

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

pub use engine::{LandedCostEngine, PriceQuote, PricingEngine, PricingRates, PricingTraceStep};
pub use tariff::{ShippingTable, ShippingTier, Weight};

/// Largest listed price any input path accepts, in the listing currency.
pub const MAX_LISTED_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("listed price `{0}` is not a positive amount")]
    InvalidPrice(String),
    #[error("listed price {price} exceeds the {limit} limit")]
    PriceTooHigh { price: Decimal, limit: Decimal },
    #[error("unsupported shipping tier `{0}`")]
    UnknownTier(String),
    #[error("weight {weight} is not listed for shipping tier {tier}")]
    UnknownWeight { tier: ShippingTier, weight: Weight },
    #[error("weight `{0}` is not a positive kilogram figure")]
    InvalidWeight(String),
}

/// Parses user-typed or scraped price text (`29.99`, `€29,99`, `ab 1.299,00 €`).
///
/// Currency symbols, words and spaces are dropped. A comma is the decimal
/// separator when present, in which case dots are thousands separators.
/// Amounts above [`MAX_LISTED_PRICE`] are rejected.
pub fn parse_listed_price(text: &str) -> Result<Decimal, PricingError> {
    let invalid = || PricingError::InvalidPrice(text.trim().to_owned());
    if text.contains('-') {
        return Err(invalid());
    }

    let kept: String =
        text.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',').collect();
    let normalized =
        if kept.contains(',') { kept.replace('.', "").replace(',', ".") } else { kept };
    if normalized.is_empty() {
        return Err(invalid());
    }

    let price = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    if price <= Decimal::ZERO {
        return Err(invalid());
    }
    if price > MAX_LISTED_PRICE {
        return Err(PricingError::PriceTooHigh { price, limit: MAX_LISTED_PRICE });
    }
    Ok(price)
}

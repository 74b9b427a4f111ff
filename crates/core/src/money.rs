use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO-4217 style currency code, always stored upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn rub() -> Self {
        Self::new("RUB")
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn symbol(&self) -> Option<&'static str> {
        match self.0.as_str() {
            "EUR" => Some("€"),
            "RUB" => Some("₽"),
            "USD" => Some("$"),
            _ => None,
        }
    }

    /// Decimal places used when showing amounts to users.
    pub fn display_scale(&self) -> u32 {
        match self.0.as_str() {
            "RUB" => 0,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Renders `€121.80` for prefix-symbol currencies and `12 345 ₽` for the rouble.
    pub fn display(&self) -> String {
        let scale = self.currency.display_scale();
        let rounded =
            self.amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        match (self.currency.symbol(), scale) {
            (Some(symbol), 0) => format!("{} {symbol}", group_thousands(rounded, 0)),
            (Some(symbol), _) => format!("{symbol}{}", format_fixed(rounded, scale)),
            (None, _) => format!("{} {}", format_fixed(rounded, scale), self.currency),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Half-away-from-zero rounding to cents, applied after every pricing step.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn format_fixed(value: Decimal, scale: u32) -> String {
    let mut value = value;
    value.rescale(scale);
    value.to_string()
}

fn group_thousands(value: Decimal, scale: u32) -> String {
    let rendered = format_fixed(value, scale);
    let (sign, digits) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered.as_str()),
    };
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShippingTier {
    #[serde(rename = "EMS")]
    Ems,
}

impl ShippingTier {
    pub const ALL: [ShippingTier; 1] = [ShippingTier::Ems];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ems => "EMS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ems => "EMS express mail",
        }
    }
}

impl fmt::Display for ShippingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ShippingTier {
    type Err = PricingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ems" => Ok(Self::Ems),
            other => Err(PricingError::UnknownTier(other.to_owned())),
        }
    }
}

/// Parcel weight held in whole grams so table lookups are exact key matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(u32);

impl Weight {
    pub fn from_grams(grams: u32) -> Self {
        Self(grams)
    }

    pub fn grams(&self) -> u32 {
        self.0
    }

    pub fn kilograms(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 3).normalize()
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kg", self.kilograms())
    }
}

impl FromStr for Weight {
    type Err = PricingError;

    /// Parses a kilogram figure such as `1.5`, `1,5` or `2 kg`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned = value.trim().trim_end_matches("kg").trim().replace(',', ".");
        let invalid = || PricingError::InvalidWeight(value.trim().to_owned());
        let kilograms = Decimal::from_str(&cleaned).map_err(|_| invalid())?;
        let grams = kilograms.checked_mul(Decimal::from(1000)).ok_or_else(invalid)?;
        if grams <= Decimal::ZERO || grams.fract() != Decimal::ZERO {
            return Err(invalid());
        }
        let grams = grams.to_u32().ok_or_else(invalid)?;
        Ok(Self(grams))
    }
}

/// Static weight-indexed cost tables for every shipping tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingTable {
    tiers: BTreeMap<ShippingTier, BTreeMap<Weight, Decimal>>,
}

impl Default for ShippingTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ShippingTable {
    pub fn new(tiers: BTreeMap<ShippingTier, BTreeMap<Weight, Decimal>>) -> Self {
        Self { tiers }
    }

    /// EMS rates from the German warehouse, in euros, half-kilogram steps up to 8 kg.
    pub fn standard() -> Self {
        let ems = [
            (500, 1569),
            (1000, 1739),
            (1500, 2165),
            (2000, 2335),
            (2500, 2550),
            (3000, 2720),
            (3500, 2974),
            (4000, 3144),
            (4500, 3359),
            (5000, 3529),
            (5500, 3744),
            (6000, 3914),
            (6500, 4129),
            (7000, 4299),
            (7500, 4514),
            (8000, 4684),
        ]
        .into_iter()
        .map(|(grams, cents)| (Weight::from_grams(grams), Decimal::new(cents, 2)))
        .collect();

        let mut tiers = BTreeMap::new();
        tiers.insert(ShippingTier::Ems, ems);
        Self { tiers }
    }

    pub fn tiers(&self) -> impl Iterator<Item = ShippingTier> + '_ {
        self.tiers.keys().copied()
    }

    pub fn weights(&self, tier: ShippingTier) -> Result<Vec<(Weight, Decimal)>, PricingError> {
        let table = self
            .tiers
            .get(&tier)
            .ok_or_else(|| PricingError::UnknownTier(tier.code().to_owned()))?;
        Ok(table.iter().map(|(weight, cost)| (*weight, *cost)).collect())
    }

    pub fn lookup(&self, tier: ShippingTier, weight: Weight) -> Result<Decimal, PricingError> {
        let table = self
            .tiers
            .get(&tier)
            .ok_or_else(|| PricingError::UnknownTier(tier.code().to_owned()))?;
        table.get(&weight).copied().ok_or(PricingError::UnknownWeight { tier, weight })
    }
}

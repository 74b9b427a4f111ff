use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PricingError, ShippingTable, ShippingTier, Weight, MAX_LISTED_PRICE};
use crate::money::{round_money, Currency, Money};

/// Business constants the landed-cost formula depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRates {
    pub vat_rate: Decimal,
    pub commission_rate: Decimal,
    pub insurance_rate: Decimal,
    pub warehouse_leg: Decimal,
    pub duty_threshold: Decimal,
    pub duty_rate: Decimal,
    #[serde(default = "default_max_listed_price")]
    pub max_listed_price: Decimal,
}

fn default_max_listed_price() -> Decimal {
    MAX_LISTED_PRICE
}

impl Default for PricingRates {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(19, 2),
            commission_rate: Decimal::new(15, 2),
            insurance_rate: Decimal::new(3, 2),
            warehouse_leg: Decimal::new(500, 2),
            duty_threshold: Decimal::from(200),
            duty_rate: Decimal::new(15, 2),
            max_listed_price: MAX_LISTED_PRICE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

/// Frozen result of one landed-cost calculation. Every figure is already rounded to cents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub currency: Currency,
    pub tier: ShippingTier,
    pub weight: Weight,
    pub listed_price: Decimal,
    pub net_price: Decimal,
    pub warehouse_leg: Decimal,
    pub international_leg: Decimal,
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub insurance: Decimal,
    pub total: Decimal,
    pub savings: Decimal,
    pub vat_rate: Decimal,
}

impl PriceQuote {
    /// What the item would have cost with origin VAT left in. Display only.
    pub fn total_with_notional_vat(&self) -> Decimal {
        round_money(self.total.saturating_mul(Decimal::ONE + self.vat_rate))
    }

    pub fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency.clone())
    }

    pub fn trace(&self) -> Vec<PricingTraceStep> {
        let step = |stage: &str, detail: String, amount: Decimal| PricingTraceStep {
            stage: stage.to_owned(),
            detail,
            amount,
        };
        vec![
            step("listed_price", "price as listed by the store".to_owned(), self.listed_price),
            step(
                "net_price",
                format!("listed_price - listed_price * {}", self.vat_rate),
                self.net_price,
            ),
            step("warehouse_leg", "store to warehouse forwarding".to_owned(), self.warehouse_leg),
            step(
                "international_leg",
                format!("{} tariff for {}", self.tier, self.weight),
                self.international_leg,
            ),
            step(
                "subtotal",
                "net_price + warehouse_leg + international_leg".to_owned(),
                self.subtotal,
            ),
            step("commission", "subtotal * commission_rate".to_owned(), self.commission),
            step(
                "insurance",
                "(net_price + commission) * insurance_rate".to_owned(),
                self.insurance,
            ),
            step("total", "subtotal + commission + insurance".to_owned(), self.total),
            step("savings", "listed_price - net_price".to_owned(), self.savings),
        ]
    }
}

pub trait PricingEngine: Send + Sync {
    fn quote(
        &self,
        listed_price: &Money,
        tier: ShippingTier,
        weight: Weight,
    ) -> Result<PriceQuote, PricingError>;
}

#[derive(Clone, Debug)]
pub struct LandedCostEngine {
    rates: PricingRates,
    table: Arc<ShippingTable>,
}

impl Default for LandedCostEngine {
    fn default() -> Self {
        Self::new(PricingRates::default(), Arc::new(ShippingTable::standard()))
    }
}

impl LandedCostEngine {
    pub fn new(rates: PricingRates, table: Arc<ShippingTable>) -> Self {
        Self { rates, table }
    }

    pub fn rates(&self) -> &PricingRates {
        &self.rates
    }

    pub fn table(&self) -> &ShippingTable {
        &self.table
    }

    /// Estimated import duty for prices above the customs threshold.
    pub fn duty_estimate(&self, listed_price: Decimal) -> Option<Decimal> {
        (listed_price > self.rates.duty_threshold).then(|| {
            round_money((listed_price - self.rates.duty_threshold) * self.rates.duty_rate)
        })
    }
}

impl PricingEngine for LandedCostEngine {
    fn quote(
        &self,
        listed_price: &Money,
        tier: ShippingTier,
        weight: Weight,
    ) -> Result<PriceQuote, PricingError> {
        let listed = listed_price.amount;
        if listed <= Decimal::ZERO {
            return Err(PricingError::InvalidPrice(listed.to_string()));
        }
        let rates = &self.rates;
        if listed > rates.max_listed_price {
            return Err(PricingError::PriceTooHigh { price: listed, limit: rates.max_listed_price });
        }

        let net_price = round_money(listed - listed * rates.vat_rate);
        let warehouse_leg = round_money(rates.warehouse_leg);
        let international_leg = round_money(self.table.lookup(tier, weight)?);
        let subtotal = round_money(net_price + warehouse_leg + international_leg);
        let commission = round_money(subtotal * rates.commission_rate);
        // The insurance base leaves the international leg out.
        let insurance = round_money((net_price + commission) * rates.insurance_rate);
        let total = round_money(subtotal + commission + insurance);
        let savings = round_money(listed - net_price);

        Ok(PriceQuote {
            currency: listed_price.currency.clone(),
            tier,
            weight,
            listed_price: listed,
            net_price,
            warehouse_leg,
            international_leg,
            subtotal,
            commission,
            insurance,
            total,
            savings,
            vat_rate: rates.vat_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use std::sync::Arc;

    use super::{LandedCostEngine, PricingEngine, PricingRates};
    use crate::money::{round_money, Currency, Money};
    use crate::pricing::{PricingError, ShippingTable, ShippingTier, Weight};

    fn euros(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::eur())
    }

    #[test]
    fn hundred_euro_item_at_one_kilogram_matches_reference_breakdown() {
        let engine = LandedCostEngine::default();
        let quote = engine
            .quote(&euros(100_00), ShippingTier::Ems, Weight::from_grams(1000))
            .expect("quote should compute");

        assert_eq!(quote.net_price, Decimal::new(8100, 2));
        assert_eq!(quote.warehouse_leg, Decimal::new(500, 2));
        assert_eq!(quote.international_leg, Decimal::new(1739, 2));
        assert_eq!(quote.subtotal, Decimal::new(10339, 2));
        assert_eq!(quote.commission, Decimal::new(1551, 2));
        assert_eq!(quote.insurance, Decimal::new(290, 2));
        assert_eq!(quote.total, Decimal::new(12180, 2));
        assert_eq!(quote.savings, Decimal::new(1900, 2));
        assert_eq!(quote.currency, Currency::eur());
    }

    #[test]
    fn step_relations_hold_across_prices_and_weights() {
        let engine = LandedCostEngine::default();
        let table = ShippingTable::standard();
        let weights = table.weights(ShippingTier::Ems).expect("ems weights");

        for cents in [1, 99, 1_999, 12_345, 19_999, 20_001, 99_999, 1_234_567] {
            for (weight, leg) in &weights {
                let quote = engine
                    .quote(&euros(cents), ShippingTier::Ems, *weight)
                    .expect("quote should compute");
                let listed = Decimal::new(cents, 2);

                assert_eq!(quote.net_price, round_money(listed * Decimal::new(81, 2)));
                assert_eq!(quote.international_leg, *leg);
                assert_eq!(
                    quote.commission,
                    round_money(
                        (quote.net_price + quote.warehouse_leg + quote.international_leg)
                            * Decimal::new(15, 2)
                    )
                );
                assert_eq!(
                    quote.insurance,
                    round_money((quote.net_price + quote.commission) * Decimal::new(3, 2))
                );
                assert_eq!(
                    quote.total,
                    round_money(
                        quote.net_price
                            + quote.warehouse_leg
                            + quote.international_leg
                            + quote.commission
                            + quote.insurance
                    )
                );
                assert_eq!(quote.savings, listed - quote.net_price);
            }
        }
    }

    #[test]
    fn unlisted_weight_never_falls_back_to_nearest_step() {
        let engine = LandedCostEngine::default();
        let error = engine
            .quote(&euros(100_00), ShippingTier::Ems, Weight::from_grams(1250))
            .expect_err("1.25 kg is not a tariff step");

        assert_eq!(
            error,
            PricingError::UnknownWeight {
                tier: ShippingTier::Ems,
                weight: Weight::from_grams(1250)
            }
        );
    }

    #[test]
    fn non_positive_prices_are_rejected() {
        let engine = LandedCostEngine::default();
        for cents in [0, -100] {
            let result = engine.quote(&euros(cents), ShippingTier::Ems, Weight::from_grams(500));
            assert!(matches!(result, Err(PricingError::InvalidPrice(_))));
        }
    }

    #[test]
    fn prices_above_the_configured_limit_are_rejected() {
        let rates =
            PricingRates { max_listed_price: Decimal::from(500), ..PricingRates::default() };
        let engine = LandedCostEngine::new(rates, Arc::new(ShippingTable::standard()));

        engine
            .quote(&euros(500_00), ShippingTier::Ems, Weight::from_grams(500))
            .expect("price at the limit is quoted");
        let error = engine
            .quote(&euros(500_01), ShippingTier::Ems, Weight::from_grams(500))
            .expect_err("price above the limit");
        assert_eq!(
            error,
            PricingError::PriceTooHigh { price: Decimal::new(50001, 2), limit: Decimal::from(500) }
        );

        let huge = Money::new(Decimal::MAX, Currency::eur());
        let result =
            LandedCostEngine::default().quote(&huge, ShippingTier::Ems, Weight::from_grams(500));
        assert!(matches!(result, Err(PricingError::PriceTooHigh { .. })));
    }

    #[test]
    fn notional_vat_total_is_display_only() {
        let engine = LandedCostEngine::default();
        let quote = engine
            .quote(&euros(100_00), ShippingTier::Ems, Weight::from_grams(1000))
            .expect("quote should compute");

        assert_eq!(quote.total_with_notional_vat(), Decimal::new(14494, 2));
        assert_eq!(quote.total, Decimal::new(12180, 2));
    }

    #[test]
    fn duty_estimate_only_applies_above_threshold() {
        let engine = LandedCostEngine::default();

        assert_eq!(engine.duty_estimate(Decimal::from(200)), None);
        assert_eq!(engine.duty_estimate(Decimal::from(300)), Some(Decimal::new(1500, 2)));
    }

    #[test]
    fn trace_lists_every_stage_in_formula_order() {
        let engine = LandedCostEngine::default();
        let quote = engine
            .quote(&euros(100_00), ShippingTier::Ems, Weight::from_grams(1000))
            .expect("quote should compute");
        let stages: Vec<_> = quote.trace().into_iter().map(|step| step.stage).collect();

        assert_eq!(
            stages,
            vec![
                "listed_price",
                "net_price",
                "warehouse_leg",
                "international_leg",
                "subtotal",
                "commission",
                "insurance",
                "total",
                "savings",
            ]
        );
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{round_money, Currency, Money};
use crate::pricing::{PriceQuote, PricingEngine, ShippingTier, Weight};

pub const MAX_QUANTITY: u32 = 999;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    Calculation,
    Search,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart has no item at position {index} (cart holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("quantity {0} is outside 1..=999")]
    InvalidQuantity(u32),
    #[error("no calculated quote is pending for this session")]
    MissingQuote,
}

/// One cart line. Pricing fields are captured when the line is added and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub source: ItemSource,
    pub title: Option<String>,
    pub currency: Currency,
    pub listed_price: Option<Decimal>,
    pub tier: Option<ShippingTier>,
    pub weight: Option<Weight>,
    pub quote: Option<PriceQuote>,
    pub quantity: u32,
    pub link: Option<String>,
    pub features: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn from_quote(
        quote: PriceQuote,
        quantity: u32,
        link: Option<String>,
        features: Option<String>,
    ) -> Result<Self, CartError> {
        validate_quantity(quantity)?;
        Ok(Self {
            source: ItemSource::Calculation,
            title: None,
            currency: quote.currency.clone(),
            listed_price: Some(quote.listed_price),
            tier: Some(quote.tier),
            weight: Some(quote.weight),
            quote: Some(quote),
            quantity,
            link,
            features,
            added_at: Utc::now(),
        })
    }

    /// A search hit added without a delivery calculation.
    pub fn from_listing(
        title: impl Into<String>,
        listed_price: Option<Decimal>,
        currency: Currency,
        link: impl Into<String>,
        quantity: u32,
    ) -> Result<Self, CartError> {
        validate_quantity(quantity)?;
        Ok(Self {
            source: ItemSource::Search,
            title: Some(title.into()),
            currency,
            listed_price,
            tier: None,
            weight: None,
            quote: None,
            quantity,
            link: Some(link.into()),
            features: None,
            added_at: Utc::now(),
        })
    }

    /// The frozen quote, or a fresh one for legacy lines that carry only their inputs.
    pub fn effective_quote(&self, engine: &dyn PricingEngine) -> Option<PriceQuote> {
        if let Some(quote) = &self.quote {
            return Some(quote.clone());
        }
        let (price, tier, weight) = (self.listed_price?, self.tier?, self.weight?);
        engine.quote(&Money::new(price, self.currency.clone()), tier, weight).ok()
    }

    /// Per-unit landed total; zero when the line cannot be priced.
    pub fn unit_total(&self, engine: &dyn PricingEngine) -> Decimal {
        self.effective_quote(engine).map(|quote| quote.total).unwrap_or(Decimal::ZERO)
    }

    /// Saturates at `Decimal::MAX` rather than overflowing.
    pub fn line_total(&self, engine: &dyn PricingEngine) -> Decimal {
        round_money(self.unit_total(engine).saturating_mul(Decimal::from(self.quantity)))
    }

    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        match (&self.tier, &self.weight) {
            (Some(tier), Some(weight)) => format!("Calculated item ({tier}, {weight})"),
            _ => "Item".to_owned(),
        }
    }
}

pub fn validate_quantity(quantity: u32) -> Result<u32, CartError> {
    if (1..=MAX_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(CartError::InvalidQuantity(quantity))
    }
}

/// Ordered lines owned by one session. Insertion order is display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without merging, even when an identical line already exists.
    pub fn add(&mut self, item: CartItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> Result<CartItem, CartError> {
        if index >= self.items.len() {
            return Err(CartError::IndexOutOfRange { index, len: self.items.len() });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self, engine: &dyn PricingEngine) -> Decimal {
        let total = self
            .items
            .iter()
            .map(|item| item.line_total(engine))
            .fold(Decimal::ZERO, Decimal::saturating_add);
        round_money(total)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Cart, CartError, CartItem, ItemSource};
    use crate::money::{Currency, Money};
    use crate::pricing::{LandedCostEngine, PricingEngine, ShippingTier, Weight};

    fn quoted_item(euros: i64, quantity: u32, link: &str) -> CartItem {
        let engine = LandedCostEngine::default();
        let quote = engine
            .quote(
                &Money::new(Decimal::from(euros), Currency::eur()),
                ShippingTier::Ems,
                Weight::from_grams(1000),
            )
            .expect("quote");
        CartItem::from_quote(quote, quantity, Some(link.to_owned()), None).expect("item")
    }

    #[test]
    fn identical_lines_are_never_merged() {
        let mut cart = Cart::new();
        cart.add(quoted_item(100, 1, "https://shop.example/a"));
        cart.add(quoted_item(100, 1, "https://shop.example/a"));

        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn remove_reindexes_remaining_lines() {
        let mut cart = Cart::new();
        for link in ["a", "b", "c", "d"] {
            cart.add(quoted_item(100, 1, link));
        }

        let first = cart.remove(1).expect("index 1 exists");
        let second = cart.remove(1).expect("index 1 exists after shift");

        assert_eq!(first.link.as_deref(), Some("b"));
        assert_eq!(second.link.as_deref(), Some("c"));
        assert_eq!(cart.len(), 2);
        let remaining: Vec<_> = cart.items().iter().filter_map(|item| item.link.clone()).collect();
        assert_eq!(remaining, vec!["a", "d"]);
    }

    #[test]
    fn remove_out_of_range_leaves_cart_untouched() {
        let mut cart = Cart::new();
        cart.add(quoted_item(100, 1, "a"));

        assert_eq!(cart.remove(1), Err(CartError::IndexOutOfRange { index: 1, len: 1 }));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn clear_then_add_holds_only_new_item() {
        let mut cart = Cart::new();
        cart.add(quoted_item(100, 1, "old"));
        cart.add(quoted_item(50, 2, "older"));
        cart.clear();
        cart.add(quoted_item(70, 1, "new"));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].link.as_deref(), Some("new"));
    }

    #[test]
    fn total_multiplies_frozen_totals_by_quantity() {
        let engine = LandedCostEngine::default();
        let mut cart = Cart::new();
        cart.add(quoted_item(100, 2, "a"));
        cart.add(quoted_item(100, 1, "b"));

        assert_eq!(cart.total(&engine), Decimal::new(36540, 2));
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let engine = LandedCostEngine::default();
        let mut item = quoted_item(100, 999, "a");
        if let Some(quote) = item.quote.as_mut() {
            quote.total = Decimal::MAX;
        }
        let mut cart = Cart::new();
        cart.add(item.clone());
        cart.add(item.clone());

        assert_eq!(item.line_total(&engine), Decimal::MAX);
        assert_eq!(cart.total(&engine), Decimal::MAX);
    }

    #[test]
    fn frozen_quote_is_used_even_if_inputs_change() {
        let engine = LandedCostEngine::default();
        let mut item = quoted_item(100, 1, "a");
        item.listed_price = Some(Decimal::from(5000));

        assert_eq!(item.unit_total(&engine), Decimal::new(12180, 2));
    }

    #[test]
    fn legacy_lines_are_recomputed_or_count_as_zero() {
        let engine = LandedCostEngine::default();
        let mut legacy = quoted_item(100, 1, "a");
        legacy.quote = None;

        let mut incomplete = legacy.clone();
        incomplete.weight = None;

        let listing = CartItem::from_listing(
            "Espresso machine",
            Some(Decimal::new(24_999, 2)),
            Currency::eur(),
            "https://www.idealo.de/x",
            1,
        )
        .expect("listing item");
        assert_eq!(listing.source, ItemSource::Search);

        let mut cart = Cart::new();
        cart.add(legacy);
        cart.add(incomplete);
        cart.add(listing);

        assert_eq!(cart.total(&engine), Decimal::new(12180, 2));
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        let engine = LandedCostEngine::default();
        let quote = engine
            .quote(
                &Money::new(Decimal::from(10), Currency::eur()),
                ShippingTier::Ems,
                Weight::from_grams(500),
            )
            .expect("quote");

        assert_eq!(
            CartItem::from_quote(quote.clone(), 0, None, None),
            Err(CartError::InvalidQuantity(0))
        );
        assert_eq!(
            CartItem::from_quote(quote.clone(), 1000, None, None),
            Err(CartError::InvalidQuantity(1000))
        );
        assert!(CartItem::from_quote(quote, 999, None, None).is_ok());
    }
}

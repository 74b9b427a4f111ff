use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

use landed_core::domain::{Cart, CartItem, ChatContact, CustomerDetails, OrderId, OrderRecord};
use landed_core::money::{Currency, Money};
use landed_core::pricing::{LandedCostEngine, PricingEngine, ShippingTier, Weight};
use landed_core::submission::OrderStore;
use landed_store::JsonFileOrderStore;

type OrderFileTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn require_field<'a>(value: &'a Value, field_name: &str) -> OrderFileTestResult<&'a Value> {
    value.get(field_name).ok_or_else(|| format!("{field_name} should be present"))
}

fn sample_order(id: u64) -> OrderFileTestResult<OrderRecord> {
    let engine = LandedCostEngine::default();
    let quote = engine
        .quote(
            &Money::new(Decimal::from(100), Currency::eur()),
            ShippingTier::Ems,
            Weight::from_grams(1000),
        )
        .map_err(|error| error.to_string())?;

    let mut cart = Cart::new();
    cart.add(
        CartItem::from_quote(
            quote,
            2,
            Some("https://shop.example/boots".to_owned()),
            Some("size 42".to_owned()),
        )
        .map_err(|error| error.to_string())?,
    );
    cart.add(
        CartItem::from_listing(
            "Rain jacket",
            Some(Decimal::new(5990, 2)),
            Currency::eur(),
            "https://www.idealo.de/preisvergleich/OffersOfProduct/42.html",
            1,
        )
        .map_err(|error| error.to_string())?,
    );

    let created_at = Utc
        .with_ymd_and_hms(2030, 5, 1, 10, 30, 0)
        .single()
        .ok_or_else(|| "timestamp should be unambiguous".to_owned())?;
    OrderRecord::assemble(
        OrderId(id),
        created_at,
        CustomerDetails {
            name: "Ivan Petrov".to_owned(),
            phone: "+7 901 111 22 33".to_owned(),
            email: "ivan@example.com".to_owned(),
            address: "Kazan, Baumana 5".to_owned(),
        },
        ChatContact { user_id: "1001".to_owned(), username: Some("ivan".to_owned()) },
        &cart,
        &engine,
    )
    .map_err(|error| error.to_string())
}

#[tokio::test]
async fn order_file_is_keyed_by_id_and_holds_every_field() -> OrderFileTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let store = JsonFileOrderStore::new(dir.path().join("orders"));
    let order = sample_order(1_900_000_123)?;

    let location = store.persist(&order).await.map_err(|error| error.to_string())?;
    require!(location.ends_with("order_1900000123.json"), "unexpected location {location}");

    let raw = std::fs::read_to_string(&location).map_err(|error| error.to_string())?;
    require!(raw.contains('\n'), "order file should be pretty-printed");

    let document: Value = serde_json::from_str(&raw).map_err(|error| error.to_string())?;
    require_eq!(require_field(&document, "order_id")?.as_u64(), Some(1_900_000_123));
    require_eq!(require_field(&document, "items_count")?.as_u64(), Some(2));
    require_eq!(require_field(&document, "feature_notes")?.as_str(), Some("size 42"));

    let customer = require_field(&document, "customer")?;
    require_eq!(require_field(customer, "address")?.as_str(), Some("Kazan, Baumana 5"));

    let contact = require_field(&document, "contact")?;
    require_eq!(require_field(contact, "username")?.as_str(), Some("ivan"));

    let items = require_field(&document, "items")?
        .as_array()
        .ok_or_else(|| "items should be an array".to_owned())?;
    require_eq!(items.len(), 2);
    require_eq!(require_field(&items[0], "source")?.as_str(), Some("calculation"));
    require_eq!(require_field(&items[1], "source")?.as_str(), Some("search"));
    require_eq!(require_field(&items[0], "quantity")?.as_u64(), Some(2));

    let decoded: OrderRecord = serde_json::from_str(&raw).map_err(|error| error.to_string())?;
    require_eq!(decoded, order);
    Ok(())
}

#[tokio::test]
async fn list_returns_orders_sorted_and_skips_foreign_files() -> OrderFileTestResult {
    let dir = TempDir::new().map_err(|error| error.to_string())?;
    let store = JsonFileOrderStore::new(dir.path());

    store.persist(&sample_order(30)?).await.map_err(|error| error.to_string())?;
    store.persist(&sample_order(10)?).await.map_err(|error| error.to_string())?;
    std::fs::write(dir.path().join("notes.txt"), "operator scratchpad")
        .map_err(|error| error.to_string())?;
    std::fs::write(dir.path().join("order_99.json"), "{ truncated")
        .map_err(|error| error.to_string())?;

    let orders = store.list().await.map_err(|error| error.to_string())?;
    let ids: Vec<u64> = orders.iter().map(|order| order.order_id.0).collect();

    require_eq!(ids, vec![10, 30]);
    require!(
        !dir.path().join("order_10.json.tmp").exists(),
        "staging files should be renamed into place"
    );
    Ok(())
}

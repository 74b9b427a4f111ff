use std::env;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use landed_cli::commands::{doctor, orders, quote, tariffs};
use rust_decimal::Decimal;
use serde_json::Value;

const BOT_TOKEN: (&str, &str) = ("LANDED_TELEGRAM_BOT_TOKEN", "12345:test");

#[test]
fn quote_reports_landed_cost_as_json() {
    with_env(&[BOT_TOKEN], || {
        let result = quote::run("100", "ems", "1", true);
        assert_eq!(result.exit_code, 0, "expected successful quote: {}", result.output);

        let payload = parse_payload(&result.output);
        let total = payload["quote"]["total"].as_str().expect("total is a decimal string");
        assert_eq!(Decimal::from_str(total).expect("decimal"), Decimal::new(12180, 2));
        assert_eq!(payload["quote"]["tier"], "EMS");
        assert!(payload["trace"].as_array().is_some_and(|steps| !steps.is_empty()));
    });
}

#[test]
fn quote_human_output_lists_each_stage() {
    with_env(&[BOT_TOKEN], || {
        let result = quote::run("100,00", "EMS", "1", false);
        assert_eq!(result.exit_code, 0, "expected successful quote: {}", result.output);
        assert!(result.output.starts_with("landed cost for €100.00"), "{}", result.output);
        assert!(result.output.contains("saved VAT"), "{}", result.output);
    });
}

#[test]
fn quote_rejects_malformed_input() {
    with_env(&[BOT_TOKEN], || {
        let result = quote::run("abc", "ems", "1", true);
        assert_eq!(result.exit_code, 4, "expected invalid input code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn quote_returns_config_failure_without_bot_token() {
    with_env(&[], || {
        let result = quote::run("100", "ems", "1", true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn tariffs_list_the_ems_table() {
    with_env(&[], || {
        let result = tariffs::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let tiers = payload.as_array().expect("tier list");
        let ems = tiers.iter().find(|tier| tier["code"] == "EMS").expect("EMS tier present");
        let rows = ems["rows"].as_array().expect("rows");
        assert_eq!(rows.len(), 16);
        let grams: Vec<u64> = rows.iter().filter_map(|row| row["grams"].as_u64()).collect();
        assert!(grams.windows(2).all(|pair| pair[0] < pair[1]));
    });
}

#[test]
fn orders_list_is_empty_for_a_fresh_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orders_dir = dir.path().join("orders");
    let orders_dir = orders_dir.to_string_lossy().into_owned();

    with_env(&[BOT_TOKEN, ("LANDED_ORDERS_DIRECTORY", &orders_dir)], || {
        let result = orders::list(true);
        assert_eq!(result.exit_code, 0, "expected empty listing: {}", result.output);
        assert_eq!(parse_payload(&result.output), Value::Array(Vec::new()));

        let human = orders::list(false);
        assert!(human.output.starts_with("no orders stored"), "{}", human.output);
    });
}

#[test]
fn doctor_skips_runtime_checks_when_config_is_invalid() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(check_status(checks, "config_validation"), "fail");
        assert_eq!(check_status(checks, "orders_directory"), "skipped");
        assert_eq!(check_status(checks, "currency_provider"), "skipped");
    });
}

#[test]
fn doctor_reports_unreachable_rate_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orders_dir = dir.path().to_string_lossy().into_owned();

    with_env(
        &[
            BOT_TOKEN,
            ("LANDED_ORDERS_DIRECTORY", &orders_dir),
            ("LANDED_CURRENCY_PROVIDER_BASE_URL", "http://127.0.0.1:9"),
            ("LANDED_CURRENCY_TIMEOUT_SECS", "1"),
        ],
        || {
            let payload = parse_payload(&doctor::run(true));
            assert_eq!(payload["overall_status"], "fail");

            let checks = payload["checks"].as_array().expect("checks");
            assert_eq!(check_status(checks, "config_validation"), "pass");
            assert_eq!(check_status(checks, "orders_directory"), "pass");
            assert_eq!(check_status(checks, "currency_provider"), "fail");
        },
    );
}

fn check_status<'a>(checks: &'a [Value], name: &str) -> &'a str {
    checks
        .iter()
        .find(|check| check["name"] == name)
        .and_then(|check| check["status"].as_str())
        .unwrap_or("missing")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LANDED_TELEGRAM_BOT_TOKEN",
        "LANDED_TELEGRAM_API_BASE_URL",
        "LANDED_TELEGRAM_OPERATOR_CHAT_ID",
        "LANDED_PRICING_SOURCE_CURRENCY",
        "LANDED_PRICING_DISPLAY_CURRENCY",
        "LANDED_PRICING_MAX_LISTED_PRICE",
        "LANDED_CURRENCY_PROVIDER_BASE_URL",
        "LANDED_CURRENCY_TIMEOUT_SECS",
        "LANDED_SEARCH_ENABLED",
        "LANDED_SEARCH_API_KEY",
        "LANDED_SPREADSHEET_WEBHOOK_URL",
        "LANDED_ORDERS_DIRECTORY",
        "LANDED_SERVER_BIND_ADDRESS",
        "LANDED_SERVER_HEALTH_CHECK_PORT",
        "LANDED_LOGGING_LEVEL",
        "LANDED_LOGGING_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

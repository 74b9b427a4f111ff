use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use landed_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_owned()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(
            key_path,
            &env_key(key_path),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let optional = |value: Option<&str>| value.unwrap_or("<unset>").to_owned();
    let secret_presence = |present: bool| if present { "<redacted>" } else { "<unset>" }.to_owned();

    vec![
        ("telegram.bot_token", redact_token(config.telegram.bot_token.expose_secret())),
        ("telegram.api_base_url", config.telegram.api_base_url.clone()),
        ("telegram.poll_timeout_secs", config.telegram.poll_timeout_secs.to_string()),
        ("telegram.operator_chat_id", optional(config.telegram.operator_chat_id.as_deref())),
        ("pricing.vat_rate", config.pricing.vat_rate.to_string()),
        ("pricing.commission_rate", config.pricing.commission_rate.to_string()),
        ("pricing.insurance_rate", config.pricing.insurance_rate.to_string()),
        ("pricing.warehouse_leg", config.pricing.warehouse_leg.to_string()),
        ("pricing.duty_threshold", config.pricing.duty_threshold.to_string()),
        ("pricing.duty_rate", config.pricing.duty_rate.to_string()),
        ("pricing.max_listed_price", config.pricing.max_listed_price.to_string()),
        ("pricing.source_currency", config.pricing.source_currency.code().to_owned()),
        ("pricing.display_currency", config.pricing.display_currency.code().to_owned()),
        ("currency.provider_base_url", config.currency.provider_base_url.clone()),
        ("currency.markup", config.currency.markup.to_string()),
        ("currency.cache_ttl_secs", config.currency.cache_ttl_secs.to_string()),
        ("currency.timeout_secs", config.currency.timeout_secs.to_string()),
        ("search.enabled", config.search.enabled.to_string()),
        ("search.api_key", secret_presence(config.search.api_key.is_some())),
        ("search.endpoint", config.search.endpoint.clone()),
        ("search.result_limit", config.search.result_limit.to_string()),
        ("search.timeout_secs", config.search.timeout_secs.to_string()),
        ("spreadsheet.webhook_url", secret_presence(config.spreadsheet.webhook_url.is_some())),
        ("spreadsheet.timeout_secs", config.spreadsheet.timeout_secs.to_string()),
        ("orders.directory", config.orders.directory.display().to_string()),
        ("session.idle_ttl_secs", config.session.idle_ttl_secs.to_string()),
        ("session.max_sessions", config.session.max_sessions.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.health_check_port", config.server.health_check_port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `telegram.bot_token` maps to `LANDED_TELEGRAM_BOT_TOKEN`.
fn env_key(key_path: &str) -> String {
    format!("LANDED_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("landed.toml"), PathBuf::from("config/landed.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_owned());
            return format!("file ({file_path})");
        }
    }

    "default".to_owned()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id before `:` and hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_owned();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_owned()
}

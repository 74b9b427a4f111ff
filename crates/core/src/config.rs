use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Currency;
use crate::pricing::{PricingRates, MAX_LISTED_PRICE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub pricing: PricingConfig,
    pub currency: CurrencyConfig,
    pub search: SearchConfig,
    pub spreadsheet: SpreadsheetConfig,
    pub orders: OrdersConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub operator_chat_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub vat_rate: Decimal,
    pub commission_rate: Decimal,
    pub insurance_rate: Decimal,
    pub warehouse_leg: Decimal,
    pub duty_threshold: Decimal,
    pub duty_rate: Decimal,
    pub max_listed_price: Decimal,
    pub source_currency: Currency,
    pub display_currency: Currency,
}

impl PricingConfig {
    pub fn rates(&self) -> PricingRates {
        PricingRates {
            vat_rate: self.vat_rate,
            commission_rate: self.commission_rate,
            insurance_rate: self.insurance_rate,
            warehouse_leg: self.warehouse_leg,
            duty_threshold: self.duty_threshold,
            duty_rate: self.duty_rate,
            max_listed_price: self.max_listed_price,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CurrencyConfig {
    pub provider_base_url: String,
    pub markup: Decimal,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl CurrencyConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub result_limit: usize,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SpreadsheetConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrdersConfig {
    pub directory: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
    pub max_sessions: usize,
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub operator_chat_id: Option<String>,
    pub orders_directory: Option<PathBuf>,
    pub search_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let rates = PricingRates::default();
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_owned(),
                poll_timeout_secs: 30,
                operator_chat_id: None,
            },
            pricing: PricingConfig {
                vat_rate: rates.vat_rate,
                commission_rate: rates.commission_rate,
                insurance_rate: rates.insurance_rate,
                warehouse_leg: rates.warehouse_leg,
                duty_threshold: rates.duty_threshold,
                duty_rate: rates.duty_rate,
                max_listed_price: rates.max_listed_price,
                source_currency: Currency::eur(),
                display_currency: Currency::rub(),
            },
            currency: CurrencyConfig {
                provider_base_url: "https://api.exchangerate-api.com/v4/latest".to_owned(),
                markup: Decimal::new(35, 3),
                cache_ttl_secs: 3600,
                timeout_secs: 10,
            },
            search: SearchConfig {
                enabled: false,
                api_key: None,
                endpoint: "https://app.scrapingbee.com/api/v1/".to_owned(),
                result_limit: 10,
                timeout_secs: 60,
            },
            spreadsheet: SpreadsheetConfig { webhook_url: None, timeout_secs: 10 },
            orders: OrdersConfig { directory: PathBuf::from("orders") },
            session: SessionConfig { idle_ttl_secs: 7 * 24 * 3600, max_sessions: 10_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("landed.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(operator_chat_id) = telegram.operator_chat_id {
                self.telegram.operator_chat_id = Some(operator_chat_id);
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(vat_rate) = pricing.vat_rate {
                self.pricing.vat_rate = vat_rate;
            }
            if let Some(commission_rate) = pricing.commission_rate {
                self.pricing.commission_rate = commission_rate;
            }
            if let Some(insurance_rate) = pricing.insurance_rate {
                self.pricing.insurance_rate = insurance_rate;
            }
            if let Some(warehouse_leg) = pricing.warehouse_leg {
                self.pricing.warehouse_leg = warehouse_leg;
            }
            if let Some(duty_threshold) = pricing.duty_threshold {
                self.pricing.duty_threshold = duty_threshold;
            }
            if let Some(duty_rate) = pricing.duty_rate {
                self.pricing.duty_rate = duty_rate;
            }
            if let Some(max_listed_price) = pricing.max_listed_price {
                self.pricing.max_listed_price = max_listed_price;
            }
            if let Some(source_currency) = pricing.source_currency {
                self.pricing.source_currency = Currency::new(source_currency);
            }
            if let Some(display_currency) = pricing.display_currency {
                self.pricing.display_currency = Currency::new(display_currency);
            }
        }

        if let Some(currency) = patch.currency {
            if let Some(provider_base_url) = currency.provider_base_url {
                self.currency.provider_base_url = provider_base_url;
            }
            if let Some(markup) = currency.markup {
                self.currency.markup = markup;
            }
            if let Some(cache_ttl_secs) = currency.cache_ttl_secs {
                self.currency.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(timeout_secs) = currency.timeout_secs {
                self.currency.timeout_secs = timeout_secs;
            }
        }

        if let Some(search) = patch.search {
            if let Some(enabled) = search.enabled {
                self.search.enabled = enabled;
            }
            if let Some(api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(api_key_value));
            }
            if let Some(endpoint) = search.endpoint {
                self.search.endpoint = endpoint;
            }
            if let Some(result_limit) = search.result_limit {
                self.search.result_limit = result_limit;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(spreadsheet) = patch.spreadsheet {
            if let Some(webhook_url) = spreadsheet.webhook_url {
                self.spreadsheet.webhook_url = Some(webhook_url);
            }
            if let Some(timeout_secs) = spreadsheet.timeout_secs {
                self.spreadsheet.timeout_secs = timeout_secs;
            }
        }

        if let Some(orders) = patch.orders {
            if let Some(directory) = orders.directory {
                self.orders.directory = directory;
            }
        }

        if let Some(session) = patch.session {
            if let Some(idle_ttl_secs) = session.idle_ttl_secs {
                self.session.idle_ttl_secs = idle_ttl_secs;
            }
            if let Some(max_sessions) = session.max_sessions {
                self.session.max_sessions = max_sessions;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LANDED_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("LANDED_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("LANDED_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_env("LANDED_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LANDED_TELEGRAM_OPERATOR_CHAT_ID") {
            self.telegram.operator_chat_id = Some(value);
        }

        if let Some(value) = read_env("LANDED_PRICING_VAT_RATE") {
            self.pricing.vat_rate = parse_env("LANDED_PRICING_VAT_RATE", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_COMMISSION_RATE") {
            self.pricing.commission_rate = parse_env("LANDED_PRICING_COMMISSION_RATE", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_INSURANCE_RATE") {
            self.pricing.insurance_rate = parse_env("LANDED_PRICING_INSURANCE_RATE", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_WAREHOUSE_LEG") {
            self.pricing.warehouse_leg = parse_env("LANDED_PRICING_WAREHOUSE_LEG", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_DUTY_THRESHOLD") {
            self.pricing.duty_threshold = parse_env("LANDED_PRICING_DUTY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_DUTY_RATE") {
            self.pricing.duty_rate = parse_env("LANDED_PRICING_DUTY_RATE", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_MAX_LISTED_PRICE") {
            self.pricing.max_listed_price =
                parse_env("LANDED_PRICING_MAX_LISTED_PRICE", &value)?;
        }
        if let Some(value) = read_env("LANDED_PRICING_SOURCE_CURRENCY") {
            self.pricing.source_currency = Currency::new(value);
        }
        if let Some(value) = read_env("LANDED_PRICING_DISPLAY_CURRENCY") {
            self.pricing.display_currency = Currency::new(value);
        }

        if let Some(value) = read_env("LANDED_CURRENCY_PROVIDER_BASE_URL") {
            self.currency.provider_base_url = value;
        }
        if let Some(value) = read_env("LANDED_CURRENCY_MARKUP") {
            self.currency.markup = parse_env("LANDED_CURRENCY_MARKUP", &value)?;
        }
        if let Some(value) = read_env("LANDED_CURRENCY_CACHE_TTL_SECS") {
            self.currency.cache_ttl_secs = parse_env("LANDED_CURRENCY_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("LANDED_CURRENCY_TIMEOUT_SECS") {
            self.currency.timeout_secs = parse_env("LANDED_CURRENCY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LANDED_SEARCH_ENABLED") {
            self.search.enabled = parse_env("LANDED_SEARCH_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LANDED_SEARCH_API_KEY") {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LANDED_SEARCH_ENDPOINT") {
            self.search.endpoint = value;
        }
        if let Some(value) = read_env("LANDED_SEARCH_RESULT_LIMIT") {
            self.search.result_limit = parse_env("LANDED_SEARCH_RESULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("LANDED_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_env("LANDED_SEARCH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LANDED_SPREADSHEET_WEBHOOK_URL") {
            self.spreadsheet.webhook_url = Some(value);
        }
        if let Some(value) = read_env("LANDED_SPREADSHEET_TIMEOUT_SECS") {
            self.spreadsheet.timeout_secs = parse_env("LANDED_SPREADSHEET_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LANDED_ORDERS_DIRECTORY") {
            self.orders.directory = PathBuf::from(value);
        }

        if let Some(value) = read_env("LANDED_SESSION_IDLE_TTL_SECS") {
            self.session.idle_ttl_secs = parse_env("LANDED_SESSION_IDLE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("LANDED_SESSION_MAX_SESSIONS") {
            self.session.max_sessions = parse_env("LANDED_SESSION_MAX_SESSIONS", &value)?;
        }

        if let Some(value) = read_env("LANDED_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LANDED_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_env("LANDED_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("LANDED_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("LANDED_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("LANDED_LOGGING_LEVEL").or_else(|| read_env("LANDED_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LANDED_LOGGING_FORMAT").or_else(|| read_env("LANDED_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(operator_chat_id) = overrides.operator_chat_id {
            self.telegram.operator_chat_id = Some(operator_chat_id);
        }
        if let Some(directory) = overrides.orders_directory {
            self.orders.directory = directory;
        }
        if let Some(enabled) = overrides.search_enabled {
            self.search.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_pricing(&self.pricing)?;
        validate_currency(&self.currency)?;
        validate_search(&self.search)?;
        validate_spreadsheet(&self.spreadsheet)?;
        validate_storage(&self.orders, &self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("landed.toml"), PathBuf::from("config/landed.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Create a bot with @BotFather and copy its token"
                .to_owned(),
        ));
    }
    if !bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_owned(),
        ));
    }
    validate_url("telegram.api_base_url", &telegram.api_base_url)?;
    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=300".to_owned(),
        ));
    }
    if let Some(chat_id) = &telegram.operator_chat_id {
        if chat_id.trim().parse::<i64>().is_err() {
            return Err(ConfigError::Validation(
                "telegram.operator_chat_id must be a numeric chat id".to_owned(),
            ));
        }
    }
    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    for (key, rate) in [
        ("pricing.vat_rate", pricing.vat_rate),
        ("pricing.commission_rate", pricing.commission_rate),
        ("pricing.insurance_rate", pricing.insurance_rate),
        ("pricing.duty_rate", pricing.duty_rate),
    ] {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(ConfigError::Validation(format!("{key} must be in range [0, 1)")));
        }
    }
    for (key, amount) in [
        ("pricing.warehouse_leg", pricing.warehouse_leg),
        ("pricing.duty_threshold", pricing.duty_threshold),
    ] {
        if amount < Decimal::ZERO {
            return Err(ConfigError::Validation(format!("{key} must not be negative")));
        }
    }
    if pricing.max_listed_price <= Decimal::ZERO || pricing.max_listed_price > MAX_LISTED_PRICE {
        return Err(ConfigError::Validation(format!(
            "pricing.max_listed_price must be in range (0, {MAX_LISTED_PRICE}]"
        )));
    }
    for (key, currency) in [
        ("pricing.source_currency", &pricing.source_currency),
        ("pricing.display_currency", &pricing.display_currency),
    ] {
        let code = currency.code();
        if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ConfigError::Validation(format!(
                "{key} must be a three-letter ISO currency code, got `{code}`"
            )));
        }
    }
    Ok(())
}

fn validate_currency(currency: &CurrencyConfig) -> Result<(), ConfigError> {
    validate_url("currency.provider_base_url", &currency.provider_base_url)?;
    if currency.markup < Decimal::ZERO || currency.markup >= Decimal::ONE {
        return Err(ConfigError::Validation("currency.markup must be in range [0, 1)".to_owned()));
    }
    if currency.timeout_secs == 0 || currency.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "currency.timeout_secs must be in range 1..=300".to_owned(),
        ));
    }
    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !search.enabled {
        return Ok(());
    }
    let missing = search
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "search.api_key is required when search.enabled is true".to_owned(),
        ));
    }
    validate_url("search.endpoint", &search.endpoint)?;
    if search.result_limit == 0 || search.result_limit > 50 {
        return Err(ConfigError::Validation(
            "search.result_limit must be in range 1..=50".to_owned(),
        ));
    }
    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_owned(),
        ));
    }
    Ok(())
}

fn validate_spreadsheet(spreadsheet: &SpreadsheetConfig) -> Result<(), ConfigError> {
    if let Some(url) = &spreadsheet.webhook_url {
        validate_url("spreadsheet.webhook_url", url)?;
    }
    if spreadsheet.timeout_secs == 0 || spreadsheet.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "spreadsheet.timeout_secs must be in range 1..=300".to_owned(),
        ));
    }
    Ok(())
}

fn validate_storage(orders: &OrdersConfig, session: &SessionConfig) -> Result<(), ConfigError> {
    if orders.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation("orders.directory must not be empty".to_owned()));
    }
    if session.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_ttl_secs must be greater than zero".to_owned(),
        ));
    }
    if session.max_sessions == 0 {
        return Err(ConfigError::Validation(
            "session.max_sessions must be greater than zero".to_owned(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_owned(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn validate_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    pricing: Option<PricingPatch>,
    currency: Option<CurrencyPatch>,
    search: Option<SearchPatch>,
    spreadsheet: Option<SpreadsheetPatch>,
    orders: Option<OrdersPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    operator_chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    vat_rate: Option<Decimal>,
    commission_rate: Option<Decimal>,
    insurance_rate: Option<Decimal>,
    warehouse_leg: Option<Decimal>,
    duty_threshold: Option<Decimal>,
    duty_rate: Option<Decimal>,
    max_listed_price: Option<Decimal>,
    source_currency: Option<String>,
    display_currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrencyPatch {
    provider_base_url: Option<String>,
    markup: Option<Decimal>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    enabled: Option<bool>,
    api_key: Option<String>,
    endpoint: Option<String>,
    result_limit: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetPatch {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersPatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    idle_ttl_secs: Option<u64>,
    max_sessions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

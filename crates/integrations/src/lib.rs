//! HTTP clients for the services the bot talks to: exchange rates, product
//! search, the order spreadsheet webhook and the Telegram Bot API.

pub mod exchange_rates;
pub mod idealo;
pub mod spreadsheet;
pub mod telegram;

pub use exchange_rates::ExchangeRateApiProvider;
pub use idealo::ScrapingBeeSearch;
pub use spreadsheet::WebhookSpreadsheetSink;
pub use telegram::{TelegramApi, TelegramError, TelegramOperatorNotifier};

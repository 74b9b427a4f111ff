//! Minimal Telegram Bot API client: long polling, messages, photos and
//! callback acknowledgements.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use landed_core::submission::{DeliveryError, OperatorNotifier};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Request(String),
    #[error("telegram answered with status {0}")]
    Status(u16),
    #[error("telegram rejected `{method}`: {description}")]
    Api { method: String, description: String },
    #[error("telegram response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline { inline_keyboard: Vec<Vec<InlineKeyboardButton>> },
    Keyboard { keyboard: Vec<Vec<KeyboardButton>>, resize_keyboard: bool },
}

#[derive(Clone, Debug, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SendPhoto {
    pub chat_id: i64,
    pub photo: String,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramApi").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl TelegramApi {
    /// `request_timeout` must exceed the long-poll timeout passed to `get_updates`.
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base_url: base_url.into(), token })
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdates {
            offset,
            timeout: poll_timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(&self, request: &SendMessage) -> Result<Message, TelegramError> {
        self.call("sendMessage", request).await
    }

    pub async fn send_photo(&self, request: &SendPhoto) -> Result<Message, TelegramError> {
        self.call("sendPhoto", request).await
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<bool, TelegramError> {
        self.call("answerCallbackQuery", &AnswerCallbackQuery { callback_query_id: callback_id })
            .await
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!(
            "{}/bot{}/{method}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret()
        );
        debug!(event_name = "telegram.call", method, "calling telegram api");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| TelegramError::Request(error.without_url().to_string()))?;

        let status = response.status();
        let envelope = response.json::<Envelope<T>>().await;
        match envelope {
            Ok(Envelope { ok: true, result: Some(result), .. }) => Ok(result),
            Ok(Envelope { description, .. }) => Err(TelegramError::Api {
                method: method.to_owned(),
                description: description.unwrap_or_else(|| format!("status {status}")),
            }),
            Err(_) if !status.is_success() => Err(TelegramError::Status(status.as_u16())),
            Err(error) => Err(TelegramError::Decode(error.without_url().to_string())),
        }
    }
}

/// Sends order summaries to the fixed operator chat.
pub struct TelegramOperatorNotifier {
    api: TelegramApi,
    chat_id: i64,
}

impl TelegramOperatorNotifier {
    pub fn new(api: TelegramApi, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl OperatorNotifier for TelegramOperatorNotifier {
    async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
        let request = SendMessage {
            chat_id: self.chat_id,
            text: message.to_owned(),
            disable_web_page_preview: true,
            reply_markup: None,
        };
        self.api.send_message(&request).await.map(|_| ()).map_err(|error| match error {
            TelegramError::Status(code) => DeliveryError::Status(code),
            TelegramError::Api { description, .. } => DeliveryError::Rejected(description),
            other => DeliveryError::Request(other.to_string()),
        })
    }
}

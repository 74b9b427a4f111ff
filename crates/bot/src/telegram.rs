//! Long-polling transport over the Telegram Bot API.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use landed_integrations::telegram::{
    InlineKeyboardButton, KeyboardButton, ReplyMarkup, SendMessage, SendPhoto, TelegramApi,
    Update,
};

use crate::events::{InboundEvent, InboundUpdate, Sender};
use crate::keyboards::{Button, Keyboard, Reply};
use crate::transport::{BotTransport, TransportError};

pub struct TelegramTransport {
    api: TelegramApi,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: i64,
    pending: VecDeque<InboundUpdate>,
}

impl TelegramTransport {
    pub fn new(api: TelegramApi, poll_timeout_secs: u64) -> Self {
        Self { api, poll_timeout_secs, state: Mutex::new(PollState::default()) }
    }
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me =
            self.api.get_me().await.map_err(|error| TransportError::Connect(error.to_string()))?;
        info!(
            event_name = "transport.telegram_connected",
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<InboundUpdate>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(update) = state.pending.pop_front() {
                return Ok(Some(update));
            }

            let updates = self
                .api
                .get_updates(state.offset, self.poll_timeout_secs)
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;
            for update in updates {
                state.offset = state.offset.max(update.update_id + 1);
                match inbound_update(update) {
                    Some(inbound) => state.pending.push_back(inbound),
                    None => debug!("skipping update without a sender"),
                }
            }
        }
    }

    async fn acknowledge(&self, update: &InboundUpdate) -> Result<(), TransportError> {
        let InboundEvent::Callback { callback_id, .. } = &update.event else {
            return Ok(());
        };
        self.api
            .answer_callback_query(callback_id)
            .await
            .map(|_| ())
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn deliver(&self, chat_id: i64, reply: &Reply) -> Result<(), TransportError> {
        let result = match reply {
            Reply::Text { text, keyboard } => {
                let request = SendMessage {
                    chat_id,
                    text: text.clone(),
                    disable_web_page_preview: true,
                    reply_markup: keyboard.as_ref().map(reply_markup),
                };
                self.api.send_message(&request).await
            }
            Reply::Photo { photo_url, caption, keyboard } => {
                let request = SendPhoto {
                    chat_id,
                    photo: photo_url.clone(),
                    caption: caption.clone(),
                    reply_markup: keyboard.as_ref().map(reply_markup),
                };
                self.api.send_photo(&request).await
            }
        };
        result.map(|_| ()).map_err(|error| TransportError::Deliver(error.to_string()))
    }
}

/// Maps a raw update onto the transport-neutral model. Updates without a user are dropped.
pub fn inbound_update(update: Update) -> Option<InboundUpdate> {
    if let Some(callback) = update.callback_query {
        let chat_id =
            callback.message.as_ref().map(|message| message.chat.id).unwrap_or(callback.from.id);
        return Some(InboundUpdate {
            update_id: update.update_id,
            sender: Sender {
                chat_id,
                user_id: callback.from.id,
                username: callback.from.username,
            },
            event: InboundEvent::Callback {
                callback_id: callback.id,
                data: callback.data.unwrap_or_default(),
            },
        });
    }

    let message = update.message?;
    let user = message.from?;
    let event = match message.text {
        Some(text) => InboundEvent::from_text(text),
        None => InboundEvent::Unsupported { kind: "non_text_message".to_owned() },
    };
    Some(InboundUpdate {
        update_id: update.update_id,
        sender: Sender { chat_id: message.chat.id, user_id: user.id, username: user.username },
        event,
    })
}

pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::Inline {
            inline_keyboard: rows
                .iter()
                .map(|row| row.iter().map(inline_button).collect())
                .collect(),
        },
        Keyboard::Menu(rows) => ReplyMarkup::Keyboard {
            keyboard: rows
                .iter()
                .map(|row| row.iter().map(|label| KeyboardButton { text: label.clone() }).collect())
                .collect(),
            resize_keyboard: true,
        },
    }
}

fn inline_button(button: &Button) -> InlineKeyboardButton {
    match button {
        Button::Callback { label, action } => InlineKeyboardButton {
            text: label.clone(),
            callback_data: Some(action.encode()),
            url: None,
        },
        Button::Link { label, url } => InlineKeyboardButton {
            text: label.clone(),
            callback_data: None,
            url: Some(url.clone()),
        },
    }
}

//! Telegram interface for the purchasing bot
//!
//! - **Transport** (`transport`, `telegram`) - long polling with reconnect and backoff
//! - **Events** (`events`) - commands, free text and button presses routed to handlers
//! - **Conversation** (`conversation`) - the dialog controller driving the order flow
//! - **Rendering** (`render`, `keyboards`) - message texts and inline keyboards
//!
//! # Architecture
//!
//! ```text
//! Telegram → TelegramTransport → EventDispatcher → DialogController → FlowEngine
//!                    ↑                                      ↓
//!                    └──────────── Reply ← render ──────────┘
//! ```

pub mod actions;
pub mod commands;
pub mod conversation;
pub mod events;
pub mod keyboards;
pub mod render;
pub mod telegram;
pub mod transport;

pub use conversation::DialogController;
pub use events::{conversation_dispatcher, EventDispatcher};
pub use render::PriceFormatter;
pub use telegram::TelegramTransport;
pub use transport::{BotRunner, ReconnectPolicy};

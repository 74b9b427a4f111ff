use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{actions::CallbackAction, commands::MenuCommand, keyboards::Reply};

/// One inbound interaction, already stripped of transport specifics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub sender: Sender,
    pub event: InboundEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command(MenuCommand),
    Text(String),
    Callback { callback_id: String, data: String },
    Unsupported { kind: String },
}

impl InboundEvent {
    /// Classifies a typed message as a menu command or free text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match MenuCommand::parse(&text) {
            Some(command) => Self::Command(command),
            None => Self::Text(text),
        }
    }

    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::Command(_) => InboundEventType::Command,
            Self::Text(_) => InboundEventType::Text,
            Self::Callback { .. } => InboundEventType::Callback,
            Self::Unsupported { .. } => InboundEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Command,
    Text,
    Callback,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Reply>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Action(#[from] crate::actions::ActionParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> InboundEventType;
    async fn handle(
        &self,
        update: &InboundUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// The conversation logic behind the handlers.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn on_command(&self, sender: &Sender, command: MenuCommand, ctx: &EventContext)
        -> Vec<Reply>;
    async fn on_text(&self, sender: &Sender, text: &str, ctx: &EventContext) -> Vec<Reply>;
    async fn on_callback(
        &self,
        sender: &Sender,
        action: CallbackAction,
        ctx: &EventContext,
    ) -> Vec<Reply>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        update: &InboundUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes commands, text and button presses to one conversation service.
pub fn conversation_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: ConversationService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(Arc::clone(&service)));
    dispatcher.register(TextHandler::new(Arc::clone(&service)));
    dispatcher.register(CallbackHandler::new(service));
    dispatcher
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

impl<S> CommandHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Command
    }

    async fn handle(
        &self,
        update: &InboundUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Command(command) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let replies = self.service.on_command(&update.sender, *command, ctx).await;
        Ok(responded(replies))
    }
}

pub struct TextHandler<S> {
    service: Arc<S>,
}

impl<S> TextHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Text
    }

    async fn handle(
        &self,
        update: &InboundUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Text(text) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let replies = self.service.on_text(&update.sender, text, ctx).await;
        Ok(responded(replies))
    }
}

pub struct CallbackHandler<S> {
    service: Arc<S>,
}

impl<S> CallbackHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CallbackHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Callback
    }

    async fn handle(
        &self,
        update: &InboundUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Callback { data, .. } = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let action = data.parse::<CallbackAction>()?;
        let replies = self.service.on_callback(&update.sender, action, ctx).await;
        Ok(responded(replies))
    }
}

fn responded(replies: Vec<Reply>) -> HandlerResult {
    if replies.is_empty() {
        HandlerResult::Processed
    } else {
        HandlerResult::Responded(replies)
    }
}

//! Turns user input into dialog events, applies them and renders the result.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use landed_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use landed_core::domain::cart::validate_quantity;
use landed_core::domain::{CartError, CartItem, ChatContact};
use landed_core::errors::{ApplicationError, DomainError, InterfaceError};
use landed_core::flows::{
    DialogAction, DialogEvent, DialogState, FlowContext, FlowEngine, FlowTransitionError,
    OrderDialogFlow,
};
use landed_core::money::Money;
use landed_core::pricing::{
    parse_listed_price, LandedCostEngine, PriceQuote, PricingEngine, PricingError, ShippingTier,
    Weight,
};
use landed_core::search::ProductSearch;
use landed_core::session::{SearchResults, Session, SessionId, SessionStore};
use landed_core::submission::{OrderSubmitter, SubmissionReceipt};

use crate::actions::CallbackAction;
use crate::commands::MenuCommand;
use crate::events::{ConversationService, EventContext, Sender};
use crate::keyboards::Reply;
use crate::render::{self, PriceFormatter};

const MIN_QUERY_CHARS: usize = 2;

/// Validated input waiting to be written into the session once its event is accepted.
enum Input {
    None,
    Rejected(String),
    Price(Decimal),
    ListingPrice { price: Decimal, title: String, link: String },
    Tier(ShippingTier),
    Weight { weight: Weight, quote: Box<PriceQuote> },
    Link(String),
    Features(String),
    QuotedItem(Box<CartItem>),
    Results(SearchResults),
    Page(usize),
    Listing(Box<CartItem>),
    Field(String),
}

pub struct DialogController {
    sessions: Arc<SessionStore>,
    flow: FlowEngine<OrderDialogFlow>,
    pricing: Arc<LandedCostEngine>,
    formatter: PriceFormatter,
    search: Arc<dyn ProductSearch>,
    search_limit: usize,
    submitter: Arc<OrderSubmitter>,
    audit: Arc<dyn AuditSink>,
}

impl DialogController {
    pub fn new(
        sessions: Arc<SessionStore>,
        pricing: Arc<LandedCostEngine>,
        formatter: PriceFormatter,
        search: Arc<dyn ProductSearch>,
        search_limit: usize,
        submitter: Arc<OrderSubmitter>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            sessions,
            flow: FlowEngine::default(),
            pricing,
            formatter,
            search,
            search_limit,
            submitter,
            audit,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn session_id(sender: &Sender) -> SessionId {
        SessionId::new(format!("tg:{}", sender.user_id))
    }

    fn audit_context(
        &self,
        session: &Session,
        sender: &Sender,
        ctx: &EventContext,
    ) -> AuditContext {
        AuditContext::new(
            Some(session.id.to_string()),
            None,
            ctx.correlation_id.clone(),
            format!("telegram:{}", sender.user_id),
        )
    }

    /// Applies `event` and every follow-up event its actions raise.
    async fn run(
        &self,
        session: &mut Session,
        sender: &Sender,
        event: DialogEvent,
        input: Input,
        ctx: &EventContext,
    ) -> Vec<Reply> {
        let audit = self.audit_context(session, sender, ctx);
        let mut replies = Vec::new();
        let mut receipt: Option<SubmissionReceipt> = None;
        let mut failure: Option<InterfaceError> = None;
        let mut input = input;
        let mut next = Some(event);

        while let Some(event) = next.take() {
            let flow_context = FlowContext {
                cart_items: session.cart.len(),
                exceeds_duty_threshold: self.exceeds_duty_threshold(&input),
            };
            let outcome = match self.flow.apply_with_audit(
                &session.state,
                &event,
                &flow_context,
                self.audit.as_ref(),
                &audit,
            ) {
                Ok(outcome) => outcome,
                Err(FlowTransitionError::EmptyCart { .. }) => {
                    replies.push(render::empty_cart_checkout());
                    break;
                }
                Err(error) => {
                    debug!(
                        event_name = "dialog.event_rejected",
                        session_id = %session.id,
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "event does not apply to the current state"
                    );
                    replies.push(render::stale_action());
                    break;
                }
            };

            debug!(
                event_name = "dialog.transition",
                session_id = %session.id,
                correlation_id = %ctx.correlation_id,
                from = ?outcome.from,
                to = ?outcome.to,
                event = ?outcome.event,
                "dialog transition applied"
            );
            session.state = outcome.to;
            let accepted = std::mem::replace(&mut input, Input::None);
            absorb(session, &outcome.event, accepted, &mut input);

            for action in &outcome.actions {
                match action {
                    DialogAction::SubmitOrder => match self.submit(session, sender, &audit).await {
                        Ok(accepted) => {
                            receipt = Some(accepted);
                            next = Some(DialogEvent::SubmissionRecorded);
                        }
                        Err(rejected) => {
                            failure = Some(rejected);
                            next = Some(DialogEvent::SubmissionFailed);
                        }
                    },
                    DialogAction::AnnounceOrder => {
                        if let Some(receipt) = &receipt {
                            replies.push(render::order_accepted(receipt));
                        }
                    }
                    DialogAction::ReportSubmissionFailure => {
                        if let Some(failure) = &failure {
                            replies.push(render::submission_failed(failure));
                        }
                    }
                    action => {
                        if let Some(reply) = self.execute(session, action, &input, &audit).await {
                            replies.push(reply);
                        }
                    }
                }
            }
        }

        replies
    }

    fn exceeds_duty_threshold(&self, input: &Input) -> bool {
        let price = match input {
            Input::Price(price) | Input::ListingPrice { price, .. } => *price,
            _ => return false,
        };
        self.pricing.duty_estimate(price).is_some()
    }

    async fn execute(
        &self,
        session: &mut Session,
        action: &DialogAction,
        input: &Input,
        audit: &AuditContext,
    ) -> Option<Reply> {
        let source = self.formatter.source();
        match action {
            DialogAction::ResetCalculation => {
                session.reset_calculation();
                None
            }
            DialogAction::ResetCheckout => {
                session.reset_checkout();
                None
            }
            DialogAction::ClearCart => {
                session.clear_cart();
                None
            }
            DialogAction::PromptForPrice => Some(render::price_prompt()),
            DialogAction::NotifyCustomsDuty => session
                .calculation
                .listed_price
                .map(|price| render::duty_notice(&self.pricing, price, source)),
            DialogAction::PromptForTier => Some(render::tier_prompt(self.pricing.table())),
            DialogAction::PromptForWeight => Some(self.weight_prompt(session)),
            DialogAction::ComputeQuote => {
                if let Some(quote) = &session.calculation.quote {
                    self.audit.emit(
                        AuditEvent::new(
                            audit,
                            "pricing.quote_computed",
                            AuditCategory::Pricing,
                            AuditOutcome::Success,
                        )
                        .with_metadata("listed_price", quote.listed_price.to_string())
                        .with_metadata("weight_grams", quote.weight.grams().to_string())
                        .with_metadata("total", quote.total.to_string()),
                    );
                }
                None
            }
            DialogAction::PromptForLink => Some(render::link_prompt()),
            DialogAction::PromptForFeatures => Some(render::features_prompt()),
            DialogAction::PresentQuote => match &session.calculation.quote {
                Some(quote) => Some(
                    render::quote_breakdown(quote, self.pricing.rates(), &self.formatter).await,
                ),
                None => Some(render::stale_action()),
            },
            DialogAction::PromptForQuantity => Some(render::quantity_prompt()),
            DialogAction::AppendQuotedItem => match input {
                Input::QuotedItem(item) => {
                    session.cart.add(item.as_ref().clone());
                    self.emit_cart_event(audit, "cart.item_added", "calculation");
                    Some(render::added_to_cart(session.cart.len()))
                }
                _ => Some(render::stale_action()),
            },
            DialogAction::AppendListing => match input {
                Input::Listing(item) => {
                    session.cart.add(item.as_ref().clone());
                    self.emit_cart_event(audit, "cart.item_added", "search");
                    Some(render::added_to_cart(session.cart.len()))
                }
                _ => None,
            },
            DialogAction::Reprompt => {
                let reason = match input {
                    Input::Rejected(reason) => reason.as_str(),
                    _ => "I did not understand that.",
                };
                Some(render::rejected(reason, self.prompt_for(session)))
            }
            DialogAction::PromptForQuery => Some(render::query_prompt()),
            DialogAction::ShowListing => session.search.as_ref().map(render::listing_card),
            DialogAction::ReportNoResults => match input {
                Input::Field(query) => Some(render::no_results(query)),
                _ => Some(render::no_results("")),
            },
            DialogAction::ReportSearchUnavailable => Some(render::search_unavailable()),
            DialogAction::PromptForName => Some(render::name_prompt()),
            DialogAction::PromptForPhone => Some(render::phone_prompt()),
            DialogAction::PromptForEmail => Some(render::email_prompt()),
            DialogAction::PromptForAddress => Some(render::address_prompt()),
            DialogAction::PresentOrderSummary => Some(
                render::order_summary(
                    &session.checkout,
                    &session.cart,
                    self.pricing.as_ref(),
                    &self.formatter,
                )
                .await,
            ),
            DialogAction::ShowMainMenu => Some(render::main_menu_reply()),
            DialogAction::SubmitOrder
            | DialogAction::AnnounceOrder
            | DialogAction::ReportSubmissionFailure => None,
        }
    }

    /// Builds the cart line for the pending quote before any transition is applied.
    fn quoted_item(&self, session: &Session, quantity: u32) -> Result<CartItem, CartError> {
        let draft = &session.calculation;
        let quote = draft.quote.clone().ok_or(CartError::MissingQuote)?;
        let mut item =
            CartItem::from_quote(quote, quantity, draft.link.clone(), draft.features.clone())?;
        item.title = draft.title.clone();
        Ok(item)
    }

    fn emit_cart_event(&self, audit: &AuditContext, event_type: &str, source: &str) {
        self.audit.emit(
            AuditEvent::new(audit, event_type, AuditCategory::Cart, AuditOutcome::Success)
                .with_metadata("source", source),
        );
    }

    async fn submit(
        &self,
        session: &Session,
        sender: &Sender,
        audit: &AuditContext,
    ) -> Result<SubmissionReceipt, InterfaceError> {
        let Some(customer) = session.checkout.customer() else {
            let failure = ApplicationError::from(DomainError::InvariantViolation(
                "confirmation reached without all customer fields".to_owned(),
            ))
            .into_interface(audit.correlation_id.clone());
            warn!(
                event_name = "dialog.checkout_incomplete",
                session_id = %session.id,
                correlation_id = %failure.correlation_id(),
                error = %failure,
                "order submission refused"
            );
            return Err(failure);
        };
        let contact =
            ChatContact { user_id: sender.user_id.to_string(), username: sender.username.clone() };

        match self.submitter.submit(customer, contact, &session.cart, audit).await {
            Ok(receipt) => {
                info!(
                    event_name = "dialog.order_submitted",
                    session_id = %session.id,
                    order_id = %receipt.order.order_id,
                    spreadsheet_recorded = receipt.spreadsheet_recorded,
                    operator_notified = receipt.operator_notified,
                    "order submitted"
                );
                Ok(receipt)
            }
            Err(error) => {
                let failure =
                    ApplicationError::from(error).into_interface(audit.correlation_id.clone());
                warn!(
                    event_name = "dialog.order_rejected",
                    session_id = %session.id,
                    correlation_id = %failure.correlation_id(),
                    blocks_order = failure.blocks_order(),
                    error = %failure,
                    "order submission failed"
                );
                Err(failure)
            }
        }
    }

    fn weight_prompt(&self, session: &Session) -> Reply {
        let tier = session.calculation.tier.unwrap_or(ShippingTier::Ems);
        render::weight_prompt(self.pricing.table(), tier, self.formatter.source())
    }

    fn prompt_for(&self, session: &Session) -> Reply {
        match session.state {
            DialogState::AwaitingPrice => render::price_prompt(),
            DialogState::AwaitingTier => render::tier_prompt(self.pricing.table()),
            DialogState::AwaitingWeight => self.weight_prompt(session),
            DialogState::AwaitingProductLink => render::link_prompt(),
            DialogState::AwaitingFeatures => render::features_prompt(),
            DialogState::AwaitingQuantity => render::quantity_prompt(),
            DialogState::AwaitingSearchQuery => render::query_prompt(),
            DialogState::AwaitingName => render::name_prompt(),
            DialogState::AwaitingPhone => render::phone_prompt(),
            DialogState::AwaitingEmail => render::email_prompt(),
            DialogState::AwaitingAddress => render::address_prompt(),
            _ => render::main_menu_reply(),
        }
    }

    /// Validates typed text for the current state. `None` when the state takes no text.
    async fn interpret_text(&self, session: &Session, text: &str) -> Option<(DialogEvent, Input)> {
        let text = text.trim();
        let rejected =
            |reason: &str| (DialogEvent::InputRejected, Input::Rejected(reason.to_owned()));

        let step = match session.state {
            DialogState::AwaitingPrice => match parse_listed_price(text) {
                Ok(price) => (DialogEvent::PriceAccepted, Input::Price(price)),
                Err(PricingError::PriceTooHigh { limit, .. }) => {
                    rejected(&format!("We can only price items listed at up to {limit}."))
                }
                Err(_) => {
                    rejected("That does not look like a price. Send a number such as 89.95.")
                }
            },
            DialogState::AwaitingTier => match text.parse::<ShippingTier>() {
                Ok(tier) if self.pricing.table().weights(tier).is_ok() => {
                    (DialogEvent::TierSelected, Input::Tier(tier))
                }
                _ => rejected("Unknown shipping method. Use one of the buttons."),
            },
            DialogState::AwaitingWeight => match text.parse::<Weight>() {
                Ok(weight) => self.weight_step(session, weight),
                Err(_) => rejected("Send the weight in kilograms, for example 1.5."),
            },
            DialogState::AwaitingProductLink => {
                if text.starts_with("http://") || text.starts_with("https://") {
                    (DialogEvent::LinkAccepted, Input::Link(text.to_owned()))
                } else {
                    rejected("The link must start with http:// or https://.")
                }
            }
            DialogState::AwaitingFeatures if !text.is_empty() => {
                (DialogEvent::FeaturesProvided, Input::Features(text.to_owned()))
            }
            DialogState::AwaitingQuantity => {
                match text.parse::<u32>().ok().and_then(|quantity| validate_quantity(quantity).ok())
                {
                    Some(quantity) => match self.quoted_item(session, quantity) {
                        Ok(item) => {
                            (DialogEvent::QuantityAccepted, Input::QuotedItem(Box::new(item)))
                        }
                        Err(error) => rejected(&error.to_string()),
                    },
                    None => rejected("Send a whole number from 1 to 999."),
                }
            }
            DialogState::AwaitingSearchQuery => {
                if text.chars().count() < MIN_QUERY_CHARS {
                    rejected("The search query needs at least 2 characters.")
                } else {
                    self.search_step(text).await
                }
            }
            DialogState::AwaitingName if !text.is_empty() => {
                (DialogEvent::NameProvided, Input::Field(text.to_owned()))
            }
            DialogState::AwaitingPhone if !text.is_empty() => {
                (DialogEvent::PhoneProvided, Input::Field(text.to_owned()))
            }
            DialogState::AwaitingEmail if !text.is_empty() => {
                (DialogEvent::EmailProvided, Input::Field(text.to_owned()))
            }
            DialogState::AwaitingAddress if !text.is_empty() => {
                (DialogEvent::AddressProvided, Input::Field(text.to_owned()))
            }
            state if state.expects_text() => rejected("Please send a non-empty message."),
            _ => return None,
        };
        Some(step)
    }

    /// A weight is accepted only when the tariff lists it and a quote can be built.
    fn weight_step(&self, session: &Session, weight: Weight) -> (DialogEvent, Input) {
        let draft = &session.calculation;
        let (Some(price), Some(tier)) = (draft.listed_price, draft.tier) else {
            return (
                DialogEvent::InputRejected,
                Input::Rejected("Start the calculation again from the price.".to_owned()),
            );
        };

        let listed = Money::new(price, self.formatter.source().clone());
        match self.pricing.quote(&listed, tier, weight) {
            Ok(quote) => {
                (DialogEvent::WeightSelected, Input::Weight { weight, quote: Box::new(quote) })
            }
            Err(PricingError::UnknownWeight { .. }) => (
                DialogEvent::InputRejected,
                Input::Rejected(format!("There is no {tier} tariff for {weight}. Pick a button.")),
            ),
            Err(error) => (DialogEvent::InputRejected, Input::Rejected(error.to_string())),
        }
    }

    async fn search_step(&self, query: &str) -> (DialogEvent, Input) {
        match self.search.search(query, self.search_limit).await {
            Ok(listings) if listings.is_empty() => {
                (DialogEvent::NoResults, Input::Field(query.to_owned()))
            }
            Ok(listings) => {
                (DialogEvent::ResultsFound, Input::Results(SearchResults::new(query, listings)))
            }
            Err(error) => {
                warn!(
                    event_name = "dialog.search_unavailable",
                    query,
                    error = %error,
                    "search provider unavailable"
                );
                (DialogEvent::SearchUnavailable, Input::None)
            }
        }
    }

    async fn callback_step(&self, session: &Session, action: CallbackAction) -> Step {
        let event = |event| Step::Event(event, Input::None);
        match action {
            CallbackAction::MainMenu | CallbackAction::Cancel => event(DialogEvent::Cancel),
            CallbackAction::StartCalculation => event(DialogEvent::StartCalculation),
            CallbackAction::StartSearch => event(DialogEvent::StartSearch),
            CallbackAction::AddToCart if session.state == DialogState::ResultReady => {
                match self.quoted_item(session, 1) {
                    Ok(item) => {
                        Step::Event(DialogEvent::AddToCart, Input::QuotedItem(Box::new(item)))
                    }
                    Err(error) => {
                        debug!(
                            event_name = "dialog.cart_add_rejected",
                            session_id = %session.id,
                            error = %error,
                            "pending quote cannot be added"
                        );
                        Step::Reply(render::rejected(&error.to_string(), render::stale_action()))
                    }
                }
            }
            CallbackAction::AddToCart => event(DialogEvent::AddToCart),
            CallbackAction::ChooseQuantity => event(DialogEvent::ChooseQuantity),
            CallbackAction::Checkout => event(DialogEvent::StartCheckout),
            CallbackAction::Confirm => event(DialogEvent::ConfirmOrder),
            CallbackAction::Restart => event(DialogEvent::RestartCheckout),
            CallbackAction::ShowCart => Step::Reply(
                render::cart_view(&session.cart, self.pricing.as_ref(), &self.formatter).await,
            ),
            CallbackAction::About => {
                Step::Reply(render::about(self.pricing.rates(), self.formatter.source()))
            }
            CallbackAction::Support => Step::Reply(render::support()),
            CallbackAction::Tier(tier) => {
                if self.pricing.table().weights(tier).is_ok() {
                    Step::Event(DialogEvent::TierSelected, Input::Tier(tier))
                } else {
                    Step::Reply(render::stale_action())
                }
            }
            CallbackAction::Weight(weight) => {
                let (event, input) = self.weight_step(session, weight);
                Step::Event(event, input)
            }
            CallbackAction::Page(index) => match &session.search {
                Some(results) if results.get(index).is_some() => {
                    Step::Event(DialogEvent::PageChanged, Input::Page(index))
                }
                _ => Step::Reply(render::stale_action()),
            },
            CallbackAction::ListingAdd(index) => {
                let Some(listing) = session.search.as_ref().and_then(|results| results.get(index))
                else {
                    return Step::Reply(render::stale_action());
                };
                let price = parse_listed_price(&listing.price).ok();
                match CartItem::from_listing(
                    listing.title.clone(),
                    price,
                    self.formatter.source().clone(),
                    listing.link.clone(),
                    1,
                ) {
                    Ok(item) => {
                        Step::Event(DialogEvent::ListingAdded, Input::Listing(Box::new(item)))
                    }
                    Err(_) => Step::Reply(render::stale_action()),
                }
            }
            CallbackAction::ListingCalculate(index) => {
                let Some(listing) = session.search.as_ref().and_then(|results| results.get(index))
                else {
                    return Step::Reply(render::stale_action());
                };
                match parse_listed_price(&listing.price) {
                    Ok(price) => Step::Event(
                        DialogEvent::PriceAccepted,
                        Input::ListingPrice {
                            price,
                            title: listing.title.clone(),
                            link: listing.link.clone(),
                        },
                    ),
                    Err(_) => Step::Reply(render::listing_without_price()),
                }
            }
            CallbackAction::Remove(_) | CallbackAction::ClearCart => {
                Step::Reply(render::stale_action())
            }
        }
    }

    fn remove_item(&self, session: &mut Session, index: usize, audit: &AuditContext) -> Reply {
        match session.cart.remove(index) {
            Ok(item) => {
                self.emit_cart_event(audit, "cart.item_removed", "user");
                render::item_removed(&item.display_title())
            }
            Err(error) => {
                debug!(
                    event_name = "dialog.cart_remove_rejected",
                    session_id = %session.id,
                    error = %error,
                    "cart remove out of range"
                );
                render::rejected("That item is no longer in the cart.", render::stale_action())
            }
        }
    }
}

enum Step {
    Event(DialogEvent, Input),
    Reply(Reply),
}

/// Stores accepted input in the session. Quantity and listing input stay behind for actions.
fn absorb(session: &mut Session, event: &DialogEvent, input: Input, kept: &mut Input) {
    match input {
        Input::Price(price) => session.calculation.listed_price = Some(price),
        Input::ListingPrice { price, title, link } => {
            session.calculation.listed_price = Some(price);
            session.calculation.title = Some(title);
            session.calculation.link = Some(link);
        }
        Input::Tier(tier) => session.calculation.tier = Some(tier),
        Input::Weight { weight, quote } => {
            session.calculation.weight = Some(weight);
            session.calculation.quote = Some(*quote);
        }
        Input::Link(link) => session.calculation.link = Some(link),
        Input::Features(features) => session.calculation.features = Some(features),
        Input::Results(results) => session.search = Some(results),
        Input::Page(index) => {
            if let Some(results) = session.search.as_mut() {
                results.go_to(index);
            }
        }
        Input::Field(value) => {
            let checkout = &mut session.checkout;
            match event {
                DialogEvent::NameProvided => checkout.name = Some(value),
                DialogEvent::PhoneProvided => checkout.phone = Some(value),
                DialogEvent::EmailProvided => checkout.email = Some(value),
                DialogEvent::AddressProvided => checkout.address = Some(value),
                _ => *kept = Input::Field(value),
            }
        }
        other => *kept = other,
    }
}

#[async_trait]
impl ConversationService for DialogController {
    async fn on_command(
        &self,
        sender: &Sender,
        command: MenuCommand,
        ctx: &EventContext,
    ) -> Vec<Reply> {
        let handle = self.sessions.acquire(&Self::session_id(sender)).await;
        let mut session = handle.lock().await;

        match command {
            MenuCommand::Start => {
                if session.state != DialogState::Idle {
                    self.run(&mut session, sender, DialogEvent::Cancel, Input::None, ctx).await;
                }
                vec![render::welcome()]
            }
            MenuCommand::Help => vec![render::help()],
            MenuCommand::Calculate => {
                let event = DialogEvent::StartCalculation;
                self.run(&mut session, sender, event, Input::None, ctx).await
            }
            MenuCommand::Search => {
                self.run(&mut session, sender, DialogEvent::StartSearch, Input::None, ctx).await
            }
            MenuCommand::Cart => {
                vec![render::cart_view(&session.cart, self.pricing.as_ref(), &self.formatter).await]
            }
            MenuCommand::Cancel => {
                self.run(&mut session, sender, DialogEvent::Cancel, Input::None, ctx).await
            }
            MenuCommand::About => {
                vec![render::about(self.pricing.rates(), self.formatter.source())]
            }
            MenuCommand::Support => vec![render::support()],
        }
    }

    async fn on_text(&self, sender: &Sender, text: &str, ctx: &EventContext) -> Vec<Reply> {
        let handle = self.sessions.acquire(&Self::session_id(sender)).await;
        let mut session = handle.lock().await;

        match self.interpret_text(&session, text).await {
            Some((event, input)) => self.run(&mut session, sender, event, input, ctx).await,
            None => vec![render::unexpected_text()],
        }
    }

    async fn on_callback(
        &self,
        sender: &Sender,
        action: CallbackAction,
        ctx: &EventContext,
    ) -> Vec<Reply> {
        let handle = self.sessions.acquire(&Self::session_id(sender)).await;
        let mut session = handle.lock().await;
        let audit = self.audit_context(&session, sender, ctx);

        match action {
            CallbackAction::Remove(index) => {
                vec![self.remove_item(&mut session, index, &audit)]
            }
            CallbackAction::ClearCart => {
                session.clear_cart();
                self.emit_cart_event(&audit, "cart.cleared", "user");
                vec![render::cart_cleared()]
            }
            action => match self.callback_step(&session, action).await {
                Step::Event(event, input) => {
                    self.run(&mut session, sender, event, input, ctx).await
                }
                Step::Reply(reply) => vec![reply],
            },
        }
    }
}

use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{
    DialogAction, DialogEvent, DialogState, FlowContext, FlowType, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> DialogState;
    fn transition(
        &self,
        current: &DialogState,
        event: &DialogEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct OrderDialogFlow;

impl FlowDefinition for OrderDialogFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::OrderDialog
    }

    fn initial_state(&self) -> DialogState {
        DialogState::Idle
    }

    fn transition(
        &self,
        current: &DialogState,
        event: &DialogEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_order_dialog(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> DialogState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &DialogState,
        event: &DialogEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &DialogState,
        event: &DialogEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<OrderDialogFlow> {
    fn default() -> Self {
        Self::new(OrderDialogFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: DialogState, event: DialogEvent },
    #[error("checkout requested from {state:?} with an empty cart")]
    EmptyCart { state: DialogState },
}

fn transition_order_dialog(
    current: &DialogState,
    event: &DialogEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use DialogAction::{
        AnnounceOrder, AppendListing, AppendQuotedItem, ClearCart, ComputeQuote, NotifyCustomsDuty,
        PresentOrderSummary, PresentQuote, PromptForAddress, PromptForEmail, PromptForFeatures,
        PromptForLink, PromptForName, PromptForPhone, PromptForPrice, PromptForQuantity,
        PromptForQuery, PromptForTier, PromptForWeight, ReportNoResults, ReportSearchUnavailable,
        ReportSubmissionFailure, Reprompt, ResetCalculation, ResetCheckout, ShowListing,
        ShowMainMenu, SubmitOrder,
    };
    use DialogEvent::{
        AddToCart, AddressProvided, Cancel, ChooseQuantity, ConfirmOrder, EmailProvided,
        FeaturesProvided, InputRejected, LinkAccepted, ListingAdded, NameProvided, NoResults,
        PageChanged, PhoneProvided, PriceAccepted, QuantityAccepted, RestartCheckout,
        ResultsFound, SearchUnavailable, StartCalculation, StartCheckout, StartSearch,
        SubmissionFailed, SubmissionRecorded, TierSelected, WeightSelected,
    };
    use DialogState::{
        AwaitingAddress, AwaitingConfirmation, AwaitingEmail, AwaitingFeatures, AwaitingName,
        AwaitingPhone, AwaitingPrice, AwaitingProductLink, AwaitingQuantity,
        AwaitingSearchQuery, AwaitingTier, AwaitingWeight, Idle, ResultReady, ShowingResults,
        Submitted,
    };

    let invalid =
        || FlowTransitionError::InvalidTransition { state: *current, event: event.clone() };

    let (to, actions) = match (*current, event) {
        (Submitted, SubmissionRecorded) => {
            (Idle, vec![ClearCart, ResetCheckout, AnnounceOrder])
        }
        (Submitted, SubmissionFailed) => (AwaitingConfirmation, vec![ReportSubmissionFailure]),
        (Submitted, _) => return Err(invalid()),

        (_, StartCalculation) => {
            (AwaitingPrice, vec![ResetCalculation, ResetCheckout, PromptForPrice])
        }
        (_, StartSearch) => {
            (AwaitingSearchQuery, vec![ResetCalculation, ResetCheckout, PromptForQuery])
        }
        (AwaitingPrice, PriceAccepted) | (ShowingResults, PriceAccepted) => {
            let mut actions = Vec::with_capacity(2);
            if context.exceeds_duty_threshold {
                actions.push(NotifyCustomsDuty);
            }
            actions.push(PromptForTier);
            (AwaitingTier, actions)
        }
        (AwaitingTier, TierSelected) => (AwaitingWeight, vec![PromptForWeight]),
        (AwaitingWeight, WeightSelected) => {
            (AwaitingProductLink, vec![ComputeQuote, PromptForLink])
        }
        (AwaitingProductLink, LinkAccepted) => (AwaitingFeatures, vec![PromptForFeatures]),
        (AwaitingFeatures, FeaturesProvided) => (ResultReady, vec![PresentQuote]),
        // Raised only once the cart line is built, so the append cannot fail after the move.
        (ResultReady, AddToCart) | (AwaitingQuantity, QuantityAccepted) => {
            (Idle, vec![AppendQuotedItem, ResetCalculation])
        }
        (ResultReady, ChooseQuantity) => (AwaitingQuantity, vec![PromptForQuantity]),

        (AwaitingSearchQuery, ResultsFound) => (ShowingResults, vec![ShowListing]),
        (AwaitingSearchQuery, NoResults) => (AwaitingSearchQuery, vec![ReportNoResults]),
        (AwaitingSearchQuery, SearchUnavailable) => {
            (AwaitingSearchQuery, vec![ReportSearchUnavailable])
        }
        (ShowingResults, PageChanged) => (ShowingResults, vec![ShowListing]),
        (ShowingResults, ListingAdded) => (ShowingResults, vec![AppendListing]),

        (state, InputRejected) if state.expects_text() => (state, vec![Reprompt]),
        (state, Cancel) if state.is_checkout() => (Idle, vec![ResetCheckout, ShowMainMenu]),
        (_, Cancel) => (Idle, vec![ResetCalculation, ShowMainMenu]),

        (state, StartCheckout) if state.is_checkout() => return Err(invalid()),
        (state, StartCheckout) => {
            if context.cart_items == 0 {
                return Err(FlowTransitionError::EmptyCart { state });
            }
            (AwaitingName, vec![ResetCalculation, ResetCheckout, PromptForName])
        }
        (AwaitingName, NameProvided) => (AwaitingPhone, vec![PromptForPhone]),
        (AwaitingPhone, PhoneProvided) => (AwaitingEmail, vec![PromptForEmail]),
        (AwaitingEmail, EmailProvided) => (AwaitingAddress, vec![PromptForAddress]),
        (AwaitingAddress, AddressProvided) => (AwaitingConfirmation, vec![PresentOrderSummary]),
        (AwaitingConfirmation, ConfirmOrder) => {
            if context.cart_items == 0 {
                return Err(FlowTransitionError::EmptyCart { state: AwaitingConfirmation });
            }
            (Submitted, vec![SubmitOrder])
        }
        (AwaitingConfirmation, RestartCheckout) => {
            (AwaitingName, vec![ResetCheckout, PromptForName])
        }
        _ => return Err(invalid()),
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::flows::engine::{FlowDefinition, FlowEngine, FlowTransitionError, OrderDialogFlow};
    use crate::flows::states::{
        DialogAction, DialogEvent, DialogState, FlowContext, FlowType,
    };

    fn run(
        engine: &FlowEngine<OrderDialogFlow>,
        start: DialogState,
        events: &[DialogEvent],
        context: &FlowContext,
    ) -> DialogState {
        events.iter().fold(start, |state, event| {
            engine
                .apply(&state, event, context)
                .unwrap_or_else(|error| panic!("{event:?} from {state:?} failed: {error}"))
                .to
        })
    }

    #[test]
    fn calculation_path_reaches_result_and_returns_to_idle_on_add() {
        let engine = FlowEngine::default();
        let context = FlowContext::default();

        let ready = run(
            &engine,
            engine.initial_state(),
            &[
                DialogEvent::StartCalculation,
                DialogEvent::PriceAccepted,
                DialogEvent::TierSelected,
                DialogEvent::WeightSelected,
                DialogEvent::LinkAccepted,
                DialogEvent::FeaturesProvided,
            ],
            &context,
        );
        assert_eq!(ready, DialogState::ResultReady);

        let added = engine.apply(&ready, &DialogEvent::AddToCart, &context).expect("add to cart");
        assert_eq!(added.to, DialogState::Idle);
        assert_eq!(
            added.actions,
            vec![DialogAction::AppendQuotedItem, DialogAction::ResetCalculation]
        );
    }

    #[test]
    fn weight_selection_triggers_quote_computation() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(
                &DialogState::AwaitingWeight,
                &DialogEvent::WeightSelected,
                &FlowContext::default(),
            )
            .expect("weight accepted");

        assert_eq!(outcome.to, DialogState::AwaitingProductLink);
        assert_eq!(outcome.actions[0], DialogAction::ComputeQuote);
    }

    #[test]
    fn customs_notice_annotates_without_branching() {
        let engine = FlowEngine::default();
        let plain = engine
            .apply(
                &DialogState::AwaitingPrice,
                &DialogEvent::PriceAccepted,
                &FlowContext::default(),
            )
            .expect("price accepted");
        let expensive = engine
            .apply(
                &DialogState::AwaitingPrice,
                &DialogEvent::PriceAccepted,
                &FlowContext { exceeds_duty_threshold: true, ..FlowContext::default() },
            )
            .expect("price accepted");

        assert_eq!(plain.to, expensive.to);
        assert!(!plain.actions.contains(&DialogAction::NotifyCustomsDuty));
        assert_eq!(
            expensive.actions,
            vec![DialogAction::NotifyCustomsDuty, DialogAction::PromptForTier]
        );
    }

    #[test]
    fn rejected_input_keeps_state() {
        let engine = FlowEngine::default();
        for state in [
            DialogState::AwaitingPrice,
            DialogState::AwaitingTier,
            DialogState::AwaitingWeight,
            DialogState::AwaitingProductLink,
            DialogState::AwaitingQuantity,
            DialogState::AwaitingName,
        ] {
            let outcome = engine
                .apply(&state, &DialogEvent::InputRejected, &FlowContext::default())
                .expect("reprompt");
            assert_eq!(outcome.to, state);
            assert_eq!(outcome.actions, vec![DialogAction::Reprompt]);
        }
    }

    #[test]
    fn cancel_is_defined_everywhere_except_mid_submission_and_never_clears_cart() {
        let engine = FlowEngine::default();
        for state in DialogState::ALL {
            let result = engine.apply(&state, &DialogEvent::Cancel, &FlowContext::default());
            if state == DialogState::Submitted {
                assert!(result.is_err());
                continue;
            }
            let outcome = result.expect("cancel should be accepted");
            assert_eq!(outcome.to, DialogState::Idle);
            assert!(!outcome.actions.contains(&DialogAction::ClearCart));
        }
    }

    #[test]
    fn menu_entries_reset_scratch_but_keep_cart() {
        let engine = FlowEngine::default();
        for state in DialogState::ALL.into_iter().filter(|state| *state != DialogState::Submitted) {
            for event in [DialogEvent::StartCalculation, DialogEvent::StartSearch] {
                let outcome =
                    engine.apply(&state, &event, &FlowContext::default()).expect("menu entry");
                assert!(outcome.actions.contains(&DialogAction::ResetCalculation));
                assert!(!outcome.actions.contains(&DialogAction::ClearCart));
            }
        }
    }

    #[test]
    fn search_outcomes_are_distinguished() {
        let engine = FlowEngine::default();
        let context = FlowContext::default();
        let state = DialogState::AwaitingSearchQuery;

        let none = engine.apply(&state, &DialogEvent::NoResults, &context).expect("no results");
        let down =
            engine.apply(&state, &DialogEvent::SearchUnavailable, &context).expect("unavailable");
        let found = engine.apply(&state, &DialogEvent::ResultsFound, &context).expect("found");

        assert_eq!(none.actions, vec![DialogAction::ReportNoResults]);
        assert_eq!(down.actions, vec![DialogAction::ReportSearchUnavailable]);
        assert_eq!(found.to, DialogState::ShowingResults);

        let paged = engine
            .apply(&found.to, &DialogEvent::PageChanged, &context)
            .expect("pagination stays in results");
        assert_eq!(paged.to, DialogState::ShowingResults);
    }

    #[test]
    fn checkout_path_submits_and_clears_cart_on_success() {
        let engine = FlowEngine::default();
        let context = FlowContext { cart_items: 2, ..FlowContext::default() };

        let confirming = run(
            &engine,
            DialogState::Idle,
            &[
                DialogEvent::StartCheckout,
                DialogEvent::NameProvided,
                DialogEvent::PhoneProvided,
                DialogEvent::EmailProvided,
                DialogEvent::AddressProvided,
            ],
            &context,
        );
        assert_eq!(confirming, DialogState::AwaitingConfirmation);

        let submitted =
            engine.apply(&confirming, &DialogEvent::ConfirmOrder, &context).expect("confirm");
        assert_eq!(submitted.to, DialogState::Submitted);
        assert_eq!(submitted.actions, vec![DialogAction::SubmitOrder]);

        let recorded = engine
            .apply(&submitted.to, &DialogEvent::SubmissionRecorded, &context)
            .expect("recorded");
        assert_eq!(recorded.to, DialogState::Idle);
        assert!(recorded.actions.contains(&DialogAction::ClearCart));

        let failed = engine
            .apply(&submitted.to, &DialogEvent::SubmissionFailed, &context)
            .expect("failed submission returns to confirmation");
        assert_eq!(failed.to, DialogState::AwaitingConfirmation);
        assert!(!failed.actions.contains(&DialogAction::ClearCart));
    }

    #[test]
    fn restart_and_cancel_only_touch_checkout_fields() {
        let engine = FlowEngine::default();
        let context = FlowContext { cart_items: 1, ..FlowContext::default() };

        let restarted = engine
            .apply(&DialogState::AwaitingConfirmation, &DialogEvent::RestartCheckout, &context)
            .expect("restart");
        assert_eq!(restarted.to, DialogState::AwaitingName);
        assert_eq!(
            restarted.actions,
            vec![DialogAction::ResetCheckout, DialogAction::PromptForName]
        );

        let cancelled = engine
            .apply(&DialogState::AwaitingEmail, &DialogEvent::Cancel, &context)
            .expect("cancel checkout");
        assert_eq!(cancelled.to, DialogState::Idle);
        assert!(cancelled.actions.contains(&DialogAction::ResetCheckout));
        assert!(!cancelled.actions.contains(&DialogAction::ClearCart));
    }

    #[test]
    fn checkout_requires_items() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&DialogState::Idle, &DialogEvent::StartCheckout, &FlowContext::default())
            .expect_err("empty cart");
        assert_eq!(error, FlowTransitionError::EmptyCart { state: DialogState::Idle });

        let error = engine
            .apply(
                &DialogState::AwaitingConfirmation,
                &DialogEvent::ConfirmOrder,
                &FlowContext::default(),
            )
            .expect_err("cart emptied during checkout");
        assert!(matches!(error, FlowTransitionError::EmptyCart { .. }));
    }

    #[test]
    fn undefined_pairs_are_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&DialogState::Idle, &DialogEvent::AddToCart, &FlowContext::default())
            .expect_err("nothing to add");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                state: DialogState::Idle,
                event: DialogEvent::AddToCart
            }
        );

        let error = engine
            .apply(&DialogState::Submitted, &DialogEvent::StartCalculation, &FlowContext::default())
            .expect_err("submission in flight");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = FlowEngine::default();
        let events = [
            DialogEvent::StartSearch,
            DialogEvent::ResultsFound,
            DialogEvent::ListingAdded,
            DialogEvent::PriceAccepted,
            DialogEvent::TierSelected,
        ];
        let replay = |engine: &FlowEngine<OrderDialogFlow>| {
            let mut state = engine.initial_state();
            let mut actions = Vec::new();
            for event in &events {
                let outcome = engine
                    .apply(&state, event, &FlowContext::default())
                    .expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        assert_eq!(replay(&engine), replay(&engine));
        assert_eq!(engine.flow_type(), FlowType::OrderDialog);
        assert_eq!(OrderDialogFlow.flow_type(), FlowType::OrderDialog);
    }

    #[test]
    fn transitions_emit_audit_events() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("chat-9".to_owned()), None, "upd-42", "dialog");

        engine
            .apply_with_audit(
                &DialogState::Idle,
                &DialogEvent::StartCalculation,
                &FlowContext::default(),
                &sink,
                &audit,
            )
            .expect("transition should succeed");
        let _ = engine.apply_with_audit(
            &DialogState::Idle,
            &DialogEvent::ConfirmOrder,
            &FlowContext::default(),
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "flow.transition_applied");
        assert_eq!(events[0].session_id.as_deref(), Some("chat-9"));
        assert_eq!(events[1].event_type, "flow.transition_rejected");
    }
}

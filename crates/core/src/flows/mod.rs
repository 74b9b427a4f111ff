pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, OrderDialogFlow};
pub use states::{
    DialogAction, DialogEvent, DialogState, FlowContext, FlowType, TransitionOutcome,
};

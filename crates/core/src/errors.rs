use thiserror::Error;

use crate::{
    currency::ConversionUnavailable,
    domain::{CartError, OrderError},
    flows::FlowTransitionError,
    pricing::PricingError,
    search::SearchError,
    submission::SubmissionError,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Conversion(#[from] ConversionUnavailable),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Failure as shown to a chat user, tagged with the correlation id support can look up.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("input rejected: {message}")]
    InvalidInput { message: String, correlation_id: String },
    #[error("dependency degraded: {message}")]
    Degraded { message: String, correlation_id: String },
    #[error("order not recorded: {message}")]
    OrderNotRecorded { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::InvalidInput { correlation_id, .. }
            | Self::Degraded { correlation_id, .. }
            | Self::OrderNotRecorded { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => {
                "That input could not be used. Please check it and try again."
            }
            Self::Degraded { .. } => {
                "A partner service is temporarily unavailable. Please try again later."
            }
            Self::OrderNotRecorded { .. } => "We could not save your order. Nothing was charged.",
            Self::Internal { .. } => "Something went wrong on our side.",
        }
    }

    /// Only a failed order write leaves the customer without a result.
    pub fn blocks_order(&self) -> bool {
        matches!(self, Self::OrderNotRecorded { .. } | Self::Internal { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::Domain(DomainError::InvariantViolation(_)) | Self::Configuration(_) => {
                InterfaceError::Internal { message, correlation_id }
            }
            Self::Domain(_) | Self::Submission(SubmissionError::EmptyCart) => {
                InterfaceError::InvalidInput { message, correlation_id }
            }
            Self::Submission(SubmissionError::Persistence { .. }) => {
                InterfaceError::OrderNotRecorded { message, correlation_id }
            }
            Self::Search(_) | Self::Conversion(_) => {
                InterfaceError::Degraded { message, correlation_id }
            }
        }
    }
}

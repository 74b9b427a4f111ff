use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    OrderDialog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogState {
    Idle,
    AwaitingPrice,
    AwaitingTier,
    AwaitingWeight,
    AwaitingProductLink,
    AwaitingFeatures,
    ResultReady,
    AwaitingQuantity,
    AwaitingSearchQuery,
    ShowingResults,
    AwaitingName,
    AwaitingPhone,
    AwaitingEmail,
    AwaitingAddress,
    AwaitingConfirmation,
    Submitted,
}

impl DialogState {
    pub const ALL: [DialogState; 16] = [
        DialogState::Idle,
        DialogState::AwaitingPrice,
        DialogState::AwaitingTier,
        DialogState::AwaitingWeight,
        DialogState::AwaitingProductLink,
        DialogState::AwaitingFeatures,
        DialogState::ResultReady,
        DialogState::AwaitingQuantity,
        DialogState::AwaitingSearchQuery,
        DialogState::ShowingResults,
        DialogState::AwaitingName,
        DialogState::AwaitingPhone,
        DialogState::AwaitingEmail,
        DialogState::AwaitingAddress,
        DialogState::AwaitingConfirmation,
        DialogState::Submitted,
    ];

    pub fn is_calculation(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPrice
                | Self::AwaitingTier
                | Self::AwaitingWeight
                | Self::AwaitingProductLink
                | Self::AwaitingFeatures
                | Self::ResultReady
                | Self::AwaitingQuantity
        )
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Self::AwaitingSearchQuery | Self::ShowingResults)
    }

    pub fn is_checkout(&self) -> bool {
        matches!(
            self,
            Self::AwaitingName
                | Self::AwaitingPhone
                | Self::AwaitingEmail
                | Self::AwaitingAddress
                | Self::AwaitingConfirmation
        )
    }

    /// States that read the next free-text message as their input.
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPrice
                | Self::AwaitingTier
                | Self::AwaitingWeight
                | Self::AwaitingProductLink
                | Self::AwaitingFeatures
                | Self::AwaitingQuantity
                | Self::AwaitingSearchQuery
                | Self::AwaitingName
                | Self::AwaitingPhone
                | Self::AwaitingEmail
                | Self::AwaitingAddress
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    StartCalculation,
    PriceAccepted,
    TierSelected,
    WeightSelected,
    LinkAccepted,
    FeaturesProvided,
    AddToCart,
    ChooseQuantity,
    QuantityAccepted,
    InputRejected,
    Cancel,
    StartSearch,
    ResultsFound,
    NoResults,
    SearchUnavailable,
    PageChanged,
    ListingAdded,
    StartCheckout,
    NameProvided,
    PhoneProvided,
    EmailProvided,
    AddressProvided,
    ConfirmOrder,
    RestartCheckout,
    SubmissionRecorded,
    SubmissionFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub cart_items: usize,
    pub exceeds_duty_threshold: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    ResetCalculation,
    ResetCheckout,
    PromptForPrice,
    NotifyCustomsDuty,
    PromptForTier,
    PromptForWeight,
    ComputeQuote,
    PromptForLink,
    PromptForFeatures,
    PresentQuote,
    PromptForQuantity,
    AppendQuotedItem,
    AppendListing,
    Reprompt,
    PromptForQuery,
    ShowListing,
    ReportNoResults,
    ReportSearchUnavailable,
    PromptForName,
    PromptForPhone,
    PromptForEmail,
    PromptForAddress,
    PresentOrderSummary,
    SubmitOrder,
    ClearCart,
    AnnounceOrder,
    ReportSubmissionFailure,
    ShowMainMenu,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogState,
    pub to: DialogState,
    pub event: DialogEvent,
    pub actions: Vec<DialogAction>,
}

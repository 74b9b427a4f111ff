//! Callback payloads carried by inline buttons.
//!
//! Telegram limits `callback_data` to 64 bytes, so every action encodes to a
//! short `verb` or `verb:argument` string.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use landed_core::pricing::{ShippingTier, Weight};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    MainMenu,
    StartCalculation,
    StartSearch,
    ShowCart,
    About,
    Support,
    Tier(ShippingTier),
    Weight(Weight),
    AddToCart,
    ChooseQuantity,
    Remove(usize),
    ClearCart,
    Checkout,
    Confirm,
    Restart,
    Cancel,
    Page(usize),
    ListingAdd(usize),
    ListingCalculate(usize),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("unknown callback action `{0}`")]
    Unknown(String),
    #[error("callback action `{verb}` has an invalid argument `{argument}`")]
    InvalidArgument { verb: String, argument: String },
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainMenu => f.write_str("menu"),
            Self::StartCalculation => f.write_str("calc"),
            Self::StartSearch => f.write_str("search"),
            Self::ShowCart => f.write_str("cart"),
            Self::About => f.write_str("about"),
            Self::Support => f.write_str("support"),
            Self::Tier(tier) => write!(f, "tier:{}", tier.code().to_ascii_lowercase()),
            Self::Weight(weight) => write!(f, "weight:{}", weight.grams()),
            Self::AddToCart => f.write_str("add"),
            Self::ChooseQuantity => f.write_str("qty"),
            Self::Remove(index) => write!(f, "remove:{index}"),
            Self::ClearCart => f.write_str("clear"),
            Self::Checkout => f.write_str("checkout"),
            Self::Confirm => f.write_str("confirm"),
            Self::Restart => f.write_str("restart"),
            Self::Cancel => f.write_str("cancel"),
            Self::Page(index) => write!(f, "page:{index}"),
            Self::ListingAdd(index) => write!(f, "listing_add:{index}"),
            Self::ListingCalculate(index) => write!(f, "listing_calc:{index}"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = ActionParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();
        let (verb, argument) = match data.split_once(':') {
            Some((verb, argument)) => (verb, Some(argument)),
            None => (data, None),
        };

        let invalid = |argument: &str| ActionParseError::InvalidArgument {
            verb: verb.to_owned(),
            argument: argument.to_owned(),
        };
        let index = |argument: &str| argument.parse::<usize>().map_err(|_| invalid(argument));

        match (verb, argument) {
            ("menu", None) => Ok(Self::MainMenu),
            ("calc", None) => Ok(Self::StartCalculation),
            ("search", None) => Ok(Self::StartSearch),
            ("cart", None) => Ok(Self::ShowCart),
            ("about", None) => Ok(Self::About),
            ("support", None) => Ok(Self::Support),
            ("add", None) => Ok(Self::AddToCart),
            ("qty", None) => Ok(Self::ChooseQuantity),
            ("clear", None) => Ok(Self::ClearCart),
            ("checkout", None) => Ok(Self::Checkout),
            ("confirm", None) => Ok(Self::Confirm),
            ("restart", None) => Ok(Self::Restart),
            ("cancel", None) => Ok(Self::Cancel),
            ("tier", Some(code)) => code.parse().map(Self::Tier).map_err(|_| invalid(code)),
            ("weight", Some(grams)) => grams
                .parse::<u32>()
                .ok()
                .filter(|grams| *grams > 0)
                .map(|grams| Self::Weight(Weight::from_grams(grams)))
                .ok_or_else(|| invalid(grams)),
            ("remove", Some(argument)) => index(argument).map(Self::Remove),
            ("page", Some(argument)) => index(argument).map(Self::Page),
            ("listing_add", Some(argument)) => index(argument).map(Self::ListingAdd),
            ("listing_calc", Some(argument)) => index(argument).map(Self::ListingCalculate),
            _ => Err(ActionParseError::Unknown(data.to_owned())),
        }
    }
}

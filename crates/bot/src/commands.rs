/// Labels on the persistent reply keyboard. Pressing one sends its text verbatim.
pub const CALCULATE_LABEL: &str = "🧮 Calculate delivery";
pub const SEARCH_LABEL: &str = "🔎 Search products";
pub const CART_LABEL: &str = "🛒 Cart";
pub const ABOUT_LABEL: &str = "ℹ️ About";
pub const SUPPORT_LABEL: &str = "💬 Support";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    Help,
    Calculate,
    Search,
    Cart,
    Cancel,
    About,
    Support,
}

impl MenuCommand {
    /// Recognizes slash commands (with an optional `@botname` suffix) and menu labels.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(command) = text.strip_prefix('/') {
            let name = command.split_whitespace().next().unwrap_or_default();
            let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
            return match name.as_str() {
                "start" => Some(Self::Start),
                "help" => Some(Self::Help),
                "calc" | "calculate" => Some(Self::Calculate),
                "search" => Some(Self::Search),
                "cart" => Some(Self::Cart),
                "cancel" => Some(Self::Cancel),
                "about" => Some(Self::About),
                "support" => Some(Self::Support),
                _ => None,
            };
        }

        match text {
            CALCULATE_LABEL => Some(Self::Calculate),
            SEARCH_LABEL => Some(Self::Search),
            CART_LABEL => Some(Self::Cart),
            ABOUT_LABEL => Some(Self::About),
            SUPPORT_LABEL => Some(Self::Support),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Calculate => "calculate",
            Self::Search => "search",
            Self::Cart => "cart",
            Self::Cancel => "cancel",
            Self::About => "about",
            Self::Support => "support",
        }
    }
}

/// Whether `text` looks like a slash command, recognized or not.
pub fn is_slash_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

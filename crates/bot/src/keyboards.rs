use crate::actions::CallbackAction;
use crate::commands::{ABOUT_LABEL, CALCULATE_LABEL, CART_LABEL, SEARCH_LABEL, SUPPORT_LABEL};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Button {
    Callback { label: String, action: CallbackAction },
    Link { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, action: CallbackAction) -> Self {
        Self::Callback { label: label.into(), action }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Link { label: label.into(), url: url.into() }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Callback { label, .. } | Self::Link { label, .. } => label,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<Button>>),
    /// Persistent keyboard replacing the user's text keyboard.
    Menu(Vec<Vec<String>>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text { text: String, keyboard: Option<Keyboard> },
    Photo { photo_url: String, caption: String, keyboard: Option<Keyboard> },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Photo { caption, .. } => caption,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Text { keyboard, .. } | Self::Photo { keyboard, .. } => keyboard.as_ref(),
        }
    }

    /// Callback actions reachable from this reply's inline buttons, in display order.
    pub fn actions(&self) -> Vec<CallbackAction> {
        match self.keyboard() {
            Some(Keyboard::Inline(rows)) => rows
                .iter()
                .flatten()
                .filter_map(|button| match button {
                    Button::Callback { action, .. } => Some(*action),
                    Button::Link { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub struct MessageBuilder {
    paragraphs: Vec<String>,
    photo_url: Option<String>,
    keyboard: Option<Keyboard>,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { paragraphs: vec![text.into()], photo_url: None, keyboard: None }
    }

    /// Appends a block separated from the previous one by a blank line.
    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.paragraphs.push(text);
        }
        self
    }

    pub fn photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn inline<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut InlineKeyboardBuilder),
    {
        let mut builder = InlineKeyboardBuilder::default();
        build(&mut builder);
        if !builder.rows.is_empty() {
            self.keyboard = Some(Keyboard::Inline(builder.rows));
        }
        self
    }

    pub fn menu<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut MenuKeyboardBuilder),
    {
        let mut builder = MenuKeyboardBuilder::default();
        build(&mut builder);
        self.keyboard = Some(Keyboard::Menu(builder.rows));
        self
    }

    pub fn build(self) -> Reply {
        let text = self.paragraphs.join("\n\n");
        match self.photo_url {
            Some(photo_url) => Reply::Photo { photo_url, caption: text, keyboard: self.keyboard },
            None => Reply::Text { text, keyboard: self.keyboard },
        }
    }
}

#[derive(Default)]
pub struct InlineKeyboardBuilder {
    rows: Vec<Vec<Button>>,
}

impl InlineKeyboardBuilder {
    pub fn row<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut row = RowBuilder::default();
        build(&mut row);
        if !row.buttons.is_empty() {
            self.rows.push(row.buttons);
        }
        self
    }

    pub fn button(&mut self, button: Button) -> &mut Self {
        self.rows.push(vec![button]);
        self
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<Button>,
}

impl RowBuilder {
    pub fn callback(&mut self, label: impl Into<String>, action: CallbackAction) -> &mut Self {
        self.buttons.push(Button::callback(label, action));
        self
    }

    pub fn link(&mut self, label: impl Into<String>, url: impl Into<String>) -> &mut Self {
        self.buttons.push(Button::link(label, url));
        self
    }
}

#[derive(Default)]
pub struct MenuKeyboardBuilder {
    rows: Vec<Vec<String>>,
}

impl MenuKeyboardBuilder {
    pub fn row<I, S>(&mut self, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(labels.into_iter().map(Into::into).collect());
        self
    }
}

/// The persistent main menu shown after `/start` and whenever a flow ends.
pub fn main_menu(build: MessageBuilder) -> MessageBuilder {
    build.menu(|menu| {
        menu.row([CALCULATE_LABEL, SEARCH_LABEL])
            .row([CART_LABEL])
            .row([ABOUT_LABEL, SUPPORT_LABEL]);
    })
}

//! Pending orders and the parsing that feeds them.

use std::fmt;

use regex::Regex;
use serde::Deserialize;

use super::catalog::{ChoiceOption, GiftPlan};
use super::id::{BuyerId, CategoryId, ChatId, OrderId};
use super::recipient::Handle;
use crate::error::ConfigError;

/// Conversation state of a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    New,
    AwaitingAnon,
    AwaitingRecipients,
    AwaitingChoiceNick,
    AwaitingConfirmation,
    AwaitingChoicePick,
    AwaitingChoiceConfirmation,
    Delivering,
    Complete,
}

impl OrderState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingAnon => "awaiting_anon",
            Self::AwaitingRecipients => "awaiting_recipients",
            Self::AwaitingChoiceNick => "awaiting_choice_nick",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::AwaitingChoicePick => "awaiting_choice_pick",
            Self::AwaitingChoiceConfirmation => "awaiting_choice_confirmation",
            Self::Delivering => "delivering",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who decides whether gifts are sent anonymously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum AnonymityMode {
    /// The seller's `anonymous_gifts` flag decides.
    #[default]
    Seller,
    /// The buyer is asked once per order.
    Buyer,
    Always,
    Never,
}

impl AnonymityMode {
    /// Parse a mode name or one of its aliases. Unknown input falls back
    /// to [`AnonymityMode::Seller`].
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "buyer" | "ask" | "customer" | "client" => Self::Buyer,
            "yes" | "true" | "1" | "anon" | "anonymous" => Self::Always,
            "no" | "false" | "0" | "public" => Self::Never,
            _ => Self::Seller,
        }
    }

    /// Anonymity flag when the mode does not require asking the buyer.
    #[must_use]
    pub const fn fixed_flag(self, seller_default: bool) -> Option<bool> {
        match self {
            Self::Seller => Some(seller_default),
            Self::Always => Some(true),
            Self::Never => Some(false),
            Self::Buyer => None,
        }
    }
}

impl From<String> for AnonymityMode {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

/// Interpret the buyer's answer to the anonymity question.
#[must_use]
pub fn parse_anonymity_reply(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "1" | "1)" | "yes" | "y" | "да" | "anon" | "anonymous" | "анонимно" => Some(true),
        "2" | "2)" | "no" | "n" | "нет" | "public" | "не анонимно" => Some(false),
        _ => None,
    }
}

/// Extracts the catalog code from an order description.
///
/// Matches `<key>: <digits>` case-insensitively with free spacing around
/// the colon. When several comma-separated numbers follow, the first wins.
#[derive(Debug, Clone)]
pub struct MarkerParser {
    key: String,
    pattern: Regex,
    quantity: Regex,
}

impl MarkerParser {
    pub fn new(key: &str) -> Result<Self, ConfigError> {
        let key = key.trim();
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|source| ConfigError::MarkerPattern {
                key: key.to_string(),
                source,
            })
        };
        let pattern = build(format!(r"(?i){}\s*:\s*([0-9,\s]+)", regex::escape(key)))?;
        let quantity = build(r"(?i)gift_qty\s*:\s*(\d+)".to_string())?;
        Ok(Self {
            key: key.to_string(),
            pattern,
            quantity,
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Catalog code referenced by the description, if any.
    #[must_use]
    pub fn code(&self, description: &str) -> Option<String> {
        let caps = self.pattern.captures(description)?;
        caps.get(1)?
            .as_str()
            .split(',')
            .map(str::trim)
            .find(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }

    /// Ordered quantity: the marketplace amount when present, else a
    /// `gift_qty:` marker, else 1.
    #[must_use]
    pub fn quantity(&self, amount: Option<u32>, description: &str) -> u32 {
        if let Some(amount) = amount.filter(|a| *a > 0) {
            return amount;
        }
        self.quantity
            .captures(description)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map_or(1, |qty| qty.max(1))
    }
}

/// Per-buyer order state held by the orchestrator.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub chat_id: ChatId,
    pub buyer: BuyerId,
    pub category: Option<CategoryId>,
    pub quantity: u32,
    pub plan: GiftPlan,
    pub state: OrderState,
    pub recipients: Vec<Handle>,
    /// `None` until resolved.
    pub anonymous: Option<bool>,
    /// Index into the choice options once the buyer has picked.
    pub selected: Option<usize>,
}

impl PendingOrder {
    pub fn new(
        order_id: OrderId,
        chat_id: ChatId,
        buyer: BuyerId,
        quantity: u32,
        plan: GiftPlan,
    ) -> Self {
        Self {
            order_id,
            chat_id,
            buyer,
            category: None,
            quantity,
            plan,
            state: OrderState::New,
            recipients: Vec::new(),
            anonymous: None,
            selected: None,
        }
    }

    /// The picked choice option, if this is a choice order with a pick.
    #[must_use]
    pub fn selected_option(&self) -> Option<&ChoiceOption> {
        match &self.plan {
            GiftPlan::Choice(choice) => self.selected.and_then(|idx| choice.options.get(idx)),
            GiftPlan::Fixed(_) => None,
        }
    }
}

//! Events consumed by the orchestrator.

use crate::domain::{BuyerId, ChatId};
use crate::port::outbound::marketplace::MarketOrder;

/// A chat message received on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub chat: ChatId,
    pub author: BuyerId,
    pub text: String,
}

/// Inbound event, consumed strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    /// A paid order was opened.
    NewOrder(MarketOrder),
    /// A chat message arrived.
    NewMessage(ChatMessage),
    /// An operator took a buyer out of (or back into) automated handling.
    ManualOverride { buyer: BuyerId, enabled: bool },
}

impl MarketEvent {
    #[must_use]
    pub fn buyer(&self) -> BuyerId {
        match self {
            Self::NewOrder(order) => order.buyer,
            Self::NewMessage(message) => message.author,
            Self::ManualOverride { buyer, .. } => *buyer,
        }
    }
}

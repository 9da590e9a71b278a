//! Builders for domain primitives used across tests.
//!
//! Provides a canonical catalog and concise factories for orders and chat
//! messages so tests focus on assertions rather than construction
//! boilerplate.

use std::collections::BTreeMap;

use crate::domain::{Bundle, BundleItem, BuyerId, Catalog, CategoryId, ChatId, OrderId};
use crate::infrastructure::catalog::default_gifts;
use crate::port::{ChatMessage, MarketEvent, MarketOrder};

/// Default gifts plus two bundles:
///
/// - `101`: fixed, 2 × gift `1` (15) + 1 × gift `3` (25) = 55 per unit
/// - `201`: choice between gifts `1` (15), `5` (50) and `8` (100)
pub fn sample_catalog() -> Catalog {
    let bundles = BTreeMap::from([
        (
            "101".to_string(),
            Bundle::Fixed {
                title: "Duo".into(),
                items: vec![
                    BundleItem {
                        code: "1".into(),
                        qty: 2,
                    },
                    BundleItem {
                        code: "3".into(),
                        qty: 1,
                    },
                ],
            },
        ),
        (
            "201".to_string(),
            Bundle::Choice {
                title: "Pick one".into(),
                options: vec!["1".into(), "5".into(), "8".into()],
            },
        ),
    ]);
    Catalog::new(default_gifts(), bundles)
}

/// Chat id used for a buyer's conversation.
pub fn chat(buyer: u64) -> ChatId {
    ChatId::new(format!("chat-{buyer}"))
}

/// A paid order in the first default category.
pub fn order(id: &str, buyer: u64, description: &str) -> MarketOrder {
    MarketOrder {
        id: OrderId::from(id),
        buyer: BuyerId::new(buyer),
        buyer_name: Some(format!("buyer{buyer}")),
        chat: chat(buyer),
        category: Some(CategoryId::new(3064)),
        description: description.to_string(),
        amount: None,
    }
}

/// Same as [`order`] with an explicit amount.
pub fn order_with_amount(id: &str, buyer: u64, description: &str, amount: u32) -> MarketOrder {
    MarketOrder {
        amount: Some(amount),
        ..order(id, buyer, description)
    }
}

pub fn new_order(order: MarketOrder) -> MarketEvent {
    MarketEvent::NewOrder(order)
}

/// A chat message from `buyer` in their conversation.
pub fn message(buyer: u64, text: &str) -> MarketEvent {
    MarketEvent::NewMessage(ChatMessage {
        chat: chat(buyer),
        author: BuyerId::new(buyer),
        text: text.to_string(),
    })
}

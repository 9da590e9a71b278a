//! Marketplace port: orders, chat, refunds and listings.
//!
//! Marketplace clients are blocking request/response APIs, so this port is
//! synchronous. It is driven from the orchestrator thread and from the
//! listing raise timer.

use crate::domain::{BuyerId, CategoryId, ChatId, LotId, OrderId};
use crate::error::MarketError;

/// Paid order as reported by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrder {
    pub id: OrderId,
    pub buyer: BuyerId,
    pub buyer_name: Option<String>,
    pub chat: ChatId,
    /// Subcategory of the purchased listing. Event payloads may omit it;
    /// the full order fetched by id carries it.
    pub category: Option<CategoryId>,
    /// Full listing description the buyer paid for.
    pub description: String,
    /// Ordered amount, when the marketplace reports one.
    pub amount: Option<u32>,
}

/// One of the seller's own listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSummary {
    pub id: LotId,
    pub title: String,
    pub description: String,
}

/// Editable listing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotFields {
    pub id: LotId,
    pub active: bool,
}

/// Marketplace collaborator.
pub trait Marketplace: Send + Sync {
    /// Marketplace id of the seller account; its own chat messages are ignored.
    fn account_id(&self) -> Option<BuyerId>;

    fn get_order(&self, id: &OrderId) -> Result<MarketOrder, MarketError>;

    fn send_message(&self, chat: &ChatId, text: &str) -> Result<(), MarketError>;

    /// Refund an order, fully when `amount` is `None`.
    ///
    /// Clients that cannot refund by amount return
    /// [`MarketError::Unsupported`].
    fn refund(&self, order: &OrderId, amount: Option<u64>) -> Result<(), MarketError>;

    fn refund_partial(&self, order: &OrderId, units: u32) -> Result<(), MarketError>;

    fn get_lot_fields(&self, lot: LotId) -> Result<LotFields, MarketError>;

    fn save_lot(&self, fields: &LotFields) -> Result<(), MarketError>;

    fn get_my_subcategory_lots(&self, category: CategoryId)
        -> Result<Vec<LotSummary>, MarketError>;

    /// Fallback listing by scanning the seller's whole category tree.
    fn scan_category_lots(&self, category: CategoryId) -> Result<Vec<LotSummary>, MarketError>;

    fn raise_lots(&self, category: CategoryId) -> Result<(), MarketError>;
}

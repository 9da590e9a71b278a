//! Recording [`Marketplace`] fake.
//!
//! Keeps orders and lots in memory, records every chat message, refund and
//! raise, and can be told to fail specific calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::domain::{BuyerId, CategoryId, ChatId, LotId, OrderId};
use crate::error::MarketError;
use crate::port::{LotFields, LotSummary, MarketOrder, Marketplace};

/// A refund the fake accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundCall {
    Full(OrderId),
    Amount(OrderId, u64),
    Units(OrderId, u32),
}

#[derive(Debug, Clone)]
struct StoredLot {
    category: CategoryId,
    summary: LotSummary,
    active: bool,
}

// ---------------------------------------------------------------------------
// RecordingMarketplace
// ---------------------------------------------------------------------------

/// In-memory marketplace that records everything the engine does.
pub struct RecordingMarketplace {
    account: Option<BuyerId>,
    orders: Mutex<HashMap<OrderId, MarketOrder>>,
    messages: Mutex<Vec<(ChatId, String)>>,
    refunds: Mutex<Vec<RefundCall>>,
    lots: Mutex<BTreeMap<LotId, StoredLot>>,
    saved: Mutex<Vec<LotFields>>,
    raises: Mutex<Vec<CategoryId>>,
    failing_saves: AtomicU32,
    amount_refunds_unsupported: AtomicBool,
    unit_refunds_fail: AtomicBool,
    refunds_fail: AtomicBool,
    subcategory_listing_fails: AtomicBool,
}

impl Default for RecordingMarketplace {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMarketplace {
    /// Seller account id is `1`.
    pub fn new() -> Self {
        Self {
            account: Some(BuyerId::new(1)),
            orders: Mutex::new(HashMap::new()),
            messages: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
            lots: Mutex::new(BTreeMap::new()),
            saved: Mutex::new(Vec::new()),
            raises: Mutex::new(Vec::new()),
            failing_saves: AtomicU32::new(0),
            amount_refunds_unsupported: AtomicBool::new(false),
            unit_refunds_fail: AtomicBool::new(false),
            refunds_fail: AtomicBool::new(false),
            subcategory_listing_fails: AtomicBool::new(false),
        }
    }

    /// Make an order fetchable by id.
    pub fn add_order(&self, order: MarketOrder) {
        self.orders.lock().insert(order.id.clone(), order);
    }

    pub fn add_lot(&self, category: CategoryId, id: u64, description: &str, active: bool) {
        let id = LotId::new(id);
        self.lots.lock().insert(
            id,
            StoredLot {
                category,
                summary: LotSummary {
                    id,
                    title: format!("lot {id}"),
                    description: description.to_string(),
                },
                active,
            },
        );
    }

    #[must_use]
    pub fn lot_active(&self, id: LotId) -> bool {
        self.lots.lock().get(&id).is_some_and(|lot| lot.active)
    }

    /// Fail the next `n` lot saves.
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Refunds by amount report [`MarketError::Unsupported`].
    pub fn refuse_amount_refunds(&self) {
        self.amount_refunds_unsupported.store(true, Ordering::SeqCst);
    }

    pub fn fail_unit_refunds(&self) {
        self.unit_refunds_fail.store(true, Ordering::SeqCst);
    }

    pub fn fail_refunds(&self) {
        self.refunds_fail.store(true, Ordering::SeqCst);
    }

    pub fn fail_subcategory_listing(&self) {
        self.subcategory_listing_fails.store(true, Ordering::SeqCst);
    }

    /// Every message sent, in order.
    pub fn messages(&self) -> Vec<(ChatId, String)> {
        self.messages.lock().clone()
    }

    /// Texts sent to one chat, in order.
    pub fn messages_to(&self, chat: &ChatId) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(to, _)| to == chat)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn refunds(&self) -> Vec<RefundCall> {
        self.refunds.lock().clone()
    }

    pub fn saved_lots(&self) -> Vec<LotFields> {
        self.saved.lock().clone()
    }

    pub fn raises(&self) -> Vec<CategoryId> {
        self.raises.lock().clone()
    }

    fn lots_in(&self, category: CategoryId) -> Vec<LotSummary> {
        self.lots
            .lock()
            .values()
            .filter(|lot| lot.category == category)
            .map(|lot| lot.summary.clone())
            .collect()
    }
}

impl Marketplace for RecordingMarketplace {
    fn account_id(&self) -> Option<BuyerId> {
        self.account
    }

    fn get_order(&self, id: &OrderId) -> Result<MarketOrder, MarketError> {
        self.orders
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(format!("order {id}")))
    }

    fn send_message(&self, chat: &ChatId, text: &str) -> Result<(), MarketError> {
        self.messages.lock().push((chat.clone(), text.to_string()));
        Ok(())
    }

    fn refund(&self, order: &OrderId, amount: Option<u64>) -> Result<(), MarketError> {
        if self.refunds_fail.load(Ordering::SeqCst) {
            return Err(MarketError::Request("refund rejected".into()));
        }
        let call = match amount {
            None => RefundCall::Full(order.clone()),
            Some(_) if self.amount_refunds_unsupported.load(Ordering::SeqCst) => {
                return Err(MarketError::Unsupported("refund by amount"));
            }
            Some(stars) => RefundCall::Amount(order.clone(), stars),
        };
        self.refunds.lock().push(call);
        Ok(())
    }

    fn refund_partial(&self, order: &OrderId, units: u32) -> Result<(), MarketError> {
        if self.unit_refunds_fail.load(Ordering::SeqCst) {
            return Err(MarketError::Unsupported("refund by units"));
        }
        self.refunds
            .lock()
            .push(RefundCall::Units(order.clone(), units));
        Ok(())
    }

    fn get_lot_fields(&self, lot: LotId) -> Result<LotFields, MarketError> {
        self.lots
            .lock()
            .get(&lot)
            .map(|stored| LotFields {
                id: lot,
                active: stored.active,
            })
            .ok_or_else(|| MarketError::NotFound(format!("lot {lot}")))
    }

    fn save_lot(&self, fields: &LotFields) -> Result<(), MarketError> {
        let failing = self.failing_saves.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_saves.store(failing - 1, Ordering::SeqCst);
            return Err(MarketError::Request("save failed".into()));
        }
        let mut lots = self.lots.lock();
        let stored = lots
            .get_mut(&fields.id)
            .ok_or_else(|| MarketError::NotFound(format!("lot {}", fields.id)))?;
        stored.active = fields.active;
        self.saved.lock().push(fields.clone());
        Ok(())
    }

    fn get_my_subcategory_lots(
        &self,
        category: CategoryId,
    ) -> Result<Vec<LotSummary>, MarketError> {
        if self.subcategory_listing_fails.load(Ordering::SeqCst) {
            return Err(MarketError::Request("listing failed".into()));
        }
        Ok(self.lots_in(category))
    }

    fn scan_category_lots(&self, category: CategoryId) -> Result<Vec<LotSummary>, MarketError> {
        Ok(self.lots_in(category))
    }

    fn raise_lots(&self, category: CategoryId) -> Result<(), MarketError> {
        self.raises.lock().push(category);
        Ok(())
    }
}

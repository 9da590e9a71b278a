//! Sequential event consumer.
//!
//! The orchestrator owns every pending order and handles marketplace events
//! one at a time on the calling thread. It applies the entry gates (seller's
//! own messages, debounce, category allow-list, manual handling) and hands
//! the rest to [`FulfillmentService`].

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::fulfillment::repository::OrderRepository;
use crate::application::fulfillment::{FulfillmentService, OpenOutcome, Step};
use crate::domain::{BuyerId, CategoryId, PendingOrder};
use crate::infrastructure::templates::Templates;
use crate::port::{ChatMessage, MarketEvent, MarketOrder, Marketplace};

pub struct Orchestrator {
    fulfillment: FulfillmentService,
    market: Arc<dyn Marketplace>,
    templates: Arc<Templates>,
    categories: Vec<CategoryId>,
    orders: OrderRepository,
    last_reply: HashMap<BuyerId, Instant>,
    completed: HashSet<BuyerId>,
    /// Buyers under manual handling, with the time of their last notice.
    manual: HashMap<BuyerId, Option<Instant>>,
}

impl Orchestrator {
    pub fn new(
        fulfillment: FulfillmentService,
        market: Arc<dyn Marketplace>,
        templates: Arc<Templates>,
    ) -> Self {
        let categories = fulfillment.config().categories();
        Self {
            fulfillment,
            market,
            templates,
            categories,
            orders: OrderRepository::new(),
            last_reply: HashMap::new(),
            completed: HashSet::new(),
            manual: HashMap::new(),
        }
    }

    /// Consume events until every sender is dropped.
    pub fn run(&mut self, events: Receiver<MarketEvent>) {
        info!("Orchestrator started");
        while let Ok(event) = events.recv() {
            self.handle(event);
        }
        info!(pending = self.orders.len(), "Event channel closed, orchestrator stopping");
    }

    pub fn handle(&mut self, event: MarketEvent) {
        self.handle_at(event, Instant::now());
    }

    pub fn handle_at(&mut self, event: MarketEvent, now: Instant) {
        match event {
            MarketEvent::NewOrder(order) => self.on_order(order, now),
            MarketEvent::NewMessage(message) => self.on_message(&message, now),
            MarketEvent::ManualOverride { buyer, enabled } => self.on_override(buyer, enabled),
        }
    }

    fn on_order(&mut self, order: MarketOrder, now: Instant) {
        let buyer = order.buyer;
        if self.manual.contains_key(&buyer) {
            info!(order = %order.id, %buyer, "Buyer under manual handling, order ignored");
            return;
        }
        if self.debounced(buyer, now) {
            debug!(order = %order.id, %buyer, "Order within reply cooldown, ignored");
            return;
        }
        let Some(order) = self.with_category(order) else {
            return;
        };
        if !order
            .category
            .is_some_and(|category| self.categories.contains(&category))
        {
            debug!(order = %order.id, category = ?order.category, "Order outside handled categories");
            return;
        }

        let outcome = self.fulfillment.open(&order);
        self.last_reply.insert(buyer, now);
        match outcome {
            OpenOutcome::Pending(pending) => {
                self.completed.remove(&pending.buyer);
                if let Some(previous) = self.orders.insert(pending) {
                    warn!(
                        buyer = %previous.buyer,
                        replaced = %previous.order_id,
                        order = %order.id,
                        "New order replaced a pending one"
                    );
                }
            }
            OpenOutcome::Skipped | OpenOutcome::Rejected => {}
        }
    }

    /// Fill in a missing category by fetching the full order.
    fn with_category(&self, order: MarketOrder) -> Option<MarketOrder> {
        if order.category.is_some() {
            return Some(order);
        }
        match self.market.get_order(&order.id) {
            Ok(full) => Some(full),
            Err(err) => {
                warn!(order = %order.id, error = %err, "Failed to fetch order details");
                None
            }
        }
    }

    fn on_message(&mut self, message: &ChatMessage, now: Instant) {
        let buyer = message.author;
        if self.market.account_id() == Some(buyer) {
            return;
        }

        if let Some(last_notice) = self.manual.get_mut(&buyer) {
            let cooldown = self.fulfillment.config().manual_notice_cooldown();
            if last_notice.map_or(true, |at| now.duration_since(at) >= cooldown) {
                *last_notice = Some(now);
                let text = self.templates.render("manual_override_notice", &[]);
                if let Err(err) = self.market.send_message(&message.chat, &text) {
                    warn!(%buyer, error = %err, "Failed to send manual handling notice");
                }
            }
            return;
        }

        if self.orders.get(buyer).is_none() {
            return;
        }

        if self.debounced(buyer, now) {
            debug!(%buyer, "Message within reply cooldown, ignored");
            return;
        }
        self.last_reply.insert(buyer, now);

        let Some(order) = self.orders.get_mut(buyer) else {
            return;
        };

        match self.fulfillment.handle_message(order, &message.text) {
            Step::Continue => {}
            Step::Finished { completed } => {
                if let Some(order) = self.orders.remove(buyer) {
                    info!(order = %order.order_id, %buyer, completed, "Order closed");
                }
                if completed {
                    self.completed.insert(buyer);
                }
            }
        }
    }

    /// Whether `buyer` was last answered less than the reply cooldown ago.
    fn debounced(&self, buyer: BuyerId, now: Instant) -> bool {
        let cooldown = self.fulfillment.config().reply_cooldown();
        self.last_reply
            .get(&buyer)
            .is_some_and(|last| now.saturating_duration_since(*last) < cooldown)
    }

    fn on_override(&mut self, buyer: BuyerId, enabled: bool) {
        if enabled {
            self.manual.entry(buyer).or_insert(None);
            if let Some(order) = self.orders.remove(buyer) {
                info!(order = %order.order_id, %buyer, "Order moved to manual handling");
            } else {
                info!(%buyer, "Buyer moved to manual handling");
            }
        } else if self.manual.remove(&buyer).is_some() {
            info!(%buyer, "Buyer returned to automated handling");
        }
    }

    #[must_use]
    pub fn pending(&self, buyer: BuyerId) -> Option<&PendingOrder> {
        self.orders.get(buyer)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_completed(&self, buyer: BuyerId) -> bool {
        self.completed.contains(&buyer)
    }

    #[must_use]
    pub fn is_manual(&self, buyer: BuyerId) -> bool {
        self.manual.contains_key(&buyer)
    }
}

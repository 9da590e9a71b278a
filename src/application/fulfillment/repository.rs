//! Pending orders keyed by buyer.

use std::collections::HashMap;

use crate::domain::{BuyerId, PendingOrder};

/// At most one pending order per buyer.
#[derive(Debug, Default)]
pub struct OrderRepository {
    orders: HashMap<BuyerId, PendingOrder>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an order, returning the one it replaced.
    pub fn insert(&mut self, order: PendingOrder) -> Option<PendingOrder> {
        self.orders.insert(order.buyer, order)
    }

    #[must_use]
    pub fn get(&self, buyer: BuyerId) -> Option<&PendingOrder> {
        self.orders.get(&buyer)
    }

    pub fn get_mut(&mut self, buyer: BuyerId) -> Option<&mut PendingOrder> {
        self.orders.get_mut(&buyer)
    }

    pub fn remove(&mut self, buyer: BuyerId) -> Option<PendingOrder> {
        self.orders.remove(&buyer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

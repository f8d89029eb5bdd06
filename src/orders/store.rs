// src/orders/store.rs
//! Read/write contract against durable order state.

use crate::error::{OrderError, Result};
use crate::orders::order::{Order, OrderStatus, Transition};
use crate::routing::ExecutionReceipt;
use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;

/// Durable source of truth for orders. Every write is keyed by order id and
/// updates the record in place.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Records a new order; fails if the id already exists.
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Order>>;

    /// Moves an order one intermediate step along the success path.
    async fn transition(&self, id: &str, to: OrderStatus) -> Result<Transition>;

    /// Prepares an order for a processing attempt and returns its current state.
    /// Non-confirmed orders are rewound to `pending`; confirmed ones are returned as-is.
    async fn begin_attempt(&self, id: &str) -> Result<Order>;

    async fn mark_confirmed(&self, id: &str, receipt: &ExecutionReceipt) -> Result<Transition>;

    async fn mark_failed(&self, id: &str, reason: &str) -> Result<Transition>;
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<String, Order>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.orders.iter().map(|entry| entry.key().clone()).collect()
    }

    fn update<F>(&self, id: &str, f: F) -> Result<Transition>
    where
        F: FnOnce(&mut Order) -> Transition,
    {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))?;
        let from = entry.status;
        let outcome = f(entry.value_mut());
        debug!("Order {}: {} -> {} ({:?})", id, from, entry.status, outcome);
        Ok(outcome)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        match self.orders.entry(order.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(OrderError::Persistence(format!(
                "order {} already exists",
                order.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.orders.get(id).map(|o| o.value().clone()))
    }

    async fn transition(&self, id: &str, to: OrderStatus) -> Result<Transition> {
        self.update(id, |order| order.apply(to))
    }

    async fn begin_attempt(&self, id: &str) -> Result<Order> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))?;
        entry.begin_attempt();
        Ok(entry.value().clone())
    }

    async fn mark_confirmed(&self, id: &str, receipt: &ExecutionReceipt) -> Result<Transition> {
        self.update(id, |order| order.confirm(receipt))
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> Result<Transition> {
        self.update(id, |order| order.fail(reason))
    }
}

// src/orders/service.rs
//! Order intake: validate, persist as pending, enqueue exactly one job.

use crate::error::Result;
use crate::orders::order::{Order, SwapRequest};
use crate::orders::store::OrderStore;
use crate::queue::{Job, JobQueue};
use log::{error, info};
use std::sync::Arc;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    queue: Arc<dyn JobQueue>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    pub fn store(&self) -> Arc<dyn OrderStore> {
        self.store.clone()
    }

    /// Accepts a swap and returns the new order id. Invalid requests are
    /// rejected before anything is written.
    pub async fn submit(&self, request: SwapRequest) -> Result<String> {
        request.validate()?;

        let order = Order::new(&request);
        self.store.insert(&order).await?;

        if let Err(e) = self.queue.enqueue(Job::for_order(&order)).await {
            error!("Failed to enqueue order {}: {}", order.id, e);
            let reason = e.to_string();
            if let Err(store_err) = self.store.mark_failed(&order.id, &reason).await {
                error!("Could not record failure for order {}: {}", order.id, store_err);
            }
            return Err(e);
        }

        info!(
            "📥 Order {} accepted: {} {} -> {}",
            order.id, order.amount, order.input_token, order.output_token
        );
        Ok(order.id)
    }
}

// src/queue/processor.rs
//! One processing attempt for an order job: drives the order through
//! pending -> routing -> building -> submitted -> confirmed, persisting each
//! step before publishing it, and records `failed` when any step errors.

use super::{Job, JobHandler};
use crate::error::{OrderError, Result};
use crate::orders::order::{OrderStatus, StatusEvent, Transition};
use crate::orders::store::OrderStore;
use crate::routing::{DexRouter, ExecutionReceipt};
use crate::websocket::StatusChannelRegistry;
use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;

pub struct OrderProcessor {
    store: Arc<dyn OrderStore>,
    router: Arc<DexRouter>,
    registry: Arc<StatusChannelRegistry>,
}

impl OrderProcessor {
    pub fn new(store: Arc<dyn OrderStore>, router: Arc<DexRouter>, registry: Arc<StatusChannelRegistry>) -> Self {
        Self {
            store,
            router,
            registry,
        }
    }

    async fn advance(&self, order_id: &str, to: OrderStatus) -> Result<()> {
        match self.store.transition(order_id, to).await? {
            Transition::Applied => {
                self.registry.emit(order_id, StatusEvent::new(order_id, to));
                Ok(())
            }
            Transition::Ignored => Err(OrderError::Persistence(format!(
                "order {} could not move to {}",
                order_id, to
            ))),
        }
    }

    async fn execute(&self, job: &Job) -> Result<ExecutionReceipt> {
        let id = job.order_id.as_str();

        self.advance(id, OrderStatus::Routing).await?;
        let decision = self
            .router
            .route(&job.input_token, &job.output_token, job.amount)
            .await?;

        self.advance(id, OrderStatus::Building).await?;
        self.advance(id, OrderStatus::Submitted).await?;
        let receipt = self
            .router
            .settle(&decision, &job.input_token, &job.output_token, job.amount)
            .await?;

        match self.store.mark_confirmed(id, &receipt).await? {
            Transition::Applied => Ok(receipt),
            Transition::Ignored => Err(OrderError::Persistence(format!(
                "order {} left submitted before confirmation",
                id
            ))),
        }
    }
}

#[async_trait]
impl JobHandler for OrderProcessor {
    async fn handle(&self, job: &Job) -> Result<()> {
        let id = job.order_id.as_str();
        let order = self.store.begin_attempt(id).await?;
        if order.status == OrderStatus::Confirmed {
            info!("Order {} already confirmed, skipping redelivered job", id);
            return Ok(());
        }

        self.registry.emit(id, StatusEvent::new(id, OrderStatus::Pending));

        match self.execute(job).await {
            Ok(receipt) => {
                info!(
                    "✅ Order {} confirmed on {} @ {} ({})",
                    id, receipt.venue, receipt.executed_price, receipt.tx_reference
                );
                self.registry.emit(id, StatusEvent::confirmed(id, &receipt));
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Order {} attempt {} failed: {}", id, job.attempts_made + 1, reason);
                if let Err(store_err) = self.store.mark_failed(id, &reason).await {
                    error!("Could not record failure for order {}: {}", id, store_err);
                }
                self.registry.emit(id, StatusEvent::failed(id, &reason));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::order::{Order, SwapRequest};
    use crate::orders::InMemoryOrderStore;
    use crate::testing::{as_sources, ScriptedQuoteSource, ScriptedSettlement};
    use pretty_assertions::assert_eq;

    async fn setup(router: DexRouter) -> (Arc<InMemoryOrderStore>, Arc<StatusChannelRegistry>, OrderProcessor, Job) {
        let store = Arc::new(InMemoryOrderStore::new());
        let registry = Arc::new(StatusChannelRegistry::new());
        let order = Order::new(&SwapRequest::new("SOL", "USDC", 10.0));
        store.insert(&order).await.unwrap();
        let processor = OrderProcessor::new(store.clone(), Arc::new(router), registry.clone());
        (store, registry, processor, Job::for_order(&order))
    }

    fn router(settlement: ScriptedSettlement) -> DexRouter {
        DexRouter::new(
            as_sources(vec![
                Arc::new(ScriptedQuoteSource::fixed("Raydium", 100.2, 0.003)),
                Arc::new(ScriptedQuoteSource::fixed("Meteora", 100.5, 0.002)),
            ]),
            Arc::new(settlement),
        )
    }

    #[tokio::test]
    async fn test_success_path_emits_every_status() {
        let (store, registry, processor, job) = setup(router(ScriptedSettlement::succeeding())).await;
        let (_, mut rx) = registry.attach(&job.order_id);

        processor.handle(&job).await.unwrap();

        let mut statuses = Vec::new();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            statuses.push(event.status);
            last = Some(event);
        }
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Pending,
                OrderStatus::Routing,
                OrderStatus::Building,
                OrderStatus::Submitted,
                OrderStatus::Confirmed
            ]
        );
        let last = last.unwrap();
        assert_eq!(last.venue.as_deref(), Some("Meteora"));

        let stored = store.get(&job.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.tx_hash, last.tx_hash);
    }

    #[tokio::test]
    async fn test_settlement_failure_records_reason() {
        let (store, registry, processor, job) = setup(router(ScriptedSettlement::rejecting())).await;
        let (_, mut rx) = registry.attach(&job.order_id);

        let err = processor.handle(&job).await.unwrap_err();
        assert!(matches!(err, OrderError::Execution(_)));

        let stored = store.get(&job.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some(err.to_string().as_str()));
        assert!(stored.tx_hash.is_none());

        let mut terminal = Vec::new();
        while let Some(event) = rx.recv().await {
            if event.is_terminal() {
                terminal.push(event);
            }
        }
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn test_redelivered_confirmed_job_is_skipped() {
        let settlement = Arc::new(ScriptedSettlement::succeeding());
        let store = Arc::new(InMemoryOrderStore::new());
        let registry = Arc::new(StatusChannelRegistry::new());
        let order = Order::new(&SwapRequest::new("SOL", "USDC", 10.0));
        store.insert(&order).await.unwrap();
        let router = DexRouter::new(
            as_sources(vec![Arc::new(ScriptedQuoteSource::fixed("Raydium", 100.0, 0.003))]),
            settlement.clone(),
        );
        let processor = OrderProcessor::new(store.clone(), Arc::new(router), registry);
        let job = Job::for_order(&order);

        processor.handle(&job).await.unwrap();
        let first = store.get(&order.id).await.unwrap().unwrap();
        processor.handle(&job).await.unwrap();
        let second = store.get(&order.id).await.unwrap().unwrap();

        assert_eq!(settlement.calls(), 1);
        assert_eq!(first.tx_hash, second.tx_hash);
    }

    #[tokio::test]
    async fn test_retry_after_failure_starts_from_pending() {
        let (store, _registry, processor, job) = setup(DexRouter::new(
            as_sources(vec![Arc::new(ScriptedQuoteSource::failing_first("Raydium", 100.0, 0.003, 1))]),
            Arc::new(ScriptedSettlement::succeeding()),
        ))
        .await;

        assert!(matches!(processor.handle(&job).await, Err(OrderError::Quoting(_))));
        assert_eq!(store.get(&job.order_id).await.unwrap().unwrap().status, OrderStatus::Failed);

        processor.handle(&job).await.unwrap();
        let stored = store.get(&job.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert!(stored.failure_reason.is_none());
    }
}

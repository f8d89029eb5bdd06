use order_engine::error::RetryPolicy;
use order_engine::orders::{InMemoryOrderStore, Order, OrderService, OrderStatus, OrderStore, StatusEvent, SwapRequest};
use order_engine::queue::{JobQueue, MemoryJobQueue, OrderProcessor, WorkerPool};
use order_engine::routing::DexRouter;
use order_engine::testing::{as_sources, ScriptedQuoteSource, ScriptedSettlement};
use order_engine::websocket::StatusChannelRegistry;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything except the worker pool, so subscribers can attach before processing starts.
struct Harness {
    store: Arc<InMemoryOrderStore>,
    queue: Arc<MemoryJobQueue>,
    registry: Arc<StatusChannelRegistry>,
    service: OrderService,
    processor: Arc<OrderProcessor>,
}

impl Harness {
    fn new(sources: Vec<Arc<ScriptedQuoteSource>>, settlement: Arc<ScriptedSettlement>) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let registry = Arc::new(StatusChannelRegistry::new());
        let router = Arc::new(
            DexRouter::new(as_sources(sources), settlement)
                .with_timeouts(Duration::from_secs(5), Duration::from_secs(10)),
        );
        let processor = Arc::new(OrderProcessor::new(store.clone(), router, registry.clone()));
        let service = OrderService::new(store.clone(), queue.clone());
        Self {
            store,
            queue,
            registry,
            service,
            processor,
        }
    }

    fn start(&self, concurrency: usize) -> WorkerPool {
        WorkerPool::spawn(self.queue.clone(), self.processor.clone(), concurrency, RetryPolicy::default())
    }

    async fn submit(&self, input: &str, output: &str, amount: f64) -> String {
        self.service.submit(SwapRequest::new(input, output, amount)).await.unwrap()
    }

    async fn order(&self, id: &str) -> Order {
        self.store.get(id).await.unwrap().unwrap()
    }

    async fn wait_for(&self, id: &str, status: OrderStatus) -> Order {
        for _ in 0..600 {
            let order = self.order(id).await;
            if order.status == status {
                return order;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("order {} never reached {}", id, status);
    }

    async fn wait_for_dead_letters(&self, count: usize) {
        for _ in 0..600 {
            if self.queue.dead_letters().await.unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected {} dead letter(s)", count);
    }
}

async fn drain(mut rx: mpsc::Receiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn statuses(events: &[StatusEvent]) -> Vec<OrderStatus> {
    events.iter().map(|e| e.status).collect()
}

#[tokio::test(start_paused = true)]
async fn sol_usdc_order_confirms_on_best_venue() {
    let harness = Harness::new(
        vec![
            Arc::new(ScriptedQuoteSource::fixed("Raydium", 101.5, 0.003)),
            Arc::new(ScriptedQuoteSource::fixed("Meteora", 99.2, 0.002)),
        ],
        Arc::new(ScriptedSettlement::succeeding().with_latency(Duration::from_secs(2))),
    );
    let id = harness.submit("SOL", "USDC", 10.0).await;
    assert_eq!(harness.order(&id).await.status, OrderStatus::Pending);

    let (_, rx) = harness.registry.attach(&id);
    let pool = harness.start(10);
    let events = drain(rx).await;

    assert_eq!(
        statuses(&events),
        vec![
            OrderStatus::Pending,
            OrderStatus::Routing,
            OrderStatus::Building,
            OrderStatus::Submitted,
            OrderStatus::Confirmed
        ]
    );
    let confirmed = events.last().unwrap();
    assert_eq!(confirmed.venue.as_deref(), Some("Raydium"));
    assert_eq!(confirmed.executed_price, Some(101.5));
    let tx = confirmed.tx_hash.clone().unwrap();
    assert!(tx.starts_with("tx_"));
    assert_eq!(tx.len(), 35);

    let order = harness.wait_for(&id, OrderStatus::Confirmed).await;
    assert_eq!(order.tx_hash, Some(tx));
    assert_eq!(order.venue.as_deref(), Some("Raydium"));
    assert!(order.failure_reason.is_none());
    assert!(!harness.registry.is_attached(&id));
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn persistent_quote_failure_fails_after_three_attempts() {
    let meteora = Arc::new(ScriptedQuoteSource::always_failing("Meteora"));
    let harness = Harness::new(
        vec![Arc::new(ScriptedQuoteSource::fixed("Raydium", 101.5, 0.003)), meteora.clone()],
        Arc::new(ScriptedSettlement::succeeding()),
    );
    let id = harness.submit("SOL", "USDC", 10.0).await;
    let (_, rx) = harness.registry.attach(&id);

    let started = tokio::time::Instant::now();
    let pool = harness.start(10);

    // The subscriber sees the first attempt end and is then closed.
    let events = drain(rx).await;
    assert_eq!(
        statuses(&events),
        vec![OrderStatus::Pending, OrderStatus::Routing, OrderStatus::Failed]
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    harness.wait_for_dead_letters(1).await;
    // Backoff of 1s then 2s between the three attempts.
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(meteora.calls(), 3);

    let order = harness.order(&id).await;
    assert_eq!(order.status, OrderStatus::Failed);
    let reason = order.failure_reason.unwrap();
    assert!(reason.contains("Quoting"), "unexpected reason: {}", reason);
    assert!(order.tx_hash.is_none());

    let dead = harness.queue.dead_letters().await.unwrap();
    assert_eq!(dead[0].job.order_id, id);
    assert_eq!(dead[0].job.attempts_made, 3);
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_retry_budget() {
    let meteora = Arc::new(ScriptedQuoteSource::failing_first("Meteora", 99.2, 0.002, 2));
    let settlement = Arc::new(ScriptedSettlement::succeeding());
    let harness = Harness::new(
        vec![Arc::new(ScriptedQuoteSource::fixed("Raydium", 101.5, 0.003)), meteora.clone()],
        settlement.clone(),
    );
    let id = harness.submit("SOL", "USDC", 10.0).await;
    let pool = harness.start(10);

    let order = harness.wait_for(&id, OrderStatus::Confirmed).await;
    assert_eq!(meteora.calls(), 3);
    assert_eq!(settlement.calls(), 1);
    assert!(order.failure_reason.is_none());
    assert!(harness.queue.dead_letters().await.unwrap().is_empty());
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn settlement_rejection_is_retried_then_recorded() {
    let settlement = Arc::new(ScriptedSettlement::rejecting());
    let harness = Harness::new(
        vec![Arc::new(ScriptedQuoteSource::fixed("Raydium", 101.5, 0.003))],
        settlement.clone(),
    );
    let id = harness.submit("SOL", "USDC", 1.0).await;
    let pool = harness.start(10);

    harness.wait_for_dead_letters(1).await;
    assert_eq!(settlement.calls(), 3);
    let order = harness.order(&id).await;
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.failure_reason.unwrap().contains("Execution"));
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn orders_complete_without_subscribers() {
    let harness = Harness::new(
        vec![
            Arc::new(ScriptedQuoteSource::fixed("Raydium", 100.0, 0.003)),
            Arc::new(ScriptedQuoteSource::fixed("Meteora", 100.0, 0.002)),
        ],
        Arc::new(ScriptedSettlement::succeeding()),
    );
    let id = harness.submit("SOL", "USDC", 3.0).await;
    let pool = harness.start(10);

    let order = harness.wait_for(&id, OrderStatus::Confirmed).await;
    // Exact tie: the first configured source wins.
    assert_eq!(order.venue.as_deref(), Some("Raydium"));
    assert!(harness.registry.is_empty());
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_orders_get_distinct_tx_references() {
    let harness = Harness::new(
        vec![
            Arc::new(ScriptedQuoteSource::fixed("Raydium", 100.4, 0.003).with_latency(Duration::from_millis(200))),
            Arc::new(ScriptedQuoteSource::fixed("Meteora", 100.9, 0.002).with_latency(Duration::from_millis(300))),
        ],
        Arc::new(ScriptedSettlement::succeeding().with_latency(Duration::from_secs(2))),
    );
    let mut ids = Vec::new();
    for i in 0..25 {
        ids.push(harness.submit("SOL", "USDC", 1.0 + i as f64).await);
    }
    let pool = harness.start(10);

    let mut tx_refs = HashSet::new();
    for id in &ids {
        let order = harness.wait_for(id, OrderStatus::Confirmed).await;
        assert_eq!(order.venue.as_deref(), Some("Meteora"));
        tx_refs.insert(order.tx_hash.unwrap());
    }
    assert_eq!(tx_refs.len(), ids.len());
    assert_eq!(pool.stats().completed(), 25);
    pool.shutdown().await;
}

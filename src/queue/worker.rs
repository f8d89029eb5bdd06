// src/queue/worker.rs
//! Bounded worker pool draining a [`JobQueue`].
//!
//! A dispatch loop holds a semaphore permit before reserving each job, so at
//! most `concurrency` jobs are in flight. Each finished attempt is classified
//! by [`JobOutcome::decide`] and the job is acked, rescheduled with backoff,
//! or dead-lettered.

use super::{Job, JobOutcome, JobQueue};
use crate::error::{Result, RetryPolicy};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

const DISPATCH_POLL: Duration = Duration::from_millis(500);
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Processes one attempt of a job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    pub completed: AtomicU64,
    pub retried: AtomicU64,
    pub dead_lettered: AtomicU64,
}

impl WorkerStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }
}

pub struct WorkerPool {
    concurrency: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<WorkerStats>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl WorkerPool {
    pub fn spawn(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        policy: RetryPolicy,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let stats = Arc::new(WorkerStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = tokio::spawn(dispatch_loop(
            queue,
            handler,
            semaphore.clone(),
            stats.clone(),
            policy,
            shutdown_rx,
        ));

        info!("🚀 Worker pool started with concurrency {}", concurrency);
        Self {
            concurrency,
            semaphore,
            stats,
            shutdown_tx,
            dispatcher,
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Stops reserving new jobs and waits for in-flight ones to finish.
    pub async fn shutdown(self) {
        info!("Worker pool shutting down");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.dispatcher.await {
            error!("Worker dispatcher task failed: {}", e);
        }
        match self.semaphore.acquire_many(self.concurrency as u32).await {
            Ok(_) => info!("Worker pool drained"),
            Err(e) => warn!("Worker pool semaphore closed during shutdown: {}", e),
        }
    }
}

async fn dispatch_loop(
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    semaphore: Arc<Semaphore>,
    stats: Arc<WorkerStats>,
    policy: RetryPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown_rx.changed() => break,
        };

        let reserved = tokio::select! {
            reserved = queue.wait_for_job(DISPATCH_POLL) => reserved,
            _ = shutdown_rx.changed() => break,
        };

        match reserved {
            Ok(Some(job)) => {
                let (queue, handler, stats) = (queue.clone(), handler.clone(), stats.clone());
                let policy = policy.clone();
                tokio::spawn(async move {
                    run_job(queue.as_ref(), handler.as_ref(), &stats, &policy, job).await;
                    drop(permit);
                });
            }
            Ok(None) => {}
            Err(e) => {
                error!("Failed to reserve job: {}", e);
                drop(permit);
                tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
            }
        }
    }
    debug!("Worker dispatch loop stopped");
}

async fn run_job(
    queue: &dyn JobQueue,
    handler: &dyn JobHandler,
    stats: &WorkerStats,
    policy: &RetryPolicy,
    mut job: Job,
) {
    let attempt = job.attempts_made + 1;
    debug!("Processing job {} (order {}), attempt {}", job.id, job.order_id, attempt);

    let result = handler.handle(&job).await;
    job.attempts_made = attempt;

    let bookkeeping = match JobOutcome::decide(result, attempt, policy) {
        JobOutcome::Completed => {
            stats.completed.fetch_add(1, Ordering::Relaxed);
            queue.ack(&job).await
        }
        JobOutcome::Retry { error, delay } => {
            warn!(
                "Order {} attempt {}/{} failed: {}. Retrying in {:?}",
                job.order_id, attempt, policy.max_attempts, error, delay
            );
            stats.retried.fetch_add(1, Ordering::Relaxed);
            queue.schedule_retry(job.clone(), delay).await
        }
        JobOutcome::DeadLetter { error } => {
            error!(
                "❌ Order {} failed permanently after {} attempt(s): {}",
                job.order_id, attempt, error
            );
            stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
            queue.dead_letter(job.clone(), &error.to_string()).await
        }
    };

    if let Err(e) = bookkeeping {
        error!("Queue bookkeeping for job {} failed: {}", job.id, e);
    }
}

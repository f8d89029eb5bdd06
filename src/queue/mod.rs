// src/queue/mod.rs
//! Order-processing job queue and worker pool.
//!
//! Delivery is at-least-once: a reserved job stays in flight until it is
//! acknowledged, rescheduled for retry, or dead-lettered.

pub mod memory;
pub mod processor;
pub mod redis_queue;
pub mod worker;

pub use memory::MemoryJobQueue;
pub use processor::OrderProcessor;
pub use redis_queue::RedisJobQueue;
pub use worker::{JobHandler, WorkerPool, WorkerStats};

use crate::error::{OrderError, Result, RetryPolicy};
use crate::orders::order::Order;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit of work for one order. Enqueued once per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub order_id: String,
    pub input_token: String,
    pub output_token: String,
    pub amount: f64,
    /// Attempts already made; maintained by the queue infrastructure.
    pub attempts_made: u32,
}

impl Job {
    pub fn for_order(order: &Order) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            input_token: order.input_token.clone(),
            output_token: order.output_token.clone(),
            amount: order.amount,
            attempts_made: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub job: Job,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// What the pool does with a job after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Retry { error: OrderError, delay: Duration },
    DeadLetter { error: OrderError },
}

impl JobOutcome {
    /// Classifies the result of attempt number `attempt` (1-based).
    pub fn decide(result: Result<()>, attempt: u32, policy: &RetryPolicy) -> Self {
        match result {
            Ok(()) => JobOutcome::Completed,
            Err(error) if policy.should_retry(&error, attempt) => JobOutcome::Retry {
                delay: policy.delay_for_attempt(attempt),
                error,
            },
            Err(error) => JobOutcome::DeadLetter { error },
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<()>;

    /// Takes the next ready job, if any, and marks it in flight.
    async fn reserve(&self) -> Result<Option<Job>>;

    /// Waits up to `max_wait` for a ready job.
    async fn wait_for_job(&self, max_wait: Duration) -> Result<Option<Job>> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if let Some(job) = self.reserve().await? {
                return Ok(Some(job));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep((deadline - now).min(Duration::from_millis(100))).await;
        }
    }

    /// Completes an in-flight job.
    async fn ack(&self, job: &Job) -> Result<()>;

    /// Moves an in-flight job back to waiting once `delay` has elapsed.
    async fn schedule_retry(&self, job: Job, delay: Duration) -> Result<()>;

    /// Retires an in-flight job permanently.
    async fn dead_letter(&self, job: Job, reason: &str) -> Result<()>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>>;
}

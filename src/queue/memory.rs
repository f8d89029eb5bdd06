// src/queue/memory.rs
//! In-process job queue. Not durable across restarts; used by tests and
//! single-process deployments (`JOB_QUEUE=memory`).

use super::{DeadLetter, Job, JobQueue};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Debug, Default)]
struct QueueState {
    waiting: VecDeque<Job>,
    delayed: Vec<(Instant, Job)>,
    in_flight: HashMap<String, Job>,
    dead: Vec<DeadLetter>,
}

impl QueueState {
    fn promote_due(&mut self, now: Instant) {
        let mut still_delayed = Vec::with_capacity(self.delayed.len());
        let mut due: Vec<(Instant, Job)> = Vec::new();
        for (ready_at, job) in self.delayed.drain(..) {
            if ready_at <= now {
                due.push((ready_at, job));
            } else {
                still_delayed.push((ready_at, job));
            }
        }
        due.sort_by_key(|(ready_at, _)| *ready_at);
        self.waiting.extend(due.into_iter().map(|(_, job)| job));
        self.delayed = still_delayed;
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.delayed.iter().map(|(ready_at, _)| *ready_at).min()
    }
}

#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn waiting_len(&self) -> usize {
        self.state.lock().await.waiting.len()
    }

    pub async fn delayed_len(&self) -> usize {
        self.state.lock().await.delayed.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        debug!("Enqueued job {} for order {}", job.id, job.order_id);
        self.state.lock().await.waiting.push_back(job);
        self.notify.notify_one();
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<Job>> {
        let mut state = self.state.lock().await;
        state.promote_due(Instant::now());
        let job = state.waiting.pop_front();
        if let Some(ref job) = job {
            state.in_flight.insert(job.id.clone(), job.clone());
        }
        Ok(job)
    }

    async fn wait_for_job(&self, max_wait: Duration) -> Result<Option<Job>> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(job) = self.reserve().await? {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wake_at = match self.state.lock().await.next_ready_at() {
                Some(ready_at) => ready_at.min(deadline),
                None => deadline,
            };
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, job: &Job) -> Result<()> {
        self.state.lock().await.in_flight.remove(&job.id);
        Ok(())
    }

    async fn schedule_retry(&self, job: Job, delay: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&job.id);
        debug!("Job {} delayed {:?} (attempts made: {})", job.id, delay, job.attempts_made);
        state.delayed.push((Instant::now() + delay, job));
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    async fn dead_letter(&self, job: Job, reason: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&job.id);
        state.dead.push(DeadLetter {
            job,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        Ok(self.state.lock().await.dead.clone())
    }
}

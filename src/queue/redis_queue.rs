// src/queue/redis_queue.rs
//! Redis-backed job queue. Jobs are JSON-encoded into four keys under the
//! queue name:
//!   `{name}:wait`    list, LPUSH on enqueue, RPOPLPUSH into `active` on reserve
//!   `{name}:active`  list of in-flight jobs, LREM on ack/retry/dead-letter
//!   `{name}:delayed` sorted set scored by ready-at epoch millis
//!   `{name}:dead`    list of dead-letter records
//!
//! Every move between keys runs as one Lua script, so a job is never lost or
//! duplicated between two keys if the process dies mid-move.

use super::{DeadLetter, Job, JobQueue};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::fmt;
use std::time::Duration;

/// Lua helper: LREM the in-flight entry whose decoded `id` equals `job_id`.
macro_rules! remove_active_lua {
    () => {
        r#"
local function remove_active(key, job_id)
  for _, payload in ipairs(redis.call('LRANGE', key, 0, -1)) do
    local ok, job = pcall(cjson.decode, payload)
    if ok and type(job) == 'table' and job.id == job_id then
      return redis.call('LREM', key, 1, payload)
    end
  end
  return 0
end
"#
    };
}

/// KEYS: active. ARGV: job id.
const ACK_SCRIPT: &str = concat!(remove_active_lua!(), "return remove_active(KEYS[1], ARGV[1])\n");

/// KEYS: active, delayed. ARGV: job id, payload, ready-at millis.
const RETRY_SCRIPT: &str = concat!(
    remove_active_lua!(),
    r#"
local removed = remove_active(KEYS[1], ARGV[1])
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[2])
return removed
"#
);

/// KEYS: active, dead. ARGV: job id, dead-letter record.
const DEAD_LETTER_SCRIPT: &str = concat!(
    remove_active_lua!(),
    r#"
local removed = remove_active(KEYS[1], ARGV[1])
redis.call('RPUSH', KEYS[2], ARGV[2])
return removed
"#
);

/// KEYS: delayed, wait. ARGV: now millis. Returns the number promoted.
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
for _, payload in ipairs(due) do
  redis.call('ZREM', KEYS[1], payload)
  redis.call('LPUSH', KEYS[2], payload)
end
return #due
"#;

#[derive(Clone)]
pub struct RedisJobQueue {
    conn_manager: ConnectionManager,
    queue_name: String,
    redis_url: String,
}

impl fmt::Debug for RedisJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisJobQueue")
            .field("redis_url", &self.redis_url)
            .field("queue_name", &self.queue_name)
            .field("conn_manager", &"<ConnectionManager instance>")
            .finish()
    }
}

impl RedisJobQueue {
    pub async fn new(redis_url: &str, queue_name: &str) -> Result<Self> {
        info!("Initializing Redis job queue '{}' at {}", queue_name, redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            OrderError::Queue(format!("Failed to create Redis ConnectionManager: {}", e))
        })?;
        Ok(Self {
            conn_manager,
            queue_name: queue_name.to_string(),
            redis_url: redis_url.to_string(),
        })
    }

    fn key(&self, suffix: &str) -> String {
        queue_key(&self.queue_name, suffix)
    }

    /// Moves jobs left in flight by a previous process back onto the wait list.
    pub async fn requeue_stalled(&self) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        let (active, wait) = (self.key("active"), self.key("wait"));
        let mut moved = 0;
        loop {
            let job: Option<String> = conn.rpoplpush(&active, &wait).await?;
            if job.is_none() {
                break;
            }
            moved += 1;
        }
        if moved > 0 {
            warn!("Requeued {} stalled job(s) on '{}'", moved, self.queue_name);
        }
        Ok(moved)
    }

    /// Promotes delayed jobs whose backoff has elapsed.
    async fn promote_due(&self, conn: &mut ConnectionManager) -> Result<()> {
        let promoted: i64 = Script::new(PROMOTE_SCRIPT)
            .key(self.key("delayed"))
            .key(self.key("wait"))
            .arg(Utc::now().timestamp_millis())
            .invoke_async(conn)
            .await?;
        if promoted > 0 {
            debug!("Promoted {} delayed job(s) on '{}'", promoted, self.queue_name);
        }
        Ok(())
    }

    fn log_missing(&self, job: &Job, removed: i64) {
        if removed == 0 {
            debug!("Job {} was not in flight on '{}'", job.id, self.queue_name);
        }
    }
}

fn queue_key(queue_name: &str, suffix: &str) -> String {
    format!("{}:{}", queue_name, suffix)
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn.lpush(self.key("wait"), payload).await?;
        debug!("Enqueued job {} for order {}", job.id, job.order_id);
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<Job>> {
        let mut conn = self.conn_manager.clone();
        self.promote_due(&mut conn).await?;
        let payload: Option<String> = conn.rpoplpush(self.key("wait"), self.key("active")).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn ack(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let removed: i64 = Script::new(ACK_SCRIPT)
            .key(self.key("active"))
            .arg(&job.id)
            .invoke_async(&mut conn)
            .await?;
        self.log_missing(job, removed);
        Ok(())
    }

    async fn schedule_retry(&self, job: Job, delay: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let ready_at = Utc::now().timestamp_millis().saturating_add(delay_ms);
        let payload = serde_json::to_string(&job)?;
        let removed: i64 = Script::new(RETRY_SCRIPT)
            .key(self.key("active"))
            .key(self.key("delayed"))
            .arg(&job.id)
            .arg(payload)
            .arg(ready_at)
            .invoke_async(&mut conn)
            .await?;
        self.log_missing(&job, removed);
        debug!("Job {} delayed {:?} (attempts made: {})", job.id, delay, job.attempts_made);
        Ok(())
    }

    async fn dead_letter(&self, job: Job, reason: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let job_id = job.id.clone();
        let record = DeadLetter {
            job,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        };
        let removed: i64 = Script::new(DEAD_LETTER_SCRIPT)
            .key(self.key("active"))
            .key(self.key("dead"))
            .arg(&job_id)
            .arg(serde_json::to_string(&record)?)
            .invoke_async(&mut conn)
            .await?;
        self.log_missing(&record.job, removed);
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut conn = self.conn_manager.clone();
        let records: Vec<String> = conn.lrange(self.key("dead"), 0, -1).await?;
        records
            .iter()
            .map(|r| serde_json::from_str(r).map_err(OrderError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::order::{Order, SwapRequest};

    #[test]
    fn test_queue_keys_are_namespaced() {
        assert_eq!(queue_key("orderQueue", "wait"), "orderQueue:wait");
        assert_eq!(queue_key("orderQueue", "delayed"), "orderQueue:delayed");
    }

    #[test]
    fn test_moves_remove_and_insert_in_one_script() {
        for (script, insert) in [(RETRY_SCRIPT, "'ZADD'"), (DEAD_LETTER_SCRIPT, "'RPUSH'")] {
            assert!(script.contains("local function remove_active"));
            assert!(script.contains(insert));
        }
        assert!(PROMOTE_SCRIPT.contains("'ZREM'") && PROMOTE_SCRIPT.contains("'LPUSH'"));
    }

    async fn active_len(queue: &RedisJobQueue) -> usize {
        let mut conn = queue.conn_manager.clone();
        conn.llen(queue.key("active")).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Needs a running Redis at REDIS_URL.
    async fn test_job_lifecycle_against_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let name = format!("orderQueueTest-{}", uuid::Uuid::new_v4());
        let queue = RedisJobQueue::new(&url, &name).await.unwrap();

        let job = Job::for_order(&Order::new(&SwapRequest::new("SOL", "USDC", 1.0)));
        queue.enqueue(job.clone()).await.unwrap();

        let mut reserved = queue.reserve().await.unwrap().unwrap();
        assert_eq!(reserved.id, job.id);
        assert_eq!(active_len(&queue).await, 1);

        reserved.attempts_made = 1;
        queue.schedule_retry(reserved, Duration::ZERO).await.unwrap();
        assert_eq!(active_len(&queue).await, 0);

        let mut reserved = queue.reserve().await.unwrap().unwrap();
        assert_eq!(reserved.attempts_made, 1);
        reserved.attempts_made = 2;
        queue.dead_letter(reserved, "Quoting Error: timeout").await.unwrap();
        assert_eq!(active_len(&queue).await, 0);
        assert!(queue.reserve().await.unwrap().is_none());

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.id, job.id);

        let mut conn = queue.conn_manager.clone();
        let _: i64 = conn
            .del(vec![queue.key("wait"), queue.key("active"), queue.key("delayed"), queue.key("dead")])
            .await
            .unwrap();
    }
}

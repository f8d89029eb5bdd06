// src/error/mod.rs
use log::debug;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    /// Bad submission parameters, rejected before any durable write
    #[error("Validation Error: {0}")]
    Validation(String),

    /// One or more quote sources failed or timed out
    #[error("Quoting Error: {0}")]
    Quoting(String),

    /// Settlement against the selected venue failed or timed out
    #[error("Execution Error: {0}")]
    Execution(String),

    /// Order store unreachable or write rejected
    #[error("Persistence Error: {0}")]
    Persistence(String),

    /// Job queue / broker transport errors
    #[error("Queue Error: {0}")]
    Queue(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),

    #[error("Order Not Found: {0}")]
    OrderNotFound(String),
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::Queue(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<redis::RedisError> for OrderError {
    fn from(err: redis::RedisError) -> Self {
        OrderError::Queue(format!("Redis error: {}", err))
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::Persistence(format!("Postgres error: {}", err))
    }
}

impl OrderError {
    /// Whether the job that produced this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Validation(_) => false,
            OrderError::Quoting(_) => true,
            OrderError::Execution(_) => true,
            OrderError::Persistence(_) => true,
            OrderError::Queue(_) => true,
            OrderError::Config(_) => false,
            OrderError::OrderNotFound(_) => false,
        }
    }

    /// Categorizes error for logging and monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderError::Validation(_) => ErrorCategory::Input,
            OrderError::Quoting(_) => ErrorCategory::Routing,
            OrderError::Execution(_) => ErrorCategory::Settlement,
            OrderError::Persistence(_) | OrderError::Queue(_) => ErrorCategory::Infrastructure,
            OrderError::Config(_) => ErrorCategory::Configuration,
            OrderError::OrderNotFound(_) => ErrorCategory::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Routing,
    Settlement,
    Infrastructure,
    Configuration,
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before the retry that follows `attempt` failed attempts (exponential backoff).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let factor = 2_u128.checked_pow(attempt - 1).unwrap_or(u128::MAX);
        let delay_ms = self
            .base_delay
            .as_millis()
            .saturating_mul(factor)
            .min(self.max_delay.as_millis());
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(u64::MAX));

        debug!("Retry after attempt {}: delay = {:?}", attempt, delay);
        delay
    }

    /// Whether another attempt is allowed after `attempts_made` attempts failed with `error`.
    pub fn should_retry(&self, error: &OrderError, attempts_made: u32) -> bool {
        error.is_retryable() && attempts_made < self.max_attempts
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_saturates_for_large_attempt_counts() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(130), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_eligibility() {
        let policy = RetryPolicy::default();
        let quoting = OrderError::Quoting("Raydium timed out".to_string());
        assert!(policy.should_retry(&quoting, 1));
        assert!(policy.should_retry(&quoting, 2));
        assert!(!policy.should_retry(&quoting, 3));

        let validation = OrderError::Validation("amount must be positive".to_string());
        assert!(!policy.should_retry(&validation, 1));
        assert_eq!(validation.category(), ErrorCategory::Input);
    }
}

// src/orders/order.rs

use crate::error::{OrderError, Result};
use crate::routing::{validate_swap, ExecutionReceipt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order lifecycle. Success path: pending → routing → building → submitted → confirmed.
/// `failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Routing,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Routing => "routing",
            OrderStatus::Building => "building",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Next state on the success path, `None` once terminal.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Routing),
            OrderStatus::Routing => Some(OrderStatus::Building),
            OrderStatus::Building => Some(OrderStatus::Submitted),
            OrderStatus::Submitted => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed | OrderStatus::Failed => None,
        }
    }

    /// Whether `self → to` is a legal single step of one attempt.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == OrderStatus::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "routing" => Ok(OrderStatus::Routing),
            "building" => Ok(OrderStatus::Building),
            "submitted" => Ok(OrderStatus::Submitted),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(OrderError::Persistence(format!("Unknown order status: {}", other))),
        }
    }
}

/// Result of asking the store for a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Illegal from the current state (e.g., re-entering a terminal state); nothing changed.
    Ignored,
}

/// Submission payload for a swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub input_token: String,
    pub output_token: String,
    pub amount: f64,
}

impl SwapRequest {
    pub fn new(input_token: &str, output_token: &str, amount: f64) -> Self {
        Self {
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_swap(&self.input_token, &self.output_token, self.amount)
    }
}

/// Durable order record. Once terminal, either the receipt fields
/// (`executed_price`, `venue`, `tx_hash`) or `failure_reason` is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub input_token: String,
    pub output_token: String,
    pub amount: f64,
    pub status: OrderStatus,
    pub executed_price: Option<f64>,
    pub venue: Option<String>,
    pub tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh `pending` order with a random id.
    pub fn new(request: &SwapRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input_token: request.input_token.clone(),
            output_token: request.output_token.clone(),
            amount: request.amount,
            status: OrderStatus::Pending,
            executed_price: None,
            venue: None,
            tx_hash: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }


    /// Intermediate success-path step. Terminal states go through `confirm` / `fail`.
    pub fn apply(&mut self, to: OrderStatus) -> Transition {
        if to.is_terminal() || !self.status.can_transition_to(to) {
            return Transition::Ignored;
        }
        self.status = to;
        self.updated_at = Utc::now();
        Transition::Applied
    }

    pub fn confirm(&mut self, receipt: &ExecutionReceipt) -> Transition {
        if !self.status.can_transition_to(OrderStatus::Confirmed) {
            return Transition::Ignored;
        }
        self.status = OrderStatus::Confirmed;
        self.executed_price = Some(receipt.executed_price);
        self.venue = Some(receipt.venue.clone());
        self.tx_hash = Some(receipt.tx_reference.clone());
        self.failure_reason = None;
        self.updated_at = Utc::now();
        Transition::Applied
    }

    pub fn fail(&mut self, reason: &str) -> Transition {
        if !self.status.can_transition_to(OrderStatus::Failed) {
            return Transition::Ignored;
        }
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.executed_price = None;
        self.venue = None;
        self.tx_hash = None;
        self.updated_at = Utc::now();
        Transition::Applied
    }

    /// Rewinds a non-confirmed order to `pending` for a new processing attempt.
    /// A confirmed order is left untouched.
    pub fn begin_attempt(&mut self) -> Transition {
        match self.status {
            OrderStatus::Confirmed => Transition::Ignored,
            OrderStatus::Pending => Transition::Applied,
            _ => {
                self.status = OrderStatus::Pending;
                self.failure_reason = None;
                self.updated_at = Utc::now();
                Transition::Applied
            }
        }
    }
}

/// One status transition pushed to a live subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusEvent {
    pub fn new(order_id: &str, status: OrderStatus) -> Self {
        Self {
            order_id: order_id.to_string(),
            status,
            venue: None,
            executed_price: None,
            tx_hash: None,
            error: None,
        }
    }

    pub fn confirmed(order_id: &str, receipt: &ExecutionReceipt) -> Self {
        Self {
            venue: Some(receipt.venue.clone()),
            executed_price: Some(receipt.executed_price),
            tx_hash: Some(receipt.tx_reference.clone()),
            ..Self::new(order_id, OrderStatus::Confirmed)
        }
    }

    pub fn failed(order_id: &str, reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::new(order_id, OrderStatus::Failed)
        }
    }

    /// Snapshot of a stored order, carrying its receipt or failure reason.
    pub fn from_order(order: &Order) -> Self {
        Self {
            venue: order.venue.clone(),
            executed_price: order.executed_price,
            tx_hash: order.tx_hash.clone(),
            error: order.failure_reason.clone(),
            ..Self::new(&order.id, order.status)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

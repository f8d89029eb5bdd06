// src/websocket/registry.rs
//! Order id -> live subscriber map. At most one subscriber per order; a new
//! attach replaces (and thereby closes) the previous one.

use crate::orders::order::StatusEvent;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Events buffered per subscriber. One attempt emits at most five.
pub const SUBSCRIBER_BUFFER: usize = 32;

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nobody is listening for this order; the event is dropped.
    NoSubscriber,
    /// The subscriber was gone or stalled and has been detached.
    Dropped,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<StatusEvent>,
}

#[derive(Debug, Default)]
pub struct StatusChannelRegistry {
    subscribers: DashMap<String, Subscriber>,
    next_id: AtomicU64,
}

impl StatusChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for `order_id`, replacing any existing one.
    pub fn attach(&self, order_id: &str) -> (SubscriberId, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = self.subscribers.insert(order_id.to_string(), Subscriber { id, tx }) {
            debug!("Replaced subscriber {} for order {}", previous.id, order_id);
        }
        debug!("Subscriber {} attached to order {}", id, order_id);
        (id, rx)
    }

    /// Pushes an event to the order's subscriber. A terminal event detaches
    /// the subscriber after delivery, which closes its stream. Only the
    /// subscriber that was addressed is detached; one attached in the meantime
    /// stays registered.
    pub fn emit(&self, order_id: &str, event: StatusEvent) -> Delivery {
        let terminal = event.is_terminal();
        let (delivery, addressed) = match self.subscribers.get(order_id) {
            None => (Delivery::NoSubscriber, None),
            Some(subscriber) => {
                let delivery = match subscriber.tx.try_send(event) {
                    Ok(()) => Delivery::Delivered,
                    Err(TrySendError::Closed(_)) => {
                        debug!("Subscriber for order {} disconnected", order_id);
                        Delivery::Dropped
                    }
                    Err(TrySendError::Full(_)) => {
                        warn!("Subscriber for order {} is not draining events, detaching", order_id);
                        Delivery::Dropped
                    }
                };
                (delivery, Some(subscriber.id))
            }
        };

        if let Some(subscriber_id) = addressed {
            if terminal || delivery == Delivery::Dropped {
                self.detach_subscriber(order_id, subscriber_id);
            }
        }
        delivery
    }

    pub fn detach(&self, order_id: &str) -> bool {
        self.subscribers.remove(order_id).is_some()
    }

    /// Detaches only if `subscriber_id` is still the registered subscriber.
    pub fn detach_subscriber(&self, order_id: &str, subscriber_id: SubscriberId) -> bool {
        self.subscribers
            .remove_if(order_id, |_, subscriber| subscriber.id == subscriber_id)
            .is_some()
    }

    pub fn is_attached(&self, order_id: &str) -> bool {
        self.subscribers.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

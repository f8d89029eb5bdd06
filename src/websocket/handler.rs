// src/websocket/handler.rs
//! `GET /api/orders/updates/:id` upgrade handler.
//!
//! Sends a `connected` acknowledgment, then forwards the order's status
//! events until a terminal one, after which the server closes the socket.
//! An order that is already terminal when the client connects gets its stored
//! outcome as the single event; an unknown order gets an error and a close.

use crate::api::AppState;
use crate::orders::{OrderStore, StatusEvent};
use crate::websocket::StatusChannelRegistry;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::json;
use std::sync::Arc;

pub async fn order_updates(
    ws: WebSocketUpgrade,
    Path(order_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = state.registry.clone();
    let store = state.store.clone();
    ws.on_upgrade(move |socket| stream_order_updates(socket, order_id, registry, store))
}

pub async fn stream_order_updates(
    socket: WebSocket,
    order_id: String,
    registry: Arc<StatusChannelRegistry>,
    store: Arc<dyn OrderStore>,
) {
    // Attach before reading the store so a transition in between is not lost.
    let (subscriber_id, mut events) = registry.attach(&order_id);
    let (mut sender, mut receiver) = socket.split();
    info!("🔌 Subscriber {} connected for order {}", subscriber_id, order_id);

    let ack = json!({ "orderId": order_id, "status": "connected" });
    if sender.send(Message::Text(ack.to_string())).await.is_err() {
        registry.detach_subscriber(&order_id, subscriber_id);
        return;
    }

    match store.get(&order_id).await {
        Ok(Some(order)) if order.status.is_terminal() => {
            debug!("Order {} already {}, replaying stored outcome", order_id, order.status);
            registry.detach_subscriber(&order_id, subscriber_id);
            if let Ok(payload) = serde_json::to_string(&StatusEvent::from_order(&order)) {
                let _ = sender.send(Message::Text(payload)).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Subscriber {} asked for unknown order {}", subscriber_id, order_id);
            registry.detach_subscriber(&order_id, subscriber_id);
            let body = json!({ "orderId": order_id, "error": format!("Order {} not found", order_id) });
            let _ = sender.send(Message::Text(body.to_string())).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        Err(e) => warn!("Could not read order {} for subscriber {}: {}", order_id, subscriber_id, e),
    }

    let mut client_gone = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let terminal = event.is_terminal();
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!("Failed to serialize status event for {}: {}", order_id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        client_gone = true;
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                // Replaced by a newer subscriber or detached.
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    client_gone = true;
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    registry.detach_subscriber(&order_id, subscriber_id);
    if !client_gone {
        let _ = sender.send(Message::Close(None)).await;
    }
    debug!("Subscriber {} for order {} closed", subscriber_id, order_id);
}

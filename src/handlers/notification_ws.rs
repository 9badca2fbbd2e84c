//! WebSocket handler for real-time alert notification streaming
//!
//! Provides `/api/notifications/ws` for clients to subscribe to their own
//! alert events. A client subscribes with its user id and receives a
//! confirmation, the initial batch of pending notifications, then live
//! events filtered to that user.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::models::notification::{AlertEvent, NotificationResponse, NotificationStatus};
use crate::AppState;

/// Initial batch size for pending notifications on subscribe
const INITIAL_BATCH_LIMIT: u64 = 50;

/// Fan-out channel for alert events. Every connection subscribes and filters
/// by owner; the dispatcher broadcasts without knowing who is connected.
#[derive(Clone)]
pub struct AlertBroadcaster {
    tx: broadcast::Sender<AlertEvent>,
}

impl AlertBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self { tx }
    }

    /// Broadcast an event to all subscribers. Returns false when nobody is
    /// listening (the durable record still covers those owners).
    pub fn broadcast(&self, event: AlertEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }
}

impl Default for AlertBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket subscription request from client
#[derive(Debug, Clone, Deserialize)]
pub struct WsSubscribeRequest {
    /// Action type (subscribe, unsubscribe, ping)
    pub action: String,
    /// User id whose notifications to stream (required for subscribe)
    pub user_id: Option<String>,
}

/// WebSocket message to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Subscription confirmed
    #[serde(rename = "subscribed")]
    Subscribed { user_id: String },
    /// A fired alert
    #[serde(rename = "alert")]
    Alert(AlertEvent),
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
    /// Pong response
    #[serde(rename = "pong")]
    Pong,
    /// Initial state with pending notifications
    #[serde(rename = "initial")]
    Initial {
        notifications: Vec<NotificationResponse>,
    },
}

/// GET /api/notifications/ws - WebSocket endpoint for alert streaming
pub async fn notifications_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    info!("New notifications WebSocket connection");

    let user_id = match wait_for_subscription(&mut receiver).await {
        Ok(user_id) => user_id,
        Err(e) => {
            let _ = sender
                .send(Message::Text(
                    serde_json::to_string(&WsMessage::Error {
                        message: e.to_string(),
                    })
                    .unwrap_or_default()
                    .into(),
                ))
                .await;
            return;
        }
    };

    info!(user_id = %user_id, "Notification subscription established");

    let _ = sender
        .send(Message::Text(
            serde_json::to_string(&WsMessage::Subscribed {
                user_id: user_id.clone(),
            })
            .unwrap_or_default()
            .into(),
        ))
        .await;

    // Anything that fired while the client was away
    match state
        .notifications
        .list_for_owner(
            &user_id,
            Some(NotificationStatus::Pending),
            INITIAL_BATCH_LIMIT,
            0,
        )
        .await
    {
        Ok((pending, _)) => {
            let notifications: Vec<NotificationResponse> =
                pending.into_iter().map(Into::into).collect();
            let _ = sender
                .send(Message::Text(
                    serde_json::to_string(&WsMessage::Initial { notifications })
                        .unwrap_or_default()
                        .into(),
                ))
                .await;
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to load initial pending batch");
        }
    }

    let mut broadcast_rx = state.alert_broadcaster.subscribe();

    let mut heartbeat = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(event) => {
                        // Only forward events addressed to this user
                        if event.owner_id == user_id {
                            let msg = WsMessage::Alert(event);
                            if let Err(e) = sender.send(Message::Text(
                                serde_json::to_string(&msg).unwrap_or_default().into()
                            )).await {
                                debug!("WebSocket send error: {}", e);
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Missed {} broadcast events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcast channel closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sender.send(Message::Ping(axum::body::Bytes::new())).await {
                    debug!("Heartbeat failed: {}", e);
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(req) = serde_json::from_str::<WsSubscribeRequest>(&text) {
                            match req.action.as_str() {
                                "ping" => {
                                    let _ = sender.send(Message::Text(
                                        serde_json::to_string(&WsMessage::Pong)
                                            .unwrap_or_default()
                                            .into()
                                    )).await;
                                }
                                "unsubscribe" => {
                                    info!("Client unsubscribed");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket receive error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(user_id = %user_id, "Notifications WebSocket connection closed");
}

async fn wait_for_subscription(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    // Wait up to 30 seconds for the subscription request
    let timeout = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let req: WsSubscribeRequest = serde_json::from_str(&text)?;

                    if req.action != "subscribe" {
                        return Err("First message must be subscribe action".into());
                    }

                    let user_id = req.user_id.ok_or("user_id is required for subscription")?;
                    if user_id.trim().is_empty() {
                        return Err("user_id must not be empty".into());
                    }

                    return Ok(user_id);
                }
                Ok(Message::Ping(_)) => {
                    continue;
                }
                Ok(Message::Close(_)) => {
                    return Err("Connection closed before subscription".into());
                }
                Err(e) => {
                    return Err(format!("WebSocket error: {}", e).into());
                }
                _ => continue,
            }
        }
        Err("Connection ended before subscription".into())
    });

    timeout.await.map_err(|_| "Subscription timeout")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(owner: &str) -> AlertEvent {
        AlertEvent {
            alert_id: 1,
            owner_id: owner.to_string(),
            notification_id: 10,
            crop_type: "Maize".to_string(),
            location: "Kampala".to_string(),
            threshold: dec!(10),
            current_price: dec!(1150),
            timestamp: 0,
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_reports_false() {
        let broadcaster = AlertBroadcaster::new();
        assert!(!broadcaster.broadcast(event("farmer-1")));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = AlertBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        assert!(broadcaster.broadcast(event("farmer-1")));

        let received = rx.recv().await.expect("event should be delivered");
        assert_eq!(received.owner_id, "farmer-1");
        assert_eq!(received.crop_type, "Maize");
    }
}

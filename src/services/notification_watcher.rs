//! Client Notification Surface
//!
//! Session-scoped subscriber used by client frontends (CLI/TUI or a gateway
//! session). Holds local notification state, exposes start/stop monitoring
//! controls and a manual check, and keeps a small on-disk cache so recent
//! notifications survive restarts. The server's durable records stay
//! authoritative; this cache is a convenience only.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::notification::{AlertEvent, NotificationResponse};

/// Local cache keeps at most this many recent notifications
const MAX_STORED: usize = 50;

/// Reconnect delay after a dropped WebSocket
const RECONNECT_DELAY_SECS: u64 = 5;

#[derive(Clone)]
pub struct WatcherConfig {
    /// Base URL of the backend, e.g. "http://localhost:3000"
    pub server_url: String,
    /// WebSocket URL, e.g. "ws://localhost:3000/api/notifications/ws"
    pub ws_url: String,
    /// Authenticated user; None refuses to start monitoring
    pub user_id: Option<String>,
    /// Fallback poll interval when the push channel is down
    pub poll_interval_secs: u64,
    /// Per-profile JSON cache file; None keeps the cache in memory only
    pub cache_path: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            ws_url: "ws://localhost:3000/api/notifications/ws".to_string(),
            user_id: None,
            poll_interval_secs: 300,
            cache_path: None,
        }
    }
}

/// Connection lifecycle of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A notification as held in the local cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNotification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub crop_type: String,
    pub location: String,
    pub read: bool,
    /// Milliseconds since the epoch, local receipt time
    pub received_at: i64,
}

/// Transient notices surfaced to the UI layer
#[derive(Debug, Clone)]
pub enum WatcherNotice {
    /// A new alert arrived over the push channel
    Alert(StoredNotification),
    /// Something went wrong; dismissible, never fatal
    Error(String),
}

/// Messages from the server's notification WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerMessage {
    #[serde(rename = "subscribed")]
    Subscribed { user_id: String },
    #[serde(rename = "alert")]
    Alert(AlertEvent),
    #[serde(rename = "initial")]
    Initial {
        notifications: Vec<NotificationResponse>,
    },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "pong")]
    Pong,
}

struct WatcherState {
    connection: ConnectionState,
    monitoring: bool,
    notifications: VecDeque<StoredNotification>,
    last_update_ms: i64,
}

#[derive(Clone)]
pub struct NotificationWatcher {
    config: WatcherConfig,
    session_id: Uuid,
    http: reqwest::Client,
    state: Arc<RwLock<WatcherState>>,
    notices: broadcast::Sender<WatcherNotice>,
    shutdown: Arc<RwLock<Option<watch::Sender<bool>>>>,
}

impl NotificationWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        let notifications = config
            .cache_path
            .as_deref()
            .map(load_cache)
            .unwrap_or_default();

        let (notices, _) = broadcast::channel(64);

        Self {
            config,
            session_id: Uuid::new_v4(),
            http: reqwest::Client::new(),
            state: Arc::new(RwLock::new(WatcherState {
                connection: ConnectionState::Disconnected,
                monitoring: false,
                notifications,
                last_update_ms: 0,
            })),
            notices,
            shutdown: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe to transient UI notices (new alerts, recoverable errors)
    pub fn notices(&self) -> broadcast::Receiver<WatcherNotice> {
        self.notices.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.read().connection
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.read().monitoring
    }

    /// Milliseconds-since-epoch of the last state change from a push or poll
    pub fn last_update_ms(&self) -> i64 {
        self.state.read().last_update_ms
    }

    /// Begin the recurring check cycle and the push subscription.
    /// No-op when already running; refuses without an authenticated user.
    pub fn start_monitoring(&self) {
        let Some(user_id) = self.config.user_id.clone() else {
            warn!("Not starting notification monitoring without a user");
            return;
        };

        {
            let mut state = self.state.write();
            if state.monitoring {
                debug!("Notification monitoring already running");
                return;
            }
            state.monitoring = true;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.write() = Some(shutdown_tx);

        info!(session_id = %self.session_id, user_id = %user_id, "Starting notification monitoring");

        // Push subscription with reconnect
        let watcher = self.clone();
        let subscriber_user = user_id.clone();
        let mut subscriber_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                if *subscriber_shutdown.borrow() {
                    break;
                }

                watcher.set_connection(ConnectionState::Connecting);

                tokio::select! {
                    result = watcher.run_subscription(&subscriber_user) => {
                        watcher.set_connection(ConnectionState::Disconnected);
                        if let Err(e) = result {
                            debug!(error = %e, "Push channel dropped, reconnecting");
                        }
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
                            _ = subscriber_shutdown.changed() => break,
                        }
                    }
                    _ = subscriber_shutdown.changed() => {
                        watcher.set_connection(ConnectionState::Disconnected);
                        break;
                    }
                }
            }
        });

        // Poll fallback: reconciles whatever the push channel missed
        let watcher = self.clone();
        let mut poll_shutdown = shutdown_rx;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(watcher.config.poll_interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        watcher.manual_check().await;
                    }
                    _ = poll_shutdown.changed() => break,
                }
            }
        });
    }

    /// Cancel the check cycle and drop the push subscription. Safe to call
    /// when not running; an in-flight check finishes but never reschedules.
    pub fn stop_monitoring(&self) {
        let was_monitoring = {
            let mut state = self.state.write();
            let was = state.monitoring;
            state.monitoring = false;
            was
        };

        if let Some(tx) = self.shutdown.write().take() {
            let _ = tx.send(true);
        }

        if was_monitoring {
            info!(session_id = %self.session_id, "Stopped notification monitoring");
        }
    }

    /// Out-of-band server-authoritative fetch. Errors are logged and
    /// surfaced as a transient notice, never returned.
    pub async fn manual_check(&self) {
        let Some(user_id) = self.config.user_id.clone() else {
            debug!("Manual check skipped without a user");
            return;
        };

        match self.fetch_pending(&user_id).await {
            Ok(notifications) => {
                let fresh = notifications.len();
                for n in notifications {
                    self.remember(stored_from_response(n), false);
                }
                self.touch();
                debug!(count = fresh, "Manual notification check complete");
            }
            Err(e) => {
                warn!(error = %e, "Manual notification check failed");
                let _ = self
                    .notices
                    .send(WatcherNotice::Error(format!("Notification check failed: {}", e)));
            }
        }
    }

    /// The locally cached recent notifications, newest first
    pub fn stored_notifications(&self) -> Vec<StoredNotification> {
        self.state.read().notifications.iter().cloned().collect()
    }

    pub fn clear_stored_notifications(&self) {
        self.state.write().notifications.clear();
        self.persist_cache();
    }

    /// Flip the local read flag. Server-side persistence is the separate
    /// authenticated PUT /api/notifications call.
    pub fn mark_as_read(&self, notification_id: i64) -> bool {
        let changed = {
            let mut state = self.state.write();
            match state
                .notifications
                .iter_mut()
                .find(|n| n.id == notification_id)
            {
                Some(n) => {
                    n.read = true;
                    true
                }
                None => false,
            }
        };

        if changed {
            self.persist_cache();
        }
        changed
    }

    async fn run_subscription(
        &self,
        user_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (ws_stream, _) = connect_async(&self.config.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::json!({ "action": "subscribe", "user_id": user_id });
        write.send(Message::Text(subscribe.to_string().into())).await?;

        info!(session_id = %self.session_id, "Push channel connected");

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::Subscribed { user_id }) => {
                        self.set_connection(ConnectionState::Connected);
                        debug!(user_id = %user_id, "Subscription confirmed");
                        // Reconcile anything missed while disconnected
                        self.manual_check().await;
                    }
                    Ok(ServerMessage::Alert(event)) => {
                        let stored = stored_from_event(&event);
                        self.remember(stored.clone(), true);
                        self.touch();
                        let _ = self.notices.send(WatcherNotice::Alert(stored));
                    }
                    Ok(ServerMessage::Initial { notifications }) => {
                        for n in notifications {
                            self.remember(stored_from_response(n), false);
                        }
                        self.touch();
                    }
                    Ok(ServerMessage::Error { message }) => {
                        warn!(message = %message, "Server reported subscription error");
                    }
                    Ok(ServerMessage::Pong) => {}
                    Err(e) => {
                        debug!(error = %e, "Unparseable push message ignored");
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn fetch_pending(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationResponse>, Box<dyn std::error::Error + Send + Sync>> {
        #[derive(Deserialize)]
        struct ListResponse {
            notifications: Vec<NotificationResponse>,
        }

        let url = format!(
            "{}/api/notifications?status=pending&limit={}",
            self.config.server_url, MAX_STORED
        );

        let response = self
            .http
            .get(&url)
            .header("x-user-id", user_id)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(format!("notification fetch failed: {}", status).into());
        }

        let body: ListResponse = response.json().await?;
        Ok(body.notifications)
    }

    /// Insert or refresh one notification in the bounded cache.
    /// `prepend` puts brand-new push events at the front.
    fn remember(&self, notification: StoredNotification, prepend: bool) {
        {
            let mut state = self.state.write();

            if let Some(existing) = state
                .notifications
                .iter_mut()
                .find(|n| n.id == notification.id)
            {
                // Keep the local read flag; refresh the rest
                let read = existing.read;
                *existing = notification;
                existing.read = read;
            } else if prepend {
                state.notifications.push_front(notification);
            } else {
                state.notifications.push_back(notification);
            }

            while state.notifications.len() > MAX_STORED {
                state.notifications.pop_back();
            }
        }
        self.persist_cache();
    }

    fn touch(&self) {
        self.state.write().last_update_ms = Utc::now().timestamp_millis();
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.state.write().connection = connection;
    }

    fn persist_cache(&self) {
        let Some(path) = self.config.cache_path.as_deref() else {
            return;
        };

        let snapshot: Vec<StoredNotification> = self.state.read().notifications.iter().cloned().collect();
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    debug!(error = %e, "Failed to persist notification cache");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize notification cache");
            }
        }
    }
}

fn load_cache(path: &std::path::Path) -> VecDeque<StoredNotification> {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Vec<StoredNotification>>(&bytes) {
            Ok(list) => list.into_iter().take(MAX_STORED).collect(),
            Err(e) => {
                debug!(error = %e, "Ignoring corrupt notification cache");
                VecDeque::new()
            }
        },
        Err(_) => VecDeque::new(),
    }
}

fn stored_from_event(event: &AlertEvent) -> StoredNotification {
    StoredNotification {
        id: event.notification_id,
        title: format!("{} in {}", event.crop_type, event.location),
        message: format!(
            "{} is now {} in {}",
            event.crop_type, event.current_price, event.location
        ),
        crop_type: event.crop_type.clone(),
        location: event.location.clone(),
        read: false,
        received_at: Utc::now().timestamp_millis(),
    }
}

fn stored_from_response(response: NotificationResponse) -> StoredNotification {
    StoredNotification {
        id: response.id,
        title: response.title,
        message: response.message,
        crop_type: response.crop_type,
        location: response.location,
        read: response.status != "pending",
        received_at: Utc::now().timestamp_millis(),
    }
}

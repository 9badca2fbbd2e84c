// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use handlers::notification_ws::AlertBroadcaster;
use services::store::NotificationStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub notifications: Arc<dyn NotificationStore>,
    pub alert_broadcaster: AlertBroadcaster,
}

pub mod entities {
    pub mod prelude;
    pub mod alert_notifications;
    pub mod market_prices;
    pub mod price_alerts;
}

pub mod services {
    pub mod alert_evaluator;
    pub mod notification_dispatcher;
    pub mod notification_watcher;
    pub mod store;
}

pub mod models;
pub mod handlers;
pub mod jobs;

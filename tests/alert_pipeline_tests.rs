//! End-to-end tests for the alert pipeline and the notifications API,
//! running against in-memory stores so no database is required.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use agrimarket_backend::entities::{alert_notifications, market_prices, price_alerts};
use agrimarket_backend::handlers::{notification, notification_ws::AlertBroadcaster};
use agrimarket_backend::models::notification::{NotificationAction, NotificationStatus};
use agrimarket_backend::services::alert_evaluator::AlertEvaluator;
use agrimarket_backend::services::notification_dispatcher::NotificationDispatcher;
use agrimarket_backend::services::store::{
    AlertRegistry, NewNotification, NotificationStore, ObservationStore, StoreError,
};
use agrimarket_backend::AppState;

/// In-memory stand-in for all three store traits
#[derive(Default)]
struct FakeStore {
    observations: Mutex<Vec<market_prices::Model>>,
    alerts: Mutex<Vec<price_alerts::Model>>,
    notifications: Mutex<Vec<alert_notifications::Model>>,
    next_notification_id: AtomicI64,
}

impl FakeStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_notification_id: AtomicI64::new(1),
            ..Default::default()
        })
    }

    fn add_observation(
        &self,
        id: i64,
        crop: &str,
        location: &str,
        price: Decimal,
        days_ago: i64,
    ) {
        self.observations.lock().push(market_prices::Model {
            id,
            crop_type: crop.to_string(),
            price_per_unit: price,
            unit: "kg".to_string(),
            quality: "standard".to_string(),
            location: location.to_string(),
            source: "market_survey".to_string(),
            status: "approved".to_string(),
            effective_date: (Utc::now() - Duration::days(days_ago)).fixed_offset(),
            submitted_by: None,
            created_at: Some(Utc::now().fixed_offset()),
        });
    }

    fn add_alert(
        &self,
        id: i64,
        owner: &str,
        crop: &str,
        location: &str,
        alert_type: &str,
        frequency: &str,
        threshold: Decimal,
    ) {
        self.alerts.lock().push(price_alerts::Model {
            id,
            owner_id: owner.to_string(),
            crop_type: crop.to_string(),
            location: location.to_string(),
            quality: Some("standard".to_string()),
            alert_type: alert_type.to_string(),
            frequency: frequency.to_string(),
            threshold,
            is_active: true,
            last_triggered_at: None,
            created_at: Some(Utc::now().fixed_offset()),
            updated_at: None,
        });
    }

    fn add_notification(&self, owner: &str) -> i64 {
        let id = self.next_notification_id.fetch_add(1, Ordering::SeqCst);
        self.notifications.lock().push(alert_notifications::Model {
            id,
            alert_id: 999,
            owner_id: owner.to_string(),
            title: format!("Notification {}", id),
            message: "seeded".to_string(),
            alert_type: "price_increase".to_string(),
            crop_type: "Maize".to_string(),
            location: "Kampala".to_string(),
            old_price: dec!(1000),
            new_price: dec!(1150),
            price_change_percent: dec!(15),
            observed_at: Utc::now().fixed_offset(),
            status: "pending".to_string(),
            created_at: Some(Utc::now().fixed_offset()),
            read_at: None,
            dismissed_at: None,
        });
        id
    }

    fn notification_count(&self) -> usize {
        self.notifications.lock().len()
    }
}

#[async_trait]
impl ObservationStore for FakeStore {
    async fn latest_pair(
        &self,
        crop_type: &str,
        location: &str,
        quality: Option<&str>,
    ) -> Result<Vec<market_prices::Model>, StoreError> {
        let mut matching: Vec<market_prices::Model> = self
            .observations
            .lock()
            .iter()
            .filter(|o| {
                o.status == "approved"
                    && o.crop_type.eq_ignore_ascii_case(crop_type)
                    && o.location.eq_ignore_ascii_case(location)
                    && quality.map(|q| o.quality == q.to_lowercase()).unwrap_or(true)
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.effective_date
                .cmp(&a.effective_date)
                .then(b.id.cmp(&a.id))
        });
        matching.truncate(2);
        Ok(matching)
    }
}

#[async_trait]
impl AlertRegistry for FakeStore {
    async fn active_alerts(&self) -> Result<Vec<price_alerts::Model>, StoreError> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }

    async fn claim_trigger(
        &self,
        alert_id: i64,
        expected_last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.lock();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) else {
            return Ok(false);
        };

        let current = alert.last_triggered_at.map(|t| t.with_timezone(&Utc));
        if current != expected_last {
            return Ok(false);
        }

        alert.last_triggered_at = Some(now.fixed_offset());
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for FakeStore {
    async fn insert(
        &self,
        record: NewNotification,
    ) -> Result<alert_notifications::Model, StoreError> {
        let id = self.next_notification_id.fetch_add(1, Ordering::SeqCst);
        let model = alert_notifications::Model {
            id,
            alert_id: record.alert_id,
            owner_id: record.owner_id,
            title: record.title,
            message: record.message,
            alert_type: record.alert_type,
            crop_type: record.crop_type,
            location: record.location,
            old_price: record.old_price,
            new_price: record.new_price,
            price_change_percent: record.price_change_percent,
            observed_at: record.observed_at.fixed_offset(),
            status: "pending".to_string(),
            created_at: Some(Utc::now().fixed_offset()),
            read_at: None,
            dismissed_at: None,
        };
        self.notifications.lock().push(model.clone());
        Ok(model)
    }

    async fn find_by_event(
        &self,
        alert_id: i64,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<alert_notifications::Model>, StoreError> {
        Ok(self
            .notifications
            .lock()
            .iter()
            .find(|n| n.alert_id == alert_id && n.observed_at.with_timezone(&Utc) == observed_at)
            .cloned())
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<NotificationStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<alert_notifications::Model>, u64), StoreError> {
        let mut matching: Vec<alert_notifications::Model> = self
            .notifications
            .lock()
            .iter()
            .filter(|n| {
                n.owner_id == owner_id
                    && status.map(|s| n.status == s.to_string()).unwrap_or(true)
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn apply_action(
        &self,
        owner_id: &str,
        ids: &[i64],
        action: NotificationAction,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut updated = 0;
        for n in self.notifications.lock().iter_mut() {
            if n.owner_id != owner_id || !ids.contains(&n.id) {
                continue;
            }
            match action {
                NotificationAction::MarkRead => {
                    n.status = "read".to_string();
                    n.read_at = Some(now.fixed_offset());
                }
                NotificationAction::Dismiss => {
                    n.status = "dismissed".to_string();
                    n.dismissed_at = Some(now.fixed_offset());
                }
            }
            updated += 1;
        }
        Ok(updated)
    }
}

fn pipeline(store: &Arc<FakeStore>) -> (AlertEvaluator, NotificationDispatcher, AlertBroadcaster) {
    let broadcaster = AlertBroadcaster::new();
    let evaluator = AlertEvaluator::new(store.clone(), store.clone());
    let dispatcher = NotificationDispatcher::new(store.clone(), store.clone(), broadcaster.clone());
    (evaluator, dispatcher, broadcaster)
}

fn test_app(store: &Arc<FakeStore>) -> Router {
    // The notification handlers only go through the store trait, so no
    // live database connection is needed here.
    let state = AppState {
        db: sea_orm::DatabaseConnection::Disconnected,
        notifications: store.clone(),
        alert_broadcaster: AlertBroadcaster::new(),
    };

    Router::new()
        .route(
            "/api/notifications",
            get(notification::get_notifications).put(notification::update_notifications),
        )
        .with_state(state)
}

async fn response_json(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn maize_increase_alert_fires_end_to_end() {
    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Maize", "Kampala", "price_increase", "immediate", dec!(10));

    let (evaluator, dispatcher, broadcaster) = pipeline(&store);
    let mut events = broadcaster.subscribe();

    let now = Utc::now();
    let decisions = evaluator.evaluate_all(now).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].percent_change, dec!(15));

    let record = dispatcher
        .dispatch(&decisions[0], now)
        .await
        .unwrap()
        .expect("should dispatch");

    assert_eq!(record.owner_id, "farmer-1");
    assert_eq!(record.title, "Price Increase - Maize in Kampala");
    assert_eq!(record.price_change_percent, dec!(15));
    assert!(record.message.contains("increased by 15.0% in Kampala"));
    assert_eq!(store.notification_count(), 1);

    // Real-time push reached the channel
    let event = events.recv().await.unwrap();
    assert_eq!(event.owner_id, "farmer-1");
    assert_eq!(event.current_price, dec!(1150));

    // The frequency gate timestamp was claimed
    let alerts = store.alerts.lock();
    assert!(alerts[0].last_triggered_at.is_some());
}

#[tokio::test]
async fn decrease_alert_does_not_fire_on_increase() {
    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Maize", "Kampala", "price_decrease", "immediate", dec!(10));

    let (evaluator, _, _) = pipeline(&store);
    let decisions = evaluator.evaluate_all(Utc::now()).await.unwrap();
    assert!(decisions.is_empty());
}

#[tokio::test]
async fn beans_decrease_respects_threshold() {
    let store = FakeStore::new();
    store.add_observation(1, "Beans", "Mbale", dec!(4200), 1);
    store.add_observation(2, "Beans", "Mbale", dec!(4116), 0);
    // -2% change: 5% threshold stays quiet, 1% fires
    store.add_alert(1, "farmer-1", "Beans", "Mbale", "price_decrease", "immediate", dec!(5));
    store.add_alert(2, "farmer-2", "Beans", "Mbale", "price_decrease", "immediate", dec!(1));

    let (evaluator, _, _) = pipeline(&store);
    let decisions = evaluator.evaluate_all(Utc::now()).await.unwrap();

    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].alert.id, 2);
    assert_eq!(decisions[0].percent_change, dec!(-2));
}

#[tokio::test]
async fn refire_before_frequency_gap_is_suppressed() {
    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Maize", "Kampala", "price_increase", "daily", dec!(10));

    let (evaluator, dispatcher, _) = pipeline(&store);

    let now = Utc::now();
    let decisions = evaluator.evaluate_all(now).await.unwrap();
    assert_eq!(decisions.len(), 1);
    dispatcher.dispatch(&decisions[0], now).await.unwrap();
    assert_eq!(store.notification_count(), 1);

    // Immediately re-running the pass produces nothing: the daily gate is closed
    let decisions = evaluator.evaluate_all(Utc::now()).await.unwrap();
    assert!(decisions.is_empty());
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn immediate_refire_for_same_event_reuses_durable_record() {
    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Maize", "Kampala", "price_increase", "immediate", dec!(10));

    let (evaluator, dispatcher, _) = pipeline(&store);

    let first_pass = Utc::now();
    let decisions = evaluator.evaluate_all(first_pass).await.unwrap();
    let first = dispatcher
        .dispatch(&decisions[0], first_pass)
        .await
        .unwrap()
        .expect("first dispatch");

    // Same observations, immediate frequency: the decision repeats but the
    // (alert, observed_at) key dedupes the durable record
    let second_pass = Utc::now();
    let decisions = evaluator.evaluate_all(second_pass).await.unwrap();
    assert_eq!(decisions.len(), 1);
    let second = dispatcher
        .dispatch(&decisions[0], second_pass)
        .await
        .unwrap()
        .expect("second dispatch");

    assert_eq!(first.id, second.id);
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn stale_claim_skips_dispatch() {
    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Maize", "Kampala", "price_increase", "immediate", dec!(10));

    let (evaluator, dispatcher, _) = pipeline(&store);

    let now = Utc::now();
    let decisions = evaluator.evaluate_all(now).await.unwrap();

    // A concurrent pass dispatches first
    dispatcher.dispatch(&decisions[0], now).await.unwrap();

    // The stale decision (read before the other pass claimed) loses the CAS
    let result = dispatcher.dispatch(&decisions[0], Utc::now()).await.unwrap();
    assert!(result.is_none());
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn mixed_ownership_batch_updates_only_owned_subset() {
    let store = FakeStore::new();
    let own_a = store.add_notification("farmer-1");
    let own_b = store.add_notification("farmer-1");
    let other = store.add_notification("farmer-2");

    let app = test_app(&store);

    let body = json!({ "action": "read", "ids": [own_a, own_b, other] });
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/notifications")
                .header("x-user-id", "farmer-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["updated"], 2);

    // The other user's notification is untouched
    let notifications = store.notifications.lock();
    let untouched = notifications.iter().find(|n| n.id == other).unwrap();
    assert_eq!(untouched.status, "pending");
    assert!(notifications
        .iter()
        .filter(|n| n.owner_id == "farmer-1")
        .all(|n| n.status == "read" && n.read_at.is_some()));
}

#[tokio::test]
async fn notification_listing_is_owner_scoped_and_filterable() {
    let store = FakeStore::new();
    let own = store.add_notification("farmer-1");
    store.add_notification("farmer-2");

    let app = test_app(&store);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/notifications?status=pending")
                .header("x-user-id", "farmer-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["total"], 1);
    let notifications = json["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["id"], own);

    // Unknown status filter is a 400
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/notifications?status=archived")
                .header("x-user-id", "farmer-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_endpoints_require_user_header() {
    let store = FakeStore::new();
    let app = test_app(&store);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/notifications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn evaluation_survives_observation_store_failure() {
    // A store that fails for one crop but serves the other
    struct FlakyStore {
        inner: Arc<FakeStore>,
    }

    #[async_trait]
    impl ObservationStore for FlakyStore {
        async fn latest_pair(
            &self,
            crop_type: &str,
            location: &str,
            quality: Option<&str>,
        ) -> Result<Vec<market_prices::Model>, StoreError> {
            if crop_type == "Beans" {
                return Err("simulated outage".into());
            }
            self.inner.latest_pair(crop_type, location, quality).await
        }
    }

    let store = FakeStore::new();
    store.add_observation(1, "Maize", "Kampala", dec!(1000), 1);
    store.add_observation(2, "Maize", "Kampala", dec!(1150), 0);
    store.add_alert(1, "farmer-1", "Beans", "Mbale", "price_increase", "immediate", dec!(1));
    store.add_alert(2, "farmer-1", "Maize", "Kampala", "price_increase", "immediate", dec!(10));

    let flaky = Arc::new(FlakyStore {
        inner: store.clone(),
    });
    let evaluator = AlertEvaluator::new(store.clone(), flaky);

    // The Beans alert fails to fetch; the Maize alert still evaluates
    let decisions = evaluator.evaluate_all(Utc::now()).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].alert.id, 2);
}

//! Notification Dispatcher
//!
//! Turns a trigger decision into a durable notification record plus a
//! best-effort real-time push. Ordering is claim -> persist -> push: the
//! durable row is the source of truth, the push is an optimization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::entities::alert_notifications;
use crate::handlers::notification_ws::AlertBroadcaster;
use crate::models::alert::{AlertType, TriggerDecision};
use crate::models::notification::AlertEvent;
use crate::services::store::{AlertRegistry, NewNotification, NotificationStore, StoreError};

pub struct NotificationDispatcher {
    registry: Arc<dyn AlertRegistry>,
    notifications: Arc<dyn NotificationStore>,
    broadcaster: AlertBroadcaster,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<dyn AlertRegistry>,
        notifications: Arc<dyn NotificationStore>,
        broadcaster: AlertBroadcaster,
    ) -> Self {
        Self {
            registry,
            notifications,
            broadcaster,
        }
    }

    /// Dispatch one trigger decision.
    ///
    /// Returns Ok(None) when the claim on last_triggered_at is lost, which
    /// means a concurrent pass already dispatched for this gap. Push failure
    /// never fails the dispatch; the durable record is already written.
    pub async fn dispatch(
        &self,
        decision: &TriggerDecision,
        now: DateTime<Utc>,
    ) -> Result<Option<alert_notifications::Model>, StoreError> {
        let alert = &decision.alert;

        let claimed = self
            .registry
            .claim_trigger(alert.id, decision.read_last_triggered_at, now)
            .await?;
        if !claimed {
            debug!(alert_id = alert.id, "Trigger already claimed by another pass");
            return Ok(None);
        }

        // The (alert_id, observed_at) key makes re-fires for the same price
        // event reuse the existing row instead of duplicating it.
        let record = match self
            .notifications
            .find_by_event(alert.id, decision.observed_at)
            .await?
        {
            Some(existing) => {
                debug!(
                    alert_id = alert.id,
                    notification_id = existing.id,
                    "Durable record already exists for this price event"
                );
                existing
            }
            None => {
                let alert_type: AlertType = alert
                    .alert_type
                    .parse()
                    .map_err(|e: String| -> StoreError { e.into() })?;

                self.notifications
                    .insert(NewNotification {
                        alert_id: alert.id,
                        owner_id: alert.owner_id.clone(),
                        title: build_title(alert_type, &alert.crop_type, &alert.location),
                        message: build_message(
                            alert_type,
                            &alert.crop_type,
                            &alert.location,
                            decision,
                        ),
                        alert_type: alert.alert_type.clone(),
                        crop_type: alert.crop_type.clone(),
                        location: alert.location.clone(),
                        old_price: decision.old_price,
                        new_price: decision.new_price,
                        price_change_percent: decision.percent_change.round_dp(2),
                        observed_at: decision.observed_at,
                    })
                    .await?
            }
        };

        info!(
            alert_id = alert.id,
            notification_id = record.id,
            owner_id = %alert.owner_id,
            percent_change = %record.price_change_percent,
            "Alert fired"
        );

        let event = AlertEvent {
            alert_id: alert.id,
            owner_id: alert.owner_id.clone(),
            notification_id: record.id,
            crop_type: alert.crop_type.clone(),
            location: alert.location.clone(),
            threshold: alert.threshold,
            current_price: decision.new_price,
            timestamp: now.timestamp_millis(),
        };
        if !self.broadcaster.broadcast(event) {
            warn!(
                alert_id = alert.id,
                "Real-time push had no subscribers; owner will pick it up on next fetch"
            );
        }

        Ok(Some(record))
    }
}

/// "<AlertType label> - <crop> in <location>"
pub fn build_title(alert_type: AlertType, crop_type: &str, location: &str) -> String {
    format!("{} - {} in {}", alert_type.label(), crop_type, location)
}

/// "<crop> prices have <increased|decreased|changed> by <abs change>% in
/// <location>. Price changed from <old> to <new> per <unit>."
pub fn build_message(
    alert_type: AlertType,
    crop_type: &str,
    location: &str,
    decision: &TriggerDecision,
) -> String {
    let direction = if !alert_type.is_directional() {
        "changed"
    } else if decision.percent_change > rust_decimal::Decimal::ZERO {
        "increased"
    } else {
        "decreased"
    };

    format!(
        "{} prices have {} by {:.1}% in {}. Price changed from {} to {} per {}.",
        crop_type,
        direction,
        decision.percent_change.abs(),
        location,
        decision.old_price.normalize(),
        decision.new_price.normalize(),
        decision.unit,
    )
}

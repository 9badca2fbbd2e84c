//! Alert Evaluation Engine
//!
//! Scans active alerts against the two most recent approved observations for
//! each alert's (crop, location, quality) tuple and decides which alerts
//! fire. Decisions carry everything the dispatcher needs; this service never
//! writes anything itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::entities::{market_prices, price_alerts};
use crate::models::alert::{AlertFrequency, AlertType, TriggerDecision};
use crate::services::store::{AlertRegistry, ObservationStore, StoreError};

/// Upper bound on a single observation fetch
const FETCH_TIMEOUT_SECS: u64 = 5;

/// Many alerts share a (crop, location, quality) tuple; pairs are memoized
/// briefly so one pass hits the store once per tuple.
const PAIR_CACHE_TTL_SECS: u64 = 60;

type PairKey = (String, String, Option<String>);

pub struct AlertEvaluator {
    registry: Arc<dyn AlertRegistry>,
    observations: Arc<dyn ObservationStore>,
    pair_cache: Cache<PairKey, Arc<Vec<market_prices::Model>>>,
}

impl AlertEvaluator {
    pub fn new(registry: Arc<dyn AlertRegistry>, observations: Arc<dyn ObservationStore>) -> Self {
        let pair_cache = Cache::builder()
            .time_to_live(Duration::from_secs(PAIR_CACHE_TTL_SECS))
            .max_capacity(10_000)
            .build();

        Self {
            registry,
            observations,
            pair_cache,
        }
    }

    /// Evaluate every active alert as of `as_of`.
    ///
    /// A store failure for one alert is logged and that alert skipped; the
    /// rest of the pass continues. Only a failure to list the alerts at all
    /// is an error.
    pub async fn evaluate_all(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<TriggerDecision>, StoreError> {
        let alerts = self.registry.active_alerts().await?;
        debug!(count = alerts.len(), "Evaluating active alerts");

        let mut decisions = Vec::new();

        for alert in alerts {
            let pair = match self.fetch_pair(&alert).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(alert_id = alert.id, error = %e, "Observation fetch failed, skipping alert");
                    continue;
                }
            };

            if let Some(decision) = evaluate_alert(&alert, &pair, as_of) {
                decisions.push(decision);
            }
        }

        Ok(decisions)
    }

    /// Fetch the latest observation pair for an alert's tuple, through the
    /// per-pass memoization cache, with a bounded timeout and one retry.
    async fn fetch_pair(
        &self,
        alert: &price_alerts::Model,
    ) -> Result<Arc<Vec<market_prices::Model>>, StoreError> {
        let key: PairKey = (
            alert.crop_type.to_lowercase(),
            alert.location.to_lowercase(),
            alert.quality.as_ref().map(|q| q.to_lowercase()),
        );

        if let Some(cached) = self.pair_cache.get(&key).await {
            return Ok(cached);
        }

        let mut last_err: StoreError = "observation fetch not attempted".into();
        for attempt in 0..2 {
            let fetch = self.observations.latest_pair(
                &alert.crop_type,
                &alert.location,
                alert.quality.as_deref(),
            );

            match tokio::time::timeout(Duration::from_secs(FETCH_TIMEOUT_SECS), fetch).await {
                Ok(Ok(pair)) => {
                    let pair = Arc::new(pair);
                    self.pair_cache.insert(key, pair.clone()).await;
                    return Ok(pair);
                }
                Ok(Err(e)) => {
                    debug!(alert_id = alert.id, attempt = attempt, error = %e, "Observation fetch error");
                    last_err = e;
                }
                Err(_) => {
                    debug!(alert_id = alert.id, attempt = attempt, "Observation fetch timed out");
                    last_err = "observation fetch timed out".into();
                }
            }
        }

        Err(last_err)
    }
}

/// Decide whether one alert fires given its newest-first observation pair.
///
/// Returns None for the normal silent outcomes: unparseable policy fields,
/// fewer than two observations, a zero previous price, a sub-threshold
/// change, a direction mismatch, or a closed frequency gate.
pub fn evaluate_alert(
    alert: &price_alerts::Model,
    pair: &[market_prices::Model],
    as_of: DateTime<Utc>,
) -> Option<TriggerDecision> {
    let alert_type: AlertType = match alert.alert_type.parse() {
        Ok(t) => t,
        Err(e) => {
            warn!(alert_id = alert.id, error = %e, "Skipping alert with bad type");
            return None;
        }
    };
    let frequency: AlertFrequency = match alert.frequency.parse() {
        Ok(f) => f,
        Err(e) => {
            warn!(alert_id = alert.id, error = %e, "Skipping alert with bad frequency");
            return None;
        }
    };

    if pair.len() < 2 {
        debug!(alert_id = alert.id, "Fewer than two observations, skipping");
        return None;
    }
    let latest = &pair[0];
    let previous = &pair[1];

    let percent_change = percent_change(previous.price_per_unit, latest.price_per_unit)?;

    if percent_change.abs() < alert.threshold {
        return None;
    }
    if !alert_type.direction_matches(percent_change) {
        return None;
    }

    let last_triggered = alert.last_triggered_at.map(|t| t.with_timezone(&Utc));
    if !frequency.gate_open(last_triggered, as_of) {
        debug!(alert_id = alert.id, "Frequency gate closed, skipping");
        return None;
    }

    Some(TriggerDecision {
        alert: alert.clone(),
        old_price: previous.price_per_unit,
        new_price: latest.price_per_unit,
        unit: latest.unit.clone(),
        percent_change,
        observed_at: latest.effective_date.with_timezone(&Utc),
        read_last_triggered_at: last_triggered,
    })
}

/// (latest - previous) / previous * 100, or None when the previous price is
/// zero (nothing meaningful to compare against).
pub fn percent_change(previous: Decimal, latest: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        debug!("Previous price is zero, skipping percent change");
        return None;
    }
    (latest - previous)
        .checked_div(previous)
        .map(|ratio| ratio * Decimal::from(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    fn observation(id: i64, price: Decimal, days_ago: i64) -> market_prices::Model {
        let now = Utc::now();
        market_prices::Model {
            id,
            crop_type: "Maize".to_string(),
            price_per_unit: price,
            unit: "kg".to_string(),
            quality: "standard".to_string(),
            location: "Kampala".to_string(),
            source: "market_survey".to_string(),
            status: "approved".to_string(),
            effective_date: (now - ChronoDuration::days(days_ago)).fixed_offset(),
            submitted_by: None,
            created_at: Some(now.fixed_offset()),
        }
    }

    fn alert(alert_type: &str, frequency: &str, threshold: Decimal) -> price_alerts::Model {
        price_alerts::Model {
            id: 1,
            owner_id: "farmer-1".to_string(),
            crop_type: "Maize".to_string(),
            location: "Kampala".to_string(),
            quality: Some("standard".to_string()),
            alert_type: alert_type.to_string(),
            frequency: frequency.to_string(),
            threshold,
            is_active: true,
            last_triggered_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_percent_change_basic() {
        assert_eq!(percent_change(dec!(1000), dec!(1150)), Some(dec!(15)));
        assert_eq!(percent_change(dec!(4200), dec!(4116)), Some(dec!(-2)));
    }

    #[test]
    fn test_percent_change_zero_previous() {
        assert_eq!(percent_change(Decimal::ZERO, dec!(100)), None);
    }

    #[test]
    fn test_increase_alert_fires_on_fifteen_percent() {
        let a = alert("price_increase", "immediate", dec!(10));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, dec!(1000), 1)];

        let decision = evaluate_alert(&a, &pair, Utc::now()).expect("should fire");
        assert_eq!(decision.percent_change, dec!(15));
        assert_eq!(decision.old_price, dec!(1000));
        assert_eq!(decision.new_price, dec!(1150));
        assert_eq!(decision.unit, "kg");
    }

    #[test]
    fn test_decrease_alert_ignores_increase() {
        let a = alert("price_decrease", "immediate", dec!(10));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, dec!(1000), 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let a = alert("price_increase", "immediate", dec!(15));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, dec!(1000), 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_some());
    }

    #[test]
    fn test_below_threshold_does_not_fire() {
        // Beans in Mbale: 4200 -> 4116 is -2%
        let mut a = alert("price_decrease", "immediate", dec!(5));
        a.crop_type = "Beans".to_string();
        a.location = "Mbale".to_string();
        let pair = vec![observation(2, dec!(4116), 0), observation(1, dec!(4200), 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_none());

        a.threshold = dec!(1);
        let decision = evaluate_alert(&a, &pair, Utc::now()).expect("should fire at 1%");
        assert_eq!(decision.percent_change, dec!(-2));
    }

    #[test]
    fn test_volatility_fires_on_decrease() {
        let a = alert("price_volatility", "immediate", dec!(1));
        let pair = vec![observation(2, dec!(4116), 0), observation(1, dec!(4200), 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_some());
    }

    #[test]
    fn test_single_observation_produces_no_decision() {
        let a = alert("price_increase", "immediate", dec!(1));
        let pair = vec![observation(1, dec!(1000), 0)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_none());
    }

    #[test]
    fn test_zero_previous_price_produces_no_decision() {
        let a = alert("price_volatility", "immediate", dec!(1));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, Decimal::ZERO, 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_none());
    }

    #[test]
    fn test_daily_gate_blocks_within_24h() {
        let now = Utc::now();
        let mut a = alert("price_increase", "daily", dec!(10));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, dec!(1000), 1)];

        a.last_triggered_at = Some((now - ChronoDuration::hours(23)).fixed_offset());
        assert!(evaluate_alert(&a, &pair, now).is_none());

        a.last_triggered_at = Some((now - ChronoDuration::hours(25)).fixed_offset());
        assert!(evaluate_alert(&a, &pair, now).is_some());
    }

    #[test]
    fn test_unknown_alert_type_is_skipped() {
        let a = alert("price_teleport", "immediate", dec!(1));
        let pair = vec![observation(2, dec!(1150), 0), observation(1, dec!(1000), 1)];
        assert!(evaluate_alert(&a, &pair, Utc::now()).is_none());
    }
}

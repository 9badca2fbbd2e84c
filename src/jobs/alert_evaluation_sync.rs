//! Alert Evaluation Sync Job
//!
//! Periodically runs the alert evaluator over active subscriptions and hands
//! fired decisions to the dispatcher. Runs server-side, independent of any
//! connected client. Supports graceful shutdown via SIGINT.

use std::env;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::services::alert_evaluator::AlertEvaluator;
use crate::services::notification_dispatcher::NotificationDispatcher;

/// Default evaluation interval in seconds (5 minutes)
const DEFAULT_EVALUATION_INTERVAL_SECS: u64 = 300;

/// Environment variable for the evaluation interval
const ENV_EVALUATION_INTERVAL: &str = "ALERT_EVALUATION_INTERVAL_SECS";

/// Environment variable for dry run mode
const ENV_DRY_RUN: &str = "ALERT_EVALUATION_DRY_RUN";

/// Start the alert evaluation job
///
/// Spawns a background task that:
/// 1. Scans active alerts at the configured interval (default: 5 minutes)
/// 2. Dispatches durable notifications and real-time pushes for fired alerts
///
/// # Environment Variables
///
/// * `ALERT_EVALUATION_INTERVAL_SECS` - Interval in seconds (default: 300)
/// * `ALERT_EVALUATION_DRY_RUN` - Set to "true" to evaluate without dispatching
pub async fn start_alert_evaluation_job(
    evaluator: Arc<AlertEvaluator>,
    dispatcher: Arc<NotificationDispatcher>,
) {
    tokio::spawn(async move {
        let interval_secs: u64 = env::var(ENV_EVALUATION_INTERVAL)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EVALUATION_INTERVAL_SECS);

        let dry_run = env::var(ENV_DRY_RUN)
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        info!(
            interval_secs = interval_secs,
            dry_run = dry_run,
            "Alert evaluation job started"
        );

        let mut interval = interval(TokioDuration::from_secs(interval_secs));
        // A slow pass delays the next tick instead of stacking runs
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping alert evaluation job gracefully");
                    break;
                }
                _ = interval.tick() => {
                    match run_tick(&evaluator, &dispatcher, dry_run).await {
                        Ok((fired, dispatched)) => {
                            if fired > 0 {
                                info!(fired = fired, dispatched = dispatched, "Alert evaluation pass complete");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Alert evaluation pass failed");
                            // Continue - next interval will retry
                        }
                    }
                }
            }
        }

        info!("Alert evaluation job stopped");
    });
}

/// One evaluation pass. Returns (decisions fired, notifications dispatched).
async fn run_tick(
    evaluator: &AlertEvaluator,
    dispatcher: &NotificationDispatcher,
    dry_run: bool,
) -> Result<(usize, usize), Box<dyn std::error::Error + Send + Sync>> {
    let now = Utc::now();
    let decisions = evaluator.evaluate_all(now).await?;

    if dry_run {
        if !decisions.is_empty() {
            info!(fired = decisions.len(), "DRY RUN: skipping dispatch");
        }
        return Ok((decisions.len(), 0));
    }

    let fired = decisions.len();
    let mut dispatched = 0;

    // A failed dispatch for one alert must not starve the rest
    for decision in &decisions {
        match dispatcher.dispatch(decision, now).await {
            Ok(Some(_)) => dispatched += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(alert_id = decision.alert.id, error = %e, "Dispatch failed");
            }
        }
    }

    Ok((fired, dispatched))
}

//! Price alert subscription handlers
//!
//! Owner-scoped CRUD for /api/price-alerts. Creation enforces one
//! subscription per (owner, crop, location, quality, type).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::entities::{prelude::*, price_alerts};
use crate::handlers::{require_user, ErrorResponse};
use crate::models::alert::{AlertResponse, CreateAlertRequest, UpdateAlertRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub alerts: Vec<AlertResponse>,
}

/// GET /api/price-alerts - the caller's subscriptions, newest first
pub async fn get_price_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AlertListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    let alerts = PriceAlerts::find()
        .filter(price_alerts::Column::OwnerId.eq(&user_id))
        .order_by_desc(price_alerts::Column::CreatedAt)
        .order_by_desc(price_alerts::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to query price alerts");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    Ok(Json(AlertListResponse {
        alerts: alerts.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/price-alerts - create a subscription
pub async fn create_price_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<AlertResponse>), (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    if let Err(e) = request.validate() {
        warn!(error = %e, "Invalid alert creation request");
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
    }

    let crop_type = request.crop_type.trim().to_string();
    let location = request.location.trim().to_string();
    let quality = request.quality.as_ref().map(|q| q.to_lowercase());

    // The unique index does not catch duplicate NULL-quality rows, so the
    // duplicate check happens here for every shape of subscription.
    let mut duplicate_check = PriceAlerts::find()
        .filter(price_alerts::Column::OwnerId.eq(&user_id))
        .filter(price_alerts::Column::CropType.eq(&crop_type))
        .filter(price_alerts::Column::Location.eq(&location))
        .filter(price_alerts::Column::AlertType.eq(request.alert_type.to_lowercase()));

    duplicate_check = match quality {
        Some(ref quality) => duplicate_check.filter(price_alerts::Column::Quality.eq(quality)),
        None => duplicate_check.filter(price_alerts::Column::Quality.is_null()),
    };

    let existing = duplicate_check.one(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed duplicate alert check");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "an identical alert already exists".to_string(),
            }),
        ));
    }

    let active = price_alerts::ActiveModel {
        owner_id: Set(user_id.clone()),
        crop_type: Set(crop_type),
        location: Set(location),
        quality: Set(quality),
        alert_type: Set(request.alert_type.to_lowercase()),
        frequency: Set(request.frequency.to_lowercase()),
        threshold: Set(request.threshold),
        is_active: Set(true),
        last_triggered_at: Set(None),
        ..Default::default()
    };

    let model = active.insert(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to insert price alert");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    info!(
        id = model.id,
        owner_id = %user_id,
        crop_type = %model.crop_type,
        alert_type = %model.alert_type,
        "Price alert created"
    );

    Ok((StatusCode::CREATED, Json(model.into())))
}

/// PUT /api/price-alerts/{id} - toggle active state or edit the policy
pub async fn update_price_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAlertRequest>,
) -> Result<Json<AlertResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    if let Err(e) = request.validate() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
    }

    let alert = find_owned_alert(&state, id, &user_id).await?;

    let mut active: price_alerts::ActiveModel = alert.into();
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(threshold) = request.threshold {
        active.threshold = Set(threshold);
    }
    if let Some(frequency) = request.frequency {
        active.frequency = Set(frequency.to_lowercase());
    }
    active.updated_at = Set(Some(Utc::now().into()));

    let model = active.update(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to update price alert");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    info!(id = model.id, owner_id = %user_id, "Price alert updated");

    Ok(Json(model.into()))
}

/// DELETE /api/price-alerts/{id}
pub async fn delete_price_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    let alert = find_owned_alert(&state, id, &user_id).await?;

    alert.delete(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to delete price alert");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    info!(id = id, owner_id = %user_id, "Price alert deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Loads an alert and verifies ownership; a non-owned id reads as not found
/// so alert existence never leaks across users.
async fn find_owned_alert(
    state: &AppState,
    id: i64,
    user_id: &str,
) -> Result<price_alerts::Model, (StatusCode, Json<ErrorResponse>)> {
    let found = PriceAlerts::find()
        .filter(price_alerts::Column::Id.eq(id))
        .filter(price_alerts::Column::OwnerId.eq(user_id))
        .one(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load price alert");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    found.ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "alert not found".to_string(),
        }),
    ))
}

//! Durable notification handlers
//!
//! GET /api/notifications and the batch read/dismiss PUT. Both go through
//! the NotificationStore seam so the ownership filtering is the same one
//! the pipeline tests exercise.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::handlers::{require_user, ErrorResponse};
use crate::models::notification::{
    NotificationAction, NotificationQuery, NotificationResponse, NotificationStatus,
    UpdateNotificationsRequest, UpdateNotificationsResponse,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub total: u64,
    pub limit: i32,
    pub offset: i32,
}

/// Get the caller's notifications
///
/// GET /api/notifications
///
/// # Query Parameters
///
/// - `status` - 'pending', 'read' or 'dismissed'
/// - `limit` - Maximum number of results (default: 20, max: 100)
/// - `offset` - Offset for pagination (default: 0)
pub async fn get_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    if let Err(e) = query.validate() {
        warn!(error = %e, "Invalid notification query");
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
    }

    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<NotificationStatus>())
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })))?;

    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    let (items, total) = state
        .notifications
        .list_for_owner(&user_id, status, limit as u64, offset as u64)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list notifications");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    Ok(Json(NotificationListResponse {
        notifications: items.into_iter().map(Into::into).collect(),
        total,
        limit,
        offset,
    }))
}

/// Mark a batch of the caller's notifications read or dismissed
///
/// PUT /api/notifications
///
/// Ids not owned by the caller are silently dropped from the batch; the
/// returned count covers only the owned subset.
pub async fn update_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateNotificationsRequest>,
) -> Result<Json<UpdateNotificationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    let action: NotificationAction = request
        .action
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })))?;

    if request.ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "ids must not be empty".to_string(),
            }),
        ));
    }

    let updated = state
        .notifications
        .apply_action(&user_id, &request.ids, action, Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to update notifications");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    info!(
        owner_id = %user_id,
        requested = request.ids.len(),
        updated = updated,
        action = %request.action,
        "Notifications updated"
    );

    Ok(Json(UpdateNotificationsResponse {
        success: true,
        updated,
    }))
}

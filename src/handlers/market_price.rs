//! Market price observation handlers
//!
//! GET /api/market-prices, POST /api/market-prices and the moderation
//! transition PUT /api/market-prices/{id}/status.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::{error, info, warn};

use crate::entities::{market_prices, prelude::*};
use crate::handlers::{require_user, ErrorResponse};
use crate::models::market_price::{
    MarketPriceEntry, MarketPriceListResponse, MarketPriceQuery, ModeratePriceRequest,
    ObservationStatus, SubmitPriceRequest,
};
use crate::AppState;

/// Get market price observations
///
/// GET /api/market-prices
///
/// # Query Parameters
///
/// - `crop_type` - Case-insensitive contains-match on crop name
/// - `location` - Exact location (case-insensitive)
/// - `quality` - Quality tier filter
/// - `status` - Moderation status (default: approved)
/// - `limit` - Maximum number of results (default: 20, max: 100)
/// - `offset` - Offset for pagination (default: 0)
pub async fn get_market_prices(
    State(state): State<AppState>,
    Query(query): Query<MarketPriceQuery>,
) -> Result<Json<MarketPriceListResponse>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = query.validate() {
        warn!(error = %e, "Invalid market price query");
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
    }

    let status = query
        .status
        .clone()
        .unwrap_or_else(|| ObservationStatus::Approved.to_string());

    let mut select =
        MarketPrices::find().filter(market_prices::Column::Status.eq(status.to_lowercase()));

    if let Some(ref crop_type) = query.crop_type {
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(market_prices::Column::CropType)))
                .like(format!("%{}%", crop_type.to_lowercase())),
        );
    }
    if let Some(ref location) = query.location {
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(market_prices::Column::Location)))
                .eq(location.to_lowercase()),
        );
    }
    if let Some(ref quality) = query.quality {
        select = select.filter(market_prices::Column::Quality.eq(quality.to_lowercase()));
    }

    let total = select.clone().count(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to count market prices");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    let rows = select
        .order_by_desc(market_prices::Column::EffectiveDate)
        .order_by_desc(market_prices::Column::Id)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to query market prices");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    let prices: Vec<MarketPriceEntry> = rows.into_iter().map(Into::into).collect();

    Ok(Json(MarketPriceListResponse {
        prices,
        total,
        limit,
        offset,
    }))
}

/// Submit a price observation
///
/// POST /api/market-prices
///
/// New observations enter moderation as `pending`; only approved rows are
/// visible to listings by default and to alert evaluation.
pub async fn submit_market_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitPriceRequest>,
) -> Result<(StatusCode, Json<MarketPriceEntry>), (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user(&headers)?;

    if let Err(e) = request.validate() {
        warn!(error = %e, "Invalid price submission");
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
    }

    let effective_date = request.effective_date.unwrap_or_else(Utc::now);

    let active = market_prices::ActiveModel {
        crop_type: Set(request.crop_type.trim().to_string()),
        price_per_unit: Set(request.price_per_unit),
        unit: Set(request.unit.trim().to_string()),
        quality: Set(request.quality.to_lowercase()),
        location: Set(request.location.trim().to_string()),
        source: Set(request.source.to_lowercase()),
        status: Set(ObservationStatus::Pending.to_string()),
        effective_date: Set(effective_date.into()),
        submitted_by: Set(Some(user_id.clone())),
        ..Default::default()
    };

    let model = active.insert(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to insert market price");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    info!(
        id = model.id,
        crop_type = %model.crop_type,
        location = %model.location,
        submitted_by = %user_id,
        "Market price submitted"
    );

    Ok((StatusCode::CREATED, Json(model.into())))
}

/// Moderate a price observation
///
/// PUT /api/market-prices/{id}/status
///
/// Role checks live in the session layer in front of this service; here the
/// caller only has to be authenticated.
pub async fn moderate_market_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<ModeratePriceRequest>,
) -> Result<Json<MarketPriceEntry>, (StatusCode, Json<ErrorResponse>)> {
    let moderator = require_user(&headers)?;

    let status: ObservationStatus = request.status.parse().map_err(|e: String| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e }),
        )
    })?;

    if !matches!(
        status,
        ObservationStatus::Approved | ObservationStatus::Rejected
    ) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "status must be 'approved' or 'rejected'".to_string(),
            }),
        ));
    }

    let found = MarketPrices::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load market price");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    let Some(observation) = found else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "observation not found".to_string(),
            }),
        ));
    };

    let mut active: market_prices::ActiveModel = observation.into();
    active.status = Set(status.to_string());
    let model = active.update(&state.db).await.map_err(|e| {
        error!(error = %e, "Failed to update market price status");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    info!(id = model.id, status = %model.status, moderator = %moderator, "Market price moderated");

    Ok(Json(model.into()))
}

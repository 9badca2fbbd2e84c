//! Persistence seams for the alert pipeline
//!
//! The evaluator and dispatcher talk to these traits, not to SeaORM, so the
//! pipeline can run against in-memory fakes under test. `DbStore` is the one
//! production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, ExprTrait, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::{alert_notifications, market_prices, price_alerts, prelude::*};
use crate::models::market_price::ObservationStatus;
use crate::models::notification::{NotificationAction, NotificationStatus};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Read access to approved market price observations
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// The two most recent approved observations for the given
    /// (crop, location, quality) tuple, newest first. Crop and location are
    /// matched case-insensitively; `None` quality matches any tier.
    /// Ties on effective_date break by id so evaluation stays deterministic.
    async fn latest_pair(
        &self,
        crop_type: &str,
        location: &str,
        quality: Option<&str>,
    ) -> Result<Vec<market_prices::Model>, StoreError>;
}

/// Read/write access to alert subscriptions
#[async_trait]
pub trait AlertRegistry: Send + Sync {
    async fn active_alerts(&self) -> Result<Vec<price_alerts::Model>, StoreError>;

    /// Compare-and-set on last_triggered_at: succeeds only if the stored
    /// value still equals `expected_last`. A losing claim means another
    /// evaluation pass already handled this gap.
    async fn claim_trigger(
        &self,
        alert_id: i64,
        expected_last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Fields of a durable notification record, minus what the store fills in
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub alert_id: i64,
    pub owner_id: String,
    pub title: String,
    pub message: String,
    pub alert_type: String,
    pub crop_type: String,
    pub location: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub price_change_percent: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Durable notification records
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(
        &self,
        record: NewNotification,
    ) -> Result<alert_notifications::Model, StoreError>;

    /// Lookup by the stable (alert_id, observed_at) idempotency key
    async fn find_by_event(
        &self,
        alert_id: i64,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<alert_notifications::Model>, StoreError>;

    async fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<NotificationStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<alert_notifications::Model>, u64), StoreError>;

    /// Applies read/dismiss to the ids owned by `owner_id`; non-owned ids in
    /// the batch are silently ignored. Returns the number of rows updated.
    async fn apply_action(
        &self,
        owner_id: &str,
        ids: &[i64],
        action: NotificationAction,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// SeaORM-backed implementation of all three store traits
#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ObservationStore for DbStore {
    async fn latest_pair(
        &self,
        crop_type: &str,
        location: &str,
        quality: Option<&str>,
    ) -> Result<Vec<market_prices::Model>, StoreError> {
        let mut select = MarketPrices::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(market_prices::Column::CropType)))
                    .eq(crop_type.to_lowercase()),
            )
            .filter(
                Expr::expr(Func::lower(Expr::col(market_prices::Column::Location)))
                    .eq(location.to_lowercase()),
            )
            .filter(market_prices::Column::Status.eq(ObservationStatus::Approved.to_string()));

        if let Some(quality) = quality {
            select = select.filter(market_prices::Column::Quality.eq(quality.to_lowercase()));
        }

        let rows = select
            .order_by_desc(market_prices::Column::EffectiveDate)
            .order_by_desc(market_prices::Column::Id)
            .limit(2)
            .all(&self.db)
            .await?;

        Ok(rows)
    }
}

#[async_trait]
impl AlertRegistry for DbStore {
    async fn active_alerts(&self) -> Result<Vec<price_alerts::Model>, StoreError> {
        let alerts = PriceAlerts::find()
            .filter(price_alerts::Column::IsActive.eq(true))
            .all(&self.db)
            .await?;
        Ok(alerts)
    }

    async fn claim_trigger(
        &self,
        alert_id: i64,
        expected_last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut update = PriceAlerts::update_many()
            .col_expr(price_alerts::Column::LastTriggeredAt, Expr::value(now))
            .col_expr(price_alerts::Column::UpdatedAt, Expr::value(now))
            .filter(price_alerts::Column::Id.eq(alert_id));

        update = match expected_last {
            Some(last) => update.filter(price_alerts::Column::LastTriggeredAt.eq(last)),
            None => update.filter(price_alerts::Column::LastTriggeredAt.is_null()),
        };

        let result = update.exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl NotificationStore for DbStore {
    async fn insert(
        &self,
        record: NewNotification,
    ) -> Result<alert_notifications::Model, StoreError> {
        let active = alert_notifications::ActiveModel {
            alert_id: Set(record.alert_id),
            owner_id: Set(record.owner_id),
            title: Set(record.title),
            message: Set(record.message),
            alert_type: Set(record.alert_type),
            crop_type: Set(record.crop_type),
            location: Set(record.location),
            old_price: Set(record.old_price),
            new_price: Set(record.new_price),
            price_change_percent: Set(record.price_change_percent),
            observed_at: Set(record.observed_at.into()),
            status: Set(NotificationStatus::Pending.to_string()),
            ..Default::default()
        };

        let model = active.insert(&self.db).await?;
        Ok(model)
    }

    async fn find_by_event(
        &self,
        alert_id: i64,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<alert_notifications::Model>, StoreError> {
        let found = AlertNotifications::find()
            .filter(alert_notifications::Column::AlertId.eq(alert_id))
            .filter(alert_notifications::Column::ObservedAt.eq(observed_at))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<NotificationStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<alert_notifications::Model>, u64), StoreError> {
        let mut select =
            AlertNotifications::find().filter(alert_notifications::Column::OwnerId.eq(owner_id));

        if let Some(status) = status {
            select = select.filter(alert_notifications::Column::Status.eq(status.to_string()));
        }

        let total = select.clone().count(&self.db).await?;

        let items = select
            .order_by_desc(alert_notifications::Column::CreatedAt)
            .order_by_desc(alert_notifications::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok((items, total))
    }

    async fn apply_action(
        &self,
        owner_id: &str,
        ids: &[i64],
        action: NotificationAction,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut update = AlertNotifications::update_many()
            .filter(alert_notifications::Column::OwnerId.eq(owner_id))
            .filter(alert_notifications::Column::Id.is_in(ids.to_vec()));

        update = match action {
            NotificationAction::MarkRead => update
                .col_expr(
                    alert_notifications::Column::Status,
                    Expr::value(NotificationStatus::Read.to_string()),
                )
                .col_expr(alert_notifications::Column::ReadAt, Expr::value(now)),
            NotificationAction::Dismiss => update
                .col_expr(
                    alert_notifications::Column::Status,
                    Expr::value(NotificationStatus::Dismissed.to_string()),
                )
                .col_expr(alert_notifications::Column::DismissedAt, Expr::value(now)),
        };

        let result = update.exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

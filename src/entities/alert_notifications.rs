//! SeaORM Entity for durable alert notification records
//!
//! Rows are created only by the notification dispatcher and mutated only by
//! owner read/dismiss actions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub alert_id: i64,
    pub owner_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub alert_type: String,
    pub crop_type: String,
    pub location: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub old_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub new_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub price_change_percent: Decimal,
    /// effective_date of the newest observation behind the trigger; together
    /// with alert_id this is the idempotency key for re-fires
    pub observed_at: DateTimeWithTimeZone,
    /// 'pending', 'read', 'dismissed'
    pub status: String,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub dismissed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::price_alerts::Entity",
        from = "Column::AlertId",
        to = "super::price_alerts::Column::Id"
    )]
    PriceAlert,
}

impl Related<super::price_alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceAlert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

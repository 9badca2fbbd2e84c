//! SeaORM Entity for user-owned price alert subscriptions

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: String,
    pub crop_type: String,
    pub location: String,
    /// None matches observations of any quality tier
    pub quality: Option<String>,
    /// 'price_increase', 'price_decrease', 'price_volatility',
    /// 'regional_difference', 'quality_opportunity', 'seasonal_trend'
    pub alert_type: String,
    /// Minimum gap between triggers: 'immediate', 'daily', 'weekly', 'monthly'
    pub frequency: String,
    /// Percentage threshold, 0 < threshold <= 100
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub threshold: Decimal,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTimeWithTimeZone>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::alert_notifications::Entity")]
    AlertNotifications,
}

impl Related<super::alert_notifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertNotifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

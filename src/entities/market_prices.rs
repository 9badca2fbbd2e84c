//! SeaORM Entity for moderated market price observations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "market_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Crop name as submitted (e.g. "Maize")
    pub crop_type: String,
    /// Price per unit, always > 0
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price_per_unit: Decimal,
    /// Sale unit (e.g. "kg", "bag")
    pub unit: String,
    /// Quality tier: 'premium', 'standard', 'economy'
    pub quality: String,
    pub location: String,
    /// Who reported the price: 'farmer', 'trader', 'cooperative', 'market_survey'
    pub source: String,
    /// Moderation status: 'pending', 'approved', 'rejected', 'expired'
    pub status: String,
    /// When the price was observed in the market
    pub effective_date: DateTimeWithTimeZone,
    /// Submitting user, if known
    pub submitted_by: Option<String>,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

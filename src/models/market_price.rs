//! Market price observation request/response models
//!
//! Models for the /api/market-prices endpoints: submission, listing with
//! filters, and the moderation status transition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quality tier of an observed price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Premium,
    Standard,
    Economy,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Premium => write!(f, "premium"),
            Quality::Standard => write!(f, "standard"),
            Quality::Economy => write!(f, "economy"),
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "premium" => Ok(Quality::Premium),
            "standard" => Ok(Quality::Standard),
            "economy" => Ok(Quality::Economy),
            _ => Err(format!("Unknown quality: {}", s)),
        }
    }
}

/// Who reported the observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Farmer,
    Trader,
    Cooperative,
    MarketSurvey,
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Farmer => write!(f, "farmer"),
            PriceSource::Trader => write!(f, "trader"),
            PriceSource::Cooperative => write!(f, "cooperative"),
            PriceSource::MarketSurvey => write!(f, "market_survey"),
        }
    }
}

impl std::str::FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "farmer" => Ok(PriceSource::Farmer),
            "trader" => Ok(PriceSource::Trader),
            "cooperative" => Ok(PriceSource::Cooperative),
            "market_survey" => Ok(PriceSource::MarketSurvey),
            _ => Err(format!("Unknown price source: {}", s)),
        }
    }
}

/// Moderation status of an observation
/// Only 'approved' rows feed alert evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl std::fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationStatus::Pending => write!(f, "pending"),
            ObservationStatus::Approved => write!(f, "approved"),
            ObservationStatus::Rejected => write!(f, "rejected"),
            ObservationStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for ObservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ObservationStatus::Pending),
            "approved" => Ok(ObservationStatus::Approved),
            "rejected" => Ok(ObservationStatus::Rejected),
            "expired" => Ok(ObservationStatus::Expired),
            _ => Err(format!("Unknown observation status: {}", s)),
        }
    }
}

/// Query parameters for GET /api/market-prices
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketPriceQuery {
    /// Case-insensitive contains-match on crop name
    pub crop_type: Option<String>,
    pub location: Option<String>,
    pub quality: Option<String>,
    /// Defaults to 'approved'
    pub status: Option<String>,
    /// Maximum number of results (default: 20, max: 100)
    pub limit: Option<i32>,
    /// Offset for pagination (default: 0)
    pub offset: Option<i32>,
}

impl MarketPriceQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(limit) = self.limit {
            if limit < 1 {
                return Err("limit must be at least 1".to_string());
            }
            if limit > 100 {
                return Err("limit cannot exceed 100".to_string());
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err("offset cannot be negative".to_string());
            }
        }
        if let Some(ref quality) = self.quality {
            quality.parse::<Quality>()?;
        }
        if let Some(ref status) = self.status {
            status.parse::<ObservationStatus>()?;
        }
        Ok(())
    }
}

/// Request body for POST /api/market-prices
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPriceRequest {
    pub crop_type: String,
    pub price_per_unit: Decimal,
    pub unit: String,
    pub quality: String,
    pub location: String,
    pub source: String,
    /// Defaults to submission time
    pub effective_date: Option<DateTime<Utc>>,
}

impl SubmitPriceRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.crop_type.trim().is_empty() {
            return Err("crop_type is required".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("location is required".to_string());
        }
        if self.unit.trim().is_empty() {
            return Err("unit is required".to_string());
        }
        if self.price_per_unit <= Decimal::ZERO {
            return Err("price_per_unit must be greater than zero".to_string());
        }
        self.quality.parse::<Quality>()?;
        self.source.parse::<PriceSource>()?;
        Ok(())
    }
}

/// Request body for PUT /api/market-prices/{id}/status
#[derive(Debug, Clone, Deserialize)]
pub struct ModeratePriceRequest {
    /// 'approved' or 'rejected'
    pub status: String,
}

/// Single observation in the listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPriceEntry {
    pub id: i64,
    pub crop_type: String,
    pub price_per_unit: Decimal,
    pub unit: String,
    pub quality: String,
    pub location: String,
    pub source: String,
    pub status: String,
    pub effective_date: String,
}

impl From<crate::entities::market_prices::Model> for MarketPriceEntry {
    fn from(model: crate::entities::market_prices::Model) -> Self {
        Self {
            id: model.id,
            crop_type: model.crop_type,
            price_per_unit: model.price_per_unit,
            unit: model.unit,
            quality: model.quality,
            location: model.location,
            source: model.source,
            status: model.status,
            effective_date: model.effective_date.to_rfc3339(),
        }
    }
}

/// Response for GET /api/market-prices
#[derive(Debug, Clone, Serialize)]
pub struct MarketPriceListResponse {
    pub prices: Vec<MarketPriceEntry>,
    pub total: u64,
    pub limit: i32,
    pub offset: i32,
}

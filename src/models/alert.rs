//! Price alert types, policies and request/response models
//!
//! The direction and frequency policies live next to the enums so the
//! evaluation engine stays a thin orchestration layer.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::price_alerts;
use crate::models::market_price::Quality;

/// What kind of price movement the subscription watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceIncrease,
    PriceDecrease,
    PriceVolatility,
    RegionalDifference,
    QualityOpportunity,
    SeasonalTrend,
}

impl AlertType {
    /// Human-readable label used in notification titles
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::PriceIncrease => "Price Increase",
            AlertType::PriceDecrease => "Price Decrease",
            AlertType::PriceVolatility => "Price Volatility",
            AlertType::RegionalDifference => "Regional Difference",
            AlertType::QualityOpportunity => "Quality Opportunity",
            AlertType::SeasonalTrend => "Seasonal Trend",
        }
    }

    /// Whether this type asserts a movement direction in its wording
    pub fn is_directional(&self) -> bool {
        matches!(self, AlertType::PriceIncrease | AlertType::PriceDecrease)
    }

    /// Direction policy applied after the threshold check.
    ///
    /// The regional/quality/seasonal types have no comparative model yet and
    /// fire on any qualifying change (see DESIGN.md).
    pub fn direction_matches(&self, percent_change: Decimal) -> bool {
        match self {
            AlertType::PriceIncrease => percent_change > Decimal::ZERO,
            AlertType::PriceDecrease => percent_change < Decimal::ZERO,
            AlertType::PriceVolatility
            | AlertType::RegionalDifference
            | AlertType::QualityOpportunity
            | AlertType::SeasonalTrend => true,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::PriceIncrease => write!(f, "price_increase"),
            AlertType::PriceDecrease => write!(f, "price_decrease"),
            AlertType::PriceVolatility => write!(f, "price_volatility"),
            AlertType::RegionalDifference => write!(f, "regional_difference"),
            AlertType::QualityOpportunity => write!(f, "quality_opportunity"),
            AlertType::SeasonalTrend => write!(f, "seasonal_trend"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "price_increase" => Ok(AlertType::PriceIncrease),
            "price_decrease" => Ok(AlertType::PriceDecrease),
            "price_volatility" => Ok(AlertType::PriceVolatility),
            "regional_difference" => Ok(AlertType::RegionalDifference),
            "quality_opportunity" => Ok(AlertType::QualityOpportunity),
            "seasonal_trend" => Ok(AlertType::SeasonalTrend),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

/// Minimum elapsed time before an alert may fire again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFrequency {
    Immediate,
    Daily,
    Weekly,
    Monthly,
}

impl AlertFrequency {
    pub fn min_gap(&self) -> Duration {
        match self {
            AlertFrequency::Immediate => Duration::zero(),
            AlertFrequency::Daily => Duration::hours(24),
            AlertFrequency::Weekly => Duration::days(7),
            AlertFrequency::Monthly => Duration::days(30),
        }
    }

    /// First trigger (no previous timestamp) is always eligible.
    pub fn gate_open(&self, last_triggered_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_triggered_at {
            None => true,
            Some(last) => now - last >= self.min_gap(),
        }
    }
}

impl std::fmt::Display for AlertFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertFrequency::Immediate => write!(f, "immediate"),
            AlertFrequency::Daily => write!(f, "daily"),
            AlertFrequency::Weekly => write!(f, "weekly"),
            AlertFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for AlertFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" => Ok(AlertFrequency::Immediate),
            "daily" => Ok(AlertFrequency::Daily),
            "weekly" => Ok(AlertFrequency::Weekly),
            "monthly" => Ok(AlertFrequency::Monthly),
            _ => Err(format!("Unknown alert frequency: {}", s)),
        }
    }
}

/// Request body for POST /api/price-alerts
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAlertRequest {
    pub crop_type: String,
    pub location: String,
    /// Omit to match any quality tier
    pub quality: Option<String>,
    pub alert_type: String,
    pub frequency: String,
    /// Percentage, 0 < threshold <= 100
    pub threshold: Decimal,
}

impl CreateAlertRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.crop_type.trim().is_empty() {
            return Err("crop_type is required".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("location is required".to_string());
        }
        if self.threshold <= Decimal::ZERO || self.threshold > Decimal::from(100) {
            return Err("threshold must be between 0 (exclusive) and 100".to_string());
        }
        if let Some(ref quality) = self.quality {
            quality.parse::<Quality>()?;
        }
        self.alert_type.parse::<AlertType>()?;
        self.frequency.parse::<AlertFrequency>()?;
        Ok(())
    }
}

/// Request body for PUT /api/price-alerts/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAlertRequest {
    pub is_active: Option<bool>,
    pub threshold: Option<Decimal>,
    pub frequency: Option<String>,
}

impl UpdateAlertRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.is_active.is_none() && self.threshold.is_none() && self.frequency.is_none() {
            return Err("nothing to update".to_string());
        }
        if let Some(threshold) = self.threshold {
            if threshold <= Decimal::ZERO || threshold > Decimal::from(100) {
                return Err("threshold must be between 0 (exclusive) and 100".to_string());
            }
        }
        if let Some(ref frequency) = self.frequency {
            frequency.parse::<AlertFrequency>()?;
        }
        Ok(())
    }
}

/// Alert entry in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResponse {
    pub id: i64,
    pub crop_type: String,
    pub location: String,
    pub quality: Option<String>,
    pub alert_type: String,
    pub frequency: String,
    pub threshold: Decimal,
    pub is_active: bool,
    pub last_triggered_at: Option<String>,
    pub created_at: Option<String>,
}

impl From<price_alerts::Model> for AlertResponse {
    fn from(model: price_alerts::Model) -> Self {
        Self {
            id: model.id,
            crop_type: model.crop_type,
            location: model.location,
            quality: model.quality,
            alert_type: model.alert_type,
            frequency: model.frequency,
            threshold: model.threshold,
            is_active: model.is_active,
            last_triggered_at: model.last_triggered_at.map(|t| t.to_rfc3339()),
            created_at: model.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Output of the evaluation engine for one alert whose conditions are met
#[derive(Debug, Clone)]
pub struct TriggerDecision {
    pub alert: price_alerts::Model,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Sale unit of the newest observation
    pub unit: String,
    pub percent_change: Decimal,
    /// effective_date of the newest observation
    pub observed_at: DateTime<Utc>,
    /// last_triggered_at as read during evaluation; the dispatcher's claim
    /// must only succeed if the stored value still matches
    pub read_last_triggered_at: Option<DateTime<Utc>>,
}

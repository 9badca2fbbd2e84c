//! Notification models: durable record DTOs and the real-time event payload

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::alert_notifications;

/// Lifecycle of a durable notification record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Read,
    Dismissed,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Read => write!(f, "read"),
            NotificationStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(NotificationStatus::Pending),
            "read" => Ok(NotificationStatus::Read),
            "dismissed" => Ok(NotificationStatus::Dismissed),
            _ => Err(format!("Unknown notification status: {}", s)),
        }
    }
}

/// Owner action applied to a batch of notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    MarkRead,
    Dismiss,
}

impl std::str::FromStr for NotificationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(NotificationAction::MarkRead),
            "dismiss" => Ok(NotificationAction::Dismiss),
            _ => Err(format!("Unknown notification action: {}", s)),
        }
    }
}

/// Real-time event pushed to the owner's active connections when an alert
/// fires. The durable record remains the source of truth for missed pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: i64,
    /// Routing key: events are fanned out to the owner's sessions only
    pub owner_id: String,
    pub notification_id: i64,
    pub crop_type: String,
    pub location: String,
    pub threshold: Decimal,
    pub current_price: Decimal,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

/// Query parameters for GET /api/notifications
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub status: Option<String>,
    /// Maximum number of results (default: 20, max: 100)
    pub limit: Option<i32>,
    /// Offset for pagination (default: 0)
    pub offset: Option<i32>,
}

impl NotificationQuery {
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
        if let Some(ref status) = self.status {
            status.parse::<NotificationStatus>()?;
        }
        Ok(())
    }
}

/// Request body for PUT /api/notifications
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNotificationsRequest {
    /// 'read' or 'dismiss'
    pub action: String,
    pub ids: Vec<i64>,
}

/// Response for PUT /api/notifications: `updated` counts the owned subset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotificationsResponse {
    pub success: bool,
    pub updated: u64,
}

/// Notification entry in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub alert_id: i64,
    pub title: String,
    pub message: String,
    pub alert_type: String,
    pub crop_type: String,
    pub location: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub price_change_percent: Decimal,
    pub status: String,
    pub created_at: Option<String>,
    pub read_at: Option<String>,
    pub dismissed_at: Option<String>,
}

impl From<alert_notifications::Model> for NotificationResponse {
    fn from(model: alert_notifications::Model) -> Self {
        Self {
            id: model.id,
            alert_id: model.alert_id,
            title: model.title,
            message: model.message,
            alert_type: model.alert_type,
            crop_type: model.crop_type,
            location: model.location,
            old_price: model.old_price,
            new_price: model.new_price,
            price_change_percent: model.price_change_percent,
            status: model.status,
            created_at: model.created_at.map(|t| t.to_rfc3339()),
            read_at: model.read_at.map(|t| t.to_rfc3339()),
            dismissed_at: model.dismissed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            "read".parse::<NotificationAction>().unwrap(),
            NotificationAction::MarkRead
        );
        assert_eq!(
            "dismiss".parse::<NotificationAction>().unwrap(),
            NotificationAction::Dismiss
        );
        assert!("archive".parse::<NotificationAction>().is_err());
    }

    #[test]
    fn test_query_rejects_unknown_status() {
        let query = NotificationQuery {
            status: Some("seen".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }
}

pub mod market_price;
pub mod notification;
pub mod notification_ws;
pub mod price_alert;

use axum::{http::HeaderMap, http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Pulls the opaque caller id from the `x-user-id` header.
///
/// Session validation itself lives in front of this service; the handlers
/// only need a stable owner id to scope queries by.
pub fn require_user(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    match headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
        Some(user_id) if !user_id.trim().is_empty() => Ok(user_id.to_string()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "missing x-user-id header".to_string(),
            }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_user_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "farmer-1".parse().unwrap());
        assert_eq!(require_user(&headers).unwrap(), "farmer-1");
    }

    #[test]
    fn test_require_user_missing() {
        let headers = HeaderMap::new();
        assert!(require_user(&headers).is_err());
    }

    #[test]
    fn test_require_user_blank() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "  ".parse().unwrap());
        assert!(require_user(&headers).is_err());
    }
}

pub use super::alert_notifications::Entity as AlertNotifications;
pub use super::market_prices::Entity as MarketPrices;
pub use super::price_alerts::Entity as PriceAlerts;

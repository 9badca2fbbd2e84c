pub mod alert;
pub mod market_price;
pub mod notification;

pub use sea_orm_migration::prelude::*;

mod m20260512_000001_create_market_prices;
mod m20260519_000001_create_price_alerts;
mod m20260526_000001_create_alert_notifications;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260512_000001_create_market_prices::Migration),
            Box::new(m20260519_000001_create_price_alerts::Migration),
            Box::new(m20260526_000001_create_alert_notifications::Migration),
        ]
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceAlerts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::OwnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::CropType)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::Location)
                            .string_len(100)
                            .not_null(),
                    )
                    // NULL means the alert matches any quality tier
                    .col(ColumnDef::new(PriceAlerts::Quality).string_len(10).null())
                    .col(
                        ColumnDef::new(PriceAlerts::AlertType)
                            .string_len(30)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::Frequency)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::Threshold)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::LastTriggeredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(PriceAlerts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // One subscription per (owner, crop, location, quality, type).
        // NULL quality rows are additionally guarded at the API layer since
        // Postgres treats NULLs as distinct in unique indexes.
        manager
            .create_index(
                Index::create()
                    .name("uq_price_alerts_subscription")
                    .table(PriceAlerts::Table)
                    .col(PriceAlerts::OwnerId)
                    .col(PriceAlerts::CropType)
                    .col(PriceAlerts::Location)
                    .col(PriceAlerts::Quality)
                    .col(PriceAlerts::AlertType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Evaluation scan: active alerts only
        manager
            .create_index(
                Index::create()
                    .name("idx_price_alerts_active")
                    .table(PriceAlerts::Table)
                    .col(PriceAlerts::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceAlerts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PriceAlerts {
    Table,
    Id,
    OwnerId,
    CropType,
    Location,
    Quality,
    AlertType,
    Frequency,
    Threshold,
    IsActive,
    LastTriggeredAt,
    CreatedAt,
    UpdatedAt,
}

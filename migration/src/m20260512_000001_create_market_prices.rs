use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MarketPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketPrices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::CropType)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::PricePerUnit)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::Unit)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::Quality)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::Location)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::Source)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::Status)
                            .string_len(10)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::EffectiveDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::SubmittedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketPrices::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Evaluation path: latest approved observations per (crop, location)
        manager
            .create_index(
                Index::create()
                    .name("idx_market_prices_lookup")
                    .table(MarketPrices::Table)
                    .col(MarketPrices::CropType)
                    .col(MarketPrices::Location)
                    .col(MarketPrices::Status)
                    .col((MarketPrices::EffectiveDate, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // Moderation queue listing: (status, effective_date)
        manager
            .create_index(
                Index::create()
                    .name("idx_market_prices_status_date")
                    .table(MarketPrices::Table)
                    .col(MarketPrices::Status)
                    .col((MarketPrices::EffectiveDate, IndexOrder::Desc))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MarketPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MarketPrices {
    Table,
    Id,
    CropType,
    PricePerUnit,
    Unit,
    Quality,
    Location,
    Source,
    Status,
    EffectiveDate,
    SubmittedBy,
    CreatedAt,
}

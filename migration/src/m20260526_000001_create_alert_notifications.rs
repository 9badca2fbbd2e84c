use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AlertNotifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertNotifications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::AlertId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::OwnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::Title)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AlertNotifications::Message).text().not_null())
                    .col(
                        ColumnDef::new(AlertNotifications::AlertType)
                            .string_len(30)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::CropType)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::Location)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::OldPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::NewPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::PriceChangePercent)
                            .decimal_len(8, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::ObservedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::Status)
                            .string_len(10)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::ReadAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AlertNotifications::DismissedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_alert_notifications_alert")
                    .from(AlertNotifications::Table, AlertNotifications::AlertId)
                    .to(PriceAlerts::Table, PriceAlerts::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .to_owned(),
            )
            .await?;

        // One durable record per (alert, underlying price event)
        manager
            .create_index(
                Index::create()
                    .name("uq_alert_notifications_alert_observed")
                    .table(AlertNotifications::Table)
                    .col(AlertNotifications::AlertId)
                    .col(AlertNotifications::ObservedAt)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Inbox listing: (owner, status, created_at DESC)
        manager
            .create_index(
                Index::create()
                    .name("idx_alert_notifications_owner_status")
                    .table(AlertNotifications::Table)
                    .col(AlertNotifications::OwnerId)
                    .col(AlertNotifications::Status)
                    .col((AlertNotifications::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AlertNotifications::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AlertNotifications {
    Table,
    Id,
    AlertId,
    OwnerId,
    Title,
    Message,
    AlertType,
    CropType,
    Location,
    OldPrice,
    NewPrice,
    PriceChangePercent,
    ObservedAt,
    Status,
    CreatedAt,
    ReadAt,
    DismissedAt,
}

#[derive(Iden)]
enum PriceAlerts {
    Table,
    Id,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Nickname).string().null())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::PaymentPasswordHash).string().null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::SellerId).big_integer().not_null())
                    .col(ColumnDef::new(Products::Title).string().not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::ImageUrls).text().not_null())
                    .col(ColumnDef::new(Products::Price).big_integer().not_null())
                    .col(ColumnDef::new(Products::Status).integer().not_null())
                    .col(ColumnDef::new(Products::IsDeleted).boolean().not_null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TradeOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TradeOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TradeOrders::BuyerId).big_integer().not_null())
                    .col(ColumnDef::new(TradeOrders::SellerId).big_integer().not_null())
                    .col(ColumnDef::new(TradeOrders::ProductId).big_integer().not_null())
                    .col(
                        ColumnDef::new(TradeOrders::PriceAtPurchase)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TradeOrders::ProductTitleSnapshot)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TradeOrders::ProductDescriptionSnapshot)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TradeOrders::ProductImageUrlsSnapshot)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TradeOrders::Status).integer().not_null())
                    .col(ColumnDef::new(TradeOrders::IsDeleted).boolean().not_null())
                    .col(
                        ColumnDef::new(TradeOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TradeOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trade_orders_buyer_id")
                    .table(TradeOrders::Table)
                    .col(TradeOrders::BuyerId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_trade_orders_seller_id")
                    .table(TradeOrders::Table)
                    .col(TradeOrders::SellerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Payments::PaymentId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Payments::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Payments::OrderIds).text().not_null())
                    .col(ColumnDef::new(Payments::PaymentAmount).big_integer().not_null())
                    .col(ColumnDef::new(Payments::PaymentMethod).integer().not_null())
                    .col(ColumnDef::new(Payments::Status).integer().not_null())
                    .col(
                        ColumnDef::new(Payments::ThirdPartyTransactionId)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Payments::FailureReason).string().null())
                    .col(
                        ColumnDef::new(Payments::PaymentTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Payments::ExpireTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::IsDeleted).boolean().not_null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The reconciler scans on (status, expire_time).
        manager
            .create_index(
                Index::create()
                    .name("idx_payments_status_expire_time")
                    .table(Payments::Table)
                    .col(Payments::Status)
                    .col(Payments::ExpireTime)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_payments_user_id")
                    .table(Payments::Table)
                    .col(Payments::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::ActorId).big_integer().null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TargetType).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TargetId).string().null())
                    .col(ColumnDef::new(AuditLogs::Outcome).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Metadata).json().null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Notifications::RecipientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Content).text().not_null())
                    .col(ColumnDef::new(Notifications::SourceOrderId).big_integer().null())
                    .col(ColumnDef::new(Notifications::IsRead).boolean().not_null())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TradeOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Nickname,
    Email,
    PasswordHash,
    PaymentPasswordHash,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    SellerId,
    Title,
    Description,
    ImageUrls,
    Price,
    Status,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TradeOrders {
    Table,
    Id,
    BuyerId,
    SellerId,
    ProductId,
    PriceAtPurchase,
    ProductTitleSnapshot,
    ProductDescriptionSnapshot,
    ProductImageUrlsSnapshot,
    Status,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    PaymentId,
    UserId,
    OrderIds,
    PaymentAmount,
    PaymentMethod,
    Status,
    ThirdPartyTransactionId,
    FailureReason,
    PaymentTime,
    ExpireTime,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    ActorId,
    Action,
    TargetType,
    TargetId,
    Outcome,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    RecipientId,
    Title,
    Content,
    SourceOrderId,
    IsRead,
    CreatedAt,
}

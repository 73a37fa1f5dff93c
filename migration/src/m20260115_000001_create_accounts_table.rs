use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 accounts 表 - 每个账户一行，含三组服务凭证列
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Accounts::DisplayName).string_len(100))
                    .col(ColumnDef::new(Accounts::DriveAccessToken).text())
                    .col(ColumnDef::new(Accounts::DriveRefreshToken).text())
                    .col(ColumnDef::new(Accounts::DriveTokenExpiry).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Accounts::DriveConnected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::SheetsAccessToken).text())
                    .col(ColumnDef::new(Accounts::SheetsRefreshToken).text())
                    .col(ColumnDef::new(Accounts::SheetsTokenExpiry).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Accounts::SheetsConnected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::GoogleAccessToken).text())
                    .col(ColumnDef::new(Accounts::GoogleRefreshToken).text())
                    .col(ColumnDef::new(Accounts::GoogleTokenExpiry).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Accounts::GoogleConnected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 邮箱查询索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_accounts_email")
                    .table(Accounts::Table)
                    .col(Accounts::Email)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Email,
    DisplayName,
    DriveAccessToken,
    DriveRefreshToken,
    DriveTokenExpiry,
    DriveConnected,
    SheetsAccessToken,
    SheetsRefreshToken,
    SheetsTokenExpiry,
    SheetsConnected,
    GoogleAccessToken,
    GoogleRefreshToken,
    GoogleTokenExpiry,
    GoogleConnected,
    CreatedAt,
    UpdatedAt,
}

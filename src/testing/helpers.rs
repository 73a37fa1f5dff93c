//! # 测试辅助函数

use chrono::Utc;
use entity::accounts;
use migration::MigratorTrait as _;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, Set};
use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建内存数据库连接并执行迁移
pub async fn create_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    migration::Migrator::up(&db, None).await?;

    Ok(db)
}

/// 在测试数据库中插入一个账户
pub async fn seed_account(db: &DatabaseConnection, owner_id: &str) -> Result<(), DbErr> {
    let now = Utc::now();
    accounts::ActiveModel {
        id: Set(owner_id.to_string()),
        email: Set(format!("{owner_id}@thesis.example.edu")),
        display_name: Set(None),
        drive_access_token: Set(None),
        drive_refresh_token: Set(None),
        drive_token_expiry: Set(None),
        drive_connected: Set(false),
        sheets_access_token: Set(None),
        sheets_refresh_token: Set(None),
        sheets_token_expiry: Set(None),
        sheets_connected: Set(false),
        google_access_token: Set(None),
        google_refresh_token: Set(None),
        google_token_expiry: Set(None),
        google_connected: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(())
}

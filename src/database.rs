//! # 数据库模块
//!
//! 数据库连接和迁移管理

use migration::MigratorTrait as _;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    info!(max_connections = config.max_connections, "connecting to database");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout));

    let db = Database::connect(options).await?;

    info!("database connection established");
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    info!("running database migrations");
    migration::Migrator::up(db, None).await?;
    info!("database migrations completed");
    Ok(())
}

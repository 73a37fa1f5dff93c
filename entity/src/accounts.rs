//! # 账户实体定义
//!
//! 账户表的 Sea-ORM 实体模型。每个账户持有三组外部服务凭证列
//! （drive / sheets / google 日历），token 列保存的是静态加密后的密文。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 账户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub display_name: Option<String>,

    // Google Drive 凭证列组
    #[sea_orm(column_type = "Text", nullable)]
    pub drive_access_token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub drive_refresh_token: Option<String>,
    pub drive_token_expiry: Option<DateTimeUtc>,
    pub drive_connected: bool,

    // Google Sheets 凭证列组
    #[sea_orm(column_type = "Text", nullable)]
    pub sheets_access_token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub sheets_refresh_token: Option<String>,
    pub sheets_token_expiry: Option<DateTimeUtc>,
    pub sheets_connected: bool,

    // 日历凭证列组（历史原因沿用 google_ 前缀）
    #[sea_orm(column_type = "Text", nullable)]
    pub google_access_token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub google_refresh_token: Option<String>,
    pub google_token_expiry: Option<DateTimeUtc>,
    pub google_connected: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

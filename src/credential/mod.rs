//! # 凭证模块
//!
//! 定义外部服务枚举、凭证的内存视图与部分更新载体，
//! 以及持久化仓储抽象和解密读写入口。

mod repository;
mod store;

pub use repository::{CredentialRecord, CredentialRepository, SeaOrmCredentialRepository};
pub use store::CredentialStore;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GuardError;

/// 受管的外部服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Google Drive（文档归档与导出）
    Drive,
    /// Google Sheets（成绩与名单同步）
    Sheets,
    /// Google Calendar（答辩排期）
    Calendar,
}

impl Service {
    /// 全部受管服务
    pub const ALL: [Self; 3] = [Self::Drive, Self::Sheets, Self::Calendar];

    /// 服务标识，同时用作速率限制 scope
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Sheets => "sheets",
            Self::Calendar => "calendar",
        }
    }

    /// 账户表中的列前缀（日历历史上沿用 google_ 前缀）
    #[must_use]
    pub const fn column_prefix(&self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Sheets => "sheets",
            Self::Calendar => "google",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Service {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drive" => Ok(Self::Drive),
            "sheets" => Ok(Self::Sheets),
            "calendar" | "google" => Ok(Self::Calendar),
            other => Err(GuardError::config(format!("未知的服务标识: {other}"))),
        }
    }
}

/// 某账户在某服务上的凭证（解密后的内存视图）
///
/// 不变式：`connected == true` 时 `access_token` 必为 `Some`。
#[derive(Debug, Clone)]
pub struct StoredCredential {
    /// 所属账户 ID
    pub owner_id: String,
    /// 所属服务
    pub service: Service,
    /// 访问 token（短期）
    pub access_token: Option<String>,
    /// 刷新 token（长期）
    pub refresh_token: Option<String>,
    /// 访问 token 过期时间
    pub expires_at: Option<DateTime<Utc>>,
    /// 是否处于已连接状态
    pub connected: bool,
}

impl StoredCredential {
    /// 判断访问 token 是否将在 `buffer` 内过期
    ///
    /// 没有过期时间的 token 视为不过期（由提供商拒绝时再处理）。
    #[must_use]
    pub fn expires_within(&self, buffer: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - buffer < Utc::now())
    }
}

/// 凭证字段的部分更新载体
///
/// `None` 表示不触碰对应列；密文字段的清空只能通过
/// [`CredentialStore::clear`] 完成，避免覆盖未轮换的刷新 token。
#[derive(Debug, Clone, Default)]
pub struct CredentialPatch {
    /// 新的访问 token
    pub access_token: Option<String>,
    /// 新的刷新 token（仅在提供商轮换时出现）
    pub refresh_token: Option<String>,
    /// 新的过期时间
    pub expires_at: Option<DateTime<Utc>>,
    /// 连接状态变更
    pub connected: Option<bool>,
}

//! # 凭证仓储
//!
//! 凭证字段的持久化抽象。仓储只面向"静态存储形态"（密文），
//! 加解密由上层 [`super::CredentialStore`] 负责；这样测试可以
//! 注入内存实现而不依赖数据库。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::accounts;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

use super::{CredentialPatch, Service};
use crate::error::{GuardError, Result};

/// 账户某服务凭证列组的原始（静态存储）视图
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    /// 访问 token 密文
    pub access_token: Option<String>,
    /// 刷新 token 密文
    pub refresh_token: Option<String>,
    /// 过期时间
    pub token_expiry: Option<DateTime<Utc>>,
    /// 连接状态
    pub connected: bool,
}

/// 凭证持久化仓储抽象
///
/// `save` 是部分更新语义：只写入 patch 中出现的字段，
/// 重复写入同一值必须是安全的。
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// 读取某账户某服务的凭证列组；账户不存在时返回 `None`
    async fn load(&self, owner_id: &str, service: Service) -> Result<Option<CredentialRecord>>;

    /// 按 patch 部分更新凭证列组
    async fn save(&self, owner_id: &str, service: Service, patch: &CredentialPatch) -> Result<()>;

    /// 清空凭证列组并置为未连接
    async fn clear(&self, owner_id: &str, service: Service) -> Result<()>;
}

/// Sea-ORM 实现：凭证列组挂在 accounts 表上
pub struct SeaOrmCredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCredentialRepository {
    /// 创建仓储实例
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn record_from(model: &accounts::Model, service: Service) -> CredentialRecord {
        match service {
            Service::Drive => CredentialRecord {
                access_token: model.drive_access_token.clone(),
                refresh_token: model.drive_refresh_token.clone(),
                token_expiry: model.drive_token_expiry,
                connected: model.drive_connected,
            },
            Service::Sheets => CredentialRecord {
                access_token: model.sheets_access_token.clone(),
                refresh_token: model.sheets_refresh_token.clone(),
                token_expiry: model.sheets_token_expiry,
                connected: model.sheets_connected,
            },
            Service::Calendar => CredentialRecord {
                access_token: model.google_access_token.clone(),
                refresh_token: model.google_refresh_token.clone(),
                token_expiry: model.google_token_expiry,
                connected: model.google_connected,
            },
        }
    }

    fn apply_patch(
        active: &mut accounts::ActiveModel,
        service: Service,
        patch: &CredentialPatch,
    ) {
        match service {
            Service::Drive => {
                if let Some(v) = &patch.access_token {
                    active.drive_access_token = Set(Some(v.clone()));
                }
                if let Some(v) = &patch.refresh_token {
                    active.drive_refresh_token = Set(Some(v.clone()));
                }
                if let Some(v) = patch.expires_at {
                    active.drive_token_expiry = Set(Some(v));
                }
                if let Some(v) = patch.connected {
                    active.drive_connected = Set(v);
                }
            }
            Service::Sheets => {
                if let Some(v) = &patch.access_token {
                    active.sheets_access_token = Set(Some(v.clone()));
                }
                if let Some(v) = &patch.refresh_token {
                    active.sheets_refresh_token = Set(Some(v.clone()));
                }
                if let Some(v) = patch.expires_at {
                    active.sheets_token_expiry = Set(Some(v));
                }
                if let Some(v) = patch.connected {
                    active.sheets_connected = Set(v);
                }
            }
            Service::Calendar => {
                if let Some(v) = &patch.access_token {
                    active.google_access_token = Set(Some(v.clone()));
                }
                if let Some(v) = &patch.refresh_token {
                    active.google_refresh_token = Set(Some(v.clone()));
                }
                if let Some(v) = patch.expires_at {
                    active.google_token_expiry = Set(Some(v));
                }
                if let Some(v) = patch.connected {
                    active.google_connected = Set(v);
                }
            }
        }
    }

    fn apply_clear(active: &mut accounts::ActiveModel, service: Service) {
        match service {
            Service::Drive => {
                active.drive_access_token = Set(None);
                active.drive_refresh_token = Set(None);
                active.drive_token_expiry = Set(None);
                active.drive_connected = Set(false);
            }
            Service::Sheets => {
                active.sheets_access_token = Set(None);
                active.sheets_refresh_token = Set(None);
                active.sheets_token_expiry = Set(None);
                active.sheets_connected = Set(false);
            }
            Service::Calendar => {
                active.google_access_token = Set(None);
                active.google_refresh_token = Set(None);
                active.google_token_expiry = Set(None);
                active.google_connected = Set(false);
            }
        }
    }
}

#[async_trait]
impl CredentialRepository for SeaOrmCredentialRepository {
    async fn load(&self, owner_id: &str, service: Service) -> Result<Option<CredentialRecord>> {
        let model = accounts::Entity::find_by_id(owner_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| {
                GuardError::database_with_source(
                    format!("failed to load account {owner_id}"),
                    e,
                )
            })?;

        Ok(model.map(|m| Self::record_from(&m, service)))
    }

    async fn save(&self, owner_id: &str, service: Service, patch: &CredentialPatch) -> Result<()> {
        let mut active = accounts::ActiveModel {
            id: Set(owner_id.to_string()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        Self::apply_patch(&mut active, service, patch);

        active.update(self.db.as_ref()).await.map_err(|e| {
            GuardError::database_with_source(
                format!("failed to update {service} credential for account {owner_id}"),
                e,
            )
        })?;

        Ok(())
    }

    async fn clear(&self, owner_id: &str, service: Service) -> Result<()> {
        let mut active = accounts::ActiveModel {
            id: Set(owner_id.to_string()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        Self::apply_clear(&mut active, service);

        active.update(self.db.as_ref()).await.map_err(|e| {
            GuardError::database_with_source(
                format!("failed to clear {service} credential for account {owner_id}"),
                e,
            )
        })?;

        Ok(())
    }
}

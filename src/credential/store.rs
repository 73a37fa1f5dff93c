//! # 凭证读写入口
//!
//! 组合仓储与加密器：读取时解密、写入时加密，
//! 业务代码与刷新服务只通过这里接触凭证字段。

use std::sync::Arc;
use tracing::{debug, info};

use super::{CredentialPatch, CredentialRepository, Service, StoredCredential};
use crate::config::SecretCipher;
use crate::error::{GuardError, Result};

/// 凭证存取服务
///
/// 仓储与加密器均为注入依赖，测试可用内存仓储独立实例化。
pub struct CredentialStore {
    repository: Arc<dyn CredentialRepository>,
    cipher: Arc<SecretCipher>,
}

impl CredentialStore {
    /// 创建凭证存取服务
    pub fn new(repository: Arc<dyn CredentialRepository>, cipher: Arc<SecretCipher>) -> Self {
        Self { repository, cipher }
    }

    /// 读取某账户某服务的凭证（解密后视图）
    ///
    /// 账户不存在视为凭证缺失；服务未连接时返回
    /// `connected = false` 的视图，由调用方决定如何处置。
    pub async fn get(&self, owner_id: &str, service: Service) -> Result<StoredCredential> {
        let record = self
            .repository
            .load(owner_id, service)
            .await?
            .ok_or_else(|| GuardError::credential_missing(owner_id, service.as_str()))?;

        let access_token = match record.access_token {
            Some(blob) => Some(self.cipher.decrypt(&blob)?),
            None => None,
        };
        let refresh_token = match record.refresh_token {
            Some(blob) => Some(self.cipher.decrypt(&blob)?),
            None => None,
        };

        Ok(StoredCredential {
            owner_id: owner_id.to_string(),
            service,
            access_token,
            refresh_token,
            expires_at: record.token_expiry,
            connected: record.connected,
        })
    }

    /// 部分更新凭证字段，密文字段写入前加密
    ///
    /// patch 中缺席的字段不会被触碰：只写 `expires_at`
    /// 不会破坏已有的刷新 token；重复写入同一 token 也是安全的
    /// （加密对已是密文格式的输入幂等）。
    pub async fn update(
        &self,
        owner_id: &str,
        service: Service,
        patch: &CredentialPatch,
    ) -> Result<()> {
        let mut encrypted = patch.clone();
        if let Some(token) = &patch.access_token {
            encrypted.access_token = Some(self.cipher.encrypt(token)?);
        }
        if let Some(token) = &patch.refresh_token {
            encrypted.refresh_token = Some(self.cipher.encrypt(token)?);
        }

        debug!(owner_id, service = %service, "updating credential fields");
        self.repository.save(owner_id, service, &encrypted).await
    }

    /// 清空凭证并置为未连接
    ///
    /// 授权被提供商永久撤销（invalid_grant）或用户主动断开时调用。
    pub async fn clear(&self, owner_id: &str, service: Service) -> Result<()> {
        info!(owner_id, service = %service, "clearing stored credential");
        self.repository.clear(owner_id, service).await
    }
}

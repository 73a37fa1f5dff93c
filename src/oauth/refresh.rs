//! # Token 刷新服务
//!
//! 实现访问 token 的按需刷新：取 token 时检查过期状态，临期则用
//! 刷新 token 向提供商换新并写回存储。
//!
//! 并发语义（正确性要求而非优化）：同一 `(账户, 服务)` 上并发的
//! `ensure_fresh` 只允许一次真实的提供商刷新在途，其余调用方等待
//! 并复用其结果。部分提供商在并发刷新时会使先发的 token 失效。

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::classifier::{classify, ProviderError};
use super::token_client::TokenEndpoint;
use crate::config::RefreshConfig;
use crate::credential::{CredentialPatch, CredentialStore, Service, StoredCredential};
use crate::error::{FailureKind, GuardError, Result};

/// 刷新锁表的清理阈值
const LOCK_TABLE_LIMIT: usize = 1000;

/// `ensure_fresh` 的返回值：当前可用的访问 token
#[derive(Debug, Clone)]
pub struct FreshToken {
    /// 访问 token（明文）
    pub access_token: String,
    /// 过期时间（存储中没有记录时为空）
    pub expires_at: Option<DateTime<Utc>>,
}

/// 刷新统计信息
#[derive(Debug, Default, Clone)]
pub struct RefreshStats {
    /// 总刷新次数
    pub total_refreshes: u64,
    /// 成功刷新次数
    pub successful_refreshes: u64,
    /// 失败刷新次数
    pub failed_refreshes: u64,
    /// 搭车次数（等到锁后发现别人已刷新）
    pub joined_refreshes: u64,
    /// 最后刷新时间
    pub last_refresh_time: Option<DateTime<Utc>>,
    /// 最后失败时间
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// 刷新成功后的同步回调
type OnRefreshed = Box<dyn Fn(&StoredCredential) + Send + Sync>;

/// Token 刷新服务
///
/// 核心职责：
/// 1. 被动刷新：取 token 时检查是否临期并自动刷新
/// 2. 刷新锁：同一 `(账户, 服务)` 同时只有一次在途刷新
/// 3. 失败分类：只有授权被撤销才销毁存储的凭证
/// 4. 持久化重试：刷新成功后写库失败不浪费已换到的 token
#[derive(Clone)]
pub struct TokenRefreshService {
    store: Arc<CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    config: RefreshConfig,

    /// 刷新锁：`owner:service` -> Mutex，防止并发刷新同一凭证
    refresh_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,

    /// 刷新统计信息
    stats: Arc<RwLock<RefreshStats>>,

    /// 刷新成功后的回调（显式注册，同步调用）
    on_refreshed: Arc<RwLock<Option<OnRefreshed>>>,
}

impl TokenRefreshService {
    /// 创建刷新服务
    pub fn new(
        store: Arc<CredentialStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            store,
            endpoint,
            config,
            refresh_locks: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(RefreshStats::default())),
            on_refreshed: Arc::new(RwLock::new(None)),
        }
    }

    /// 使用默认配置创建刷新服务
    pub fn new_with_defaults(store: Arc<CredentialStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self::new(store, endpoint, RefreshConfig::default())
    }

    /// 注册刷新成功回调
    ///
    /// 回调在新 token 持久化之后、`ensure_fresh` 返回之前同步执行。
    pub async fn set_on_refreshed<F>(&self, callback: F)
    where
        F: Fn(&StoredCredential) + Send + Sync + 'static,
    {
        let mut slot = self.on_refreshed.write().await;
        *slot = Some(Box::new(callback));
    }

    /// 获取一个当前可用的访问 token，必要时先刷新
    ///
    /// - 未连接或没有访问 token：返回 `CredentialMissing`
    /// - 临期（过期时间 - 缓冲 < 现在）且有刷新 token：执行刷新
    /// - 没有刷新 token：无法刷新，原样返回现有 token
    pub async fn ensure_fresh(&self, owner_id: &str, service: Service) -> Result<FreshToken> {
        let cred = self.store.get(owner_id, service).await?;

        if !cred.connected {
            return Err(GuardError::credential_missing(owner_id, service.as_str()));
        }
        let Some(access_token) = cred.access_token.clone() else {
            return Err(GuardError::credential_missing(owner_id, service.as_str()));
        };

        let buffer = Duration::minutes(self.config.buffer_minutes);
        if !cred.expires_within(buffer) {
            debug!(owner_id, service = %service, "token is fresh, no refresh needed");
            return Ok(FreshToken {
                access_token,
                expires_at: cred.expires_at,
            });
        }

        if cred.refresh_token.is_none() {
            // 没有刷新 token 就无从刷新，把现有 token 交出去，
            // 由提供商决定是否还认账
            debug!(owner_id, service = %service, "token expiring but no refresh token available");
            return Ok(FreshToken {
                access_token,
                expires_at: cred.expires_at,
            });
        }

        self.refresh_detached(owner_id, service, false).await
    }

    /// 强制刷新，绕过临期检查
    pub async fn force_refresh(&self, owner_id: &str, service: Service) -> Result<FreshToken> {
        info!(owner_id, service = %service, "force refreshing token");
        self.refresh_detached(owner_id, service, true).await
    }

    /// 获取刷新统计信息
    pub async fn stats(&self) -> RefreshStats {
        self.stats.read().await.clone()
    }

    /// 清理刷新锁表
    ///
    /// 锁按键惰性创建且从不单独回收，超过阈值时整表清空。
    pub async fn cleanup_refresh_locks(&self) {
        let mut locks = self.refresh_locks.write().await;
        if locks.len() > LOCK_TABLE_LIMIT {
            locks.clear();
            debug!("cleared refresh lock table");
        }
    }

    /// 在独立任务中执行刷新
    ///
    /// 发起请求的调用方被取消时，在途刷新继续完成：
    /// 等锁的其他调用方依赖它的结果。
    async fn refresh_detached(
        &self,
        owner_id: &str,
        service: Service,
        force: bool,
    ) -> Result<FreshToken> {
        let this = self.clone();
        let owner = owner_id.to_string();

        let handle =
            tokio::spawn(async move { this.refresh_with_lock(&owner, service, force).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(GuardError::internal_with_source("refresh task failed", e)),
        }
    }

    /// 持锁刷新，防止并发刷新同一凭证
    async fn refresh_with_lock(
        &self,
        owner_id: &str,
        service: Service,
        force: bool,
    ) -> Result<FreshToken> {
        let refresh_lock = self.lock_for(owner_id, service).await;
        let _guard = refresh_lock.lock().await;

        // 获得锁后再次检查（其他调用方可能已经完成刷新）；
        // 强制刷新跳过该检查
        let cred = self.store.get(owner_id, service).await?;
        if !cred.connected {
            return Err(GuardError::credential_missing(owner_id, service.as_str()));
        }

        let buffer = Duration::minutes(self.config.buffer_minutes);
        if !force {
            if let Some(access_token) = cred.access_token.clone() {
                if !cred.expires_within(buffer) {
                    debug!(owner_id, service = %service, "token already refreshed by concurrent caller");
                    let mut stats = self.stats.write().await;
                    stats.joined_refreshes += 1;
                    return Ok(FreshToken {
                        access_token,
                        expires_at: cred.expires_at,
                    });
                }
            }
        }

        let Some(refresh_token) = cred.refresh_token.clone() else {
            // 等锁期间凭证被清空（并发撤销）
            return Err(GuardError::credential_missing(owner_id, service.as_str()));
        };

        self.perform_refresh(&cred, &refresh_token).await
    }

    /// 执行实际的提供商刷新并写回存储
    async fn perform_refresh(
        &self,
        cred: &StoredCredential,
        refresh_token: &str,
    ) -> Result<FreshToken> {
        let owner_id = cred.owner_id.as_str();
        let service = cred.service;

        {
            let mut stats = self.stats.write().await;
            stats.total_refreshes += 1;
        }

        let http_timeout = std::time::Duration::from_secs(self.config.http_timeout_secs);
        let outcome = match tokio::time::timeout(
            http_timeout,
            self.endpoint.refresh_grant(service, refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout()),
        };

        match outcome {
            Ok(refreshed) => {
                // 部分更新：提供商未轮换刷新 token 时绝不清掉旧值
                let patch = CredentialPatch {
                    access_token: Some(refreshed.access_token.clone()),
                    refresh_token: refreshed.refresh_token.clone(),
                    expires_at: Some(refreshed.expires_at),
                    connected: None,
                };
                self.persist_with_retry(owner_id, service, &patch).await?;

                {
                    let mut stats = self.stats.write().await;
                    stats.successful_refreshes += 1;
                    stats.last_refresh_time = Some(Utc::now());
                }

                let updated = StoredCredential {
                    owner_id: owner_id.to_string(),
                    service,
                    access_token: Some(refreshed.access_token.clone()),
                    refresh_token: refreshed
                        .refresh_token
                        .clone()
                        .or_else(|| Some(refresh_token.to_string())),
                    expires_at: Some(refreshed.expires_at),
                    connected: true,
                };
                if let Some(callback) = self.on_refreshed.read().await.as_ref() {
                    callback(&updated);
                }

                info!(owner_id, service = %service, "token refreshed successfully");
                Ok(FreshToken {
                    access_token: refreshed.access_token,
                    expires_at: Some(refreshed.expires_at),
                })
            }

            Err(provider_error) => {
                let kind = classify(&provider_error);
                {
                    let mut stats = self.stats.write().await;
                    stats.failed_refreshes += 1;
                    stats.last_failure_time = Some(Utc::now());
                }

                if kind == FailureKind::Revoked {
                    warn!(
                        owner_id,
                        service = %service,
                        error = %provider_error,
                        "refresh grant revoked by provider, clearing stored credential"
                    );
                    if let Err(e) = self.store.clear(owner_id, service).await {
                        error!(owner_id, service = %service, error = %e, "failed to clear revoked credential");
                    }
                    return Err(GuardError::refresh_failed(
                        service.as_str(),
                        FailureKind::Revoked,
                        "authorization revoked by provider; reconnect the integration in Settings",
                    ));
                }

                // 暂时性失败或限流：不动存储，调用方可带旧 token 重试
                warn!(owner_id, service = %service, error = %provider_error, kind = %kind, "token refresh failed");
                Err(GuardError::refresh_failed(
                    service.as_str(),
                    kind,
                    provider_error.to_string(),
                ))
            }
        }
    }

    /// 持久化刷新结果，失败时带着内存中的新 token 重试
    ///
    /// 写库的暂时性失败不应该迫使下一次调用再向提供商刷新一遍。
    async fn persist_with_retry(
        &self,
        owner_id: &str,
        service: Service,
        patch: &CredentialPatch,
    ) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.store.update(owner_id, service, patch).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt >= self.config.persist_retry_attempts {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        owner_id,
                        service = %service,
                        attempt,
                        error = %e,
                        "persisting refreshed token failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        self.config.persist_retry_interval_ms,
                    ))
                    .await;
                }
            }
        }
    }

    /// 获取某键的刷新锁
    async fn lock_for(&self, owner_id: &str, service: Service) -> Arc<Mutex<()>> {
        let key = format!("{owner_id}:{service}");
        let mut locks = self.refresh_locks.write().await;
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

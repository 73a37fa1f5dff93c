//! # 测试 Fixtures
//!
//! 提供预装配的组件栈与常用测试数据。

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::mocks::{MemoryCredentialRepository, MockTokenEndpoint};
use crate::config::{DecryptionMode, RefreshConfig, SecretCipher};
use crate::credential::{CredentialPatch, CredentialStore, Service};
use crate::gateway::OutboundGateway;
use crate::oauth::TokenRefreshService;
use crate::rate_limit::RateLimiter;

/// 固定测试密钥的加密器
#[must_use]
pub fn test_cipher() -> SecretCipher {
    SecretCipher::new(&[42u8; 32], DecryptionMode::LegacyPassthrough)
}

/// 生成随机账户 ID
#[must_use]
pub fn random_owner_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 相对当前时间偏移若干分钟的时间戳
#[must_use]
pub fn minutes_from_now(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

/// 预装配的完整组件栈（内存仓储 + mock 端点）
///
/// 每个实例的状态互相独立，没有共享的进程级状态。
pub struct TestStack {
    pub repository: Arc<MemoryCredentialRepository>,
    pub store: Arc<CredentialStore>,
    pub endpoint: Arc<MockTokenEndpoint>,
    pub refresher: Arc<TokenRefreshService>,
    pub limiter: Arc<RateLimiter>,
    pub gateway: OutboundGateway,
}

impl TestStack {
    /// 用测试友好的刷新配置（短重试间隔）装配组件栈
    #[must_use]
    pub fn new() -> Self {
        Self::with_refresh_config(RefreshConfig {
            persist_retry_interval_ms: 10,
            ..RefreshConfig::default()
        })
    }

    /// 用指定刷新配置装配组件栈
    #[must_use]
    pub fn with_refresh_config(config: RefreshConfig) -> Self {
        let repository = Arc::new(MemoryCredentialRepository::new());
        let store = Arc::new(CredentialStore::new(
            repository.clone(),
            Arc::new(test_cipher()),
        ));
        let endpoint = Arc::new(MockTokenEndpoint::new());
        let refresher = Arc::new(TokenRefreshService::new(
            store.clone(),
            endpoint.clone(),
            config,
        ));
        let limiter = Arc::new(RateLimiter::new());
        let gateway = OutboundGateway::new(limiter.clone(), refresher.clone(), store.clone());

        Self {
            repository,
            store,
            endpoint,
            refresher,
            limiter,
            gateway,
        }
    }

    /// 确保账户存在（不覆盖已有凭证）
    pub fn ensure_account(&self, owner_id: &str) {
        if self.repository.raw(owner_id, Service::Drive).is_none() {
            self.repository.add_account(owner_id);
        }
    }

    /// 写入一条已连接的凭证（访问 + 刷新 token）
    pub async fn seed_connected(
        &self,
        owner_id: &str,
        service: Service,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.ensure_account(owner_id);
        self.store
            .update(
                owner_id,
                service,
                &CredentialPatch {
                    access_token: Some("seed-access-token".to_string()),
                    refresh_token: Some("seed-refresh-token".to_string()),
                    expires_at,
                    connected: Some(true),
                },
            )
            .await
            .expect("seed credential");
    }

    /// 写入一条只有访问 token、无法刷新的凭证
    pub async fn seed_access_only(
        &self,
        owner_id: &str,
        service: Service,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.ensure_account(owner_id);
        self.store
            .update(
                owner_id,
                service,
                &CredentialPatch {
                    access_token: Some("seed-access-token".to_string()),
                    refresh_token: None,
                    expires_at,
                    connected: Some(true),
                },
            )
            .await
            .expect("seed credential");
    }
}

impl Default for TestStack {
    fn default() -> Self {
        Self::new()
    }
}

//! # 测试 Mock 对象
//!
//! 内存凭证仓储与可编程的 token 端点。

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use crate::credential::{CredentialPatch, CredentialRecord, CredentialRepository, Service};
use crate::error::{GuardError, Result};
use crate::oauth::{ProviderError, RefreshedToken, TokenEndpoint};

/// 内存凭证仓储
///
/// 语义与 Sea-ORM 实现保持一致：账户必须先存在（`add_account`），
/// 对不存在账户的写入报数据库错误。支持注入若干次写入失败，
/// 用于持久化重试路径的测试。
#[derive(Debug, Default)]
pub struct MemoryCredentialRepository {
    records: DashMap<String, CredentialRecord>,
    fail_saves: AtomicU32,
    save_calls: AtomicU32,
}

impl MemoryCredentialRepository {
    /// 创建空仓储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册账户：为所有服务建立空凭证记录
    pub fn add_account(&self, owner_id: &str) {
        for service in Service::ALL {
            self.records
                .insert(Self::key(owner_id, service), CredentialRecord::default());
        }
    }

    /// 直接写入一条原始记录（绕过部分更新语义）
    pub fn insert(&self, owner_id: &str, service: Service, record: CredentialRecord) {
        self.records.insert(Self::key(owner_id, service), record);
    }

    /// 读取原始（静态存储形态）记录
    #[must_use]
    pub fn raw(&self, owner_id: &str, service: Service) -> Option<CredentialRecord> {
        self.records
            .get(&Self::key(owner_id, service))
            .map(|r| r.value().clone())
    }

    /// 让接下来的 `n` 次 `save` 失败
    pub fn fail_next_saves(&self, n: u32) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    /// `save` 被调用的次数（含失败的）
    #[must_use]
    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn key(owner_id: &str, service: Service) -> String {
        format!("{owner_id}:{service}")
    }
}

#[async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    async fn load(&self, owner_id: &str, service: Service) -> Result<Option<CredentialRecord>> {
        Ok(self.raw(owner_id, service))
    }

    async fn save(&self, owner_id: &str, service: Service, patch: &CredentialPatch) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GuardError::database("injected save failure"));
        }

        let mut record = self
            .records
            .get_mut(&Self::key(owner_id, service))
            .ok_or_else(|| GuardError::database(format!("account not found: {owner_id}")))?;

        if let Some(v) = &patch.access_token {
            record.access_token = Some(v.clone());
        }
        if let Some(v) = &patch.refresh_token {
            record.refresh_token = Some(v.clone());
        }
        if let Some(v) = patch.expires_at {
            record.token_expiry = Some(v);
        }
        if let Some(v) = patch.connected {
            record.connected = v;
        }

        Ok(())
    }

    async fn clear(&self, owner_id: &str, service: Service) -> Result<()> {
        let mut record = self
            .records
            .get_mut(&Self::key(owner_id, service))
            .ok_or_else(|| GuardError::database(format!("account not found: {owner_id}")))?;

        *record = CredentialRecord::default();
        Ok(())
    }
}

/// 可编程的 mock token 端点
///
/// 默认每次返回一个新 token；可压入脚本化响应、设置响应延迟，
/// 并统计真实被调用的次数（单飞语义的断言依据）。
#[derive(Default)]
pub struct MockTokenEndpoint {
    script: Mutex<VecDeque<std::result::Result<RefreshedToken, ProviderError>>>,
    delay: Mutex<Option<std::time::Duration>>,
    calls: AtomicU32,
}

impl MockTokenEndpoint {
    /// 创建 mock 端点
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 压入一条脚本化响应（按先进先出消费）
    pub async fn push_response(
        &self,
        response: std::result::Result<RefreshedToken, ProviderError>,
    ) {
        self.script.lock().await.push_back(response);
    }

    /// 设置每次响应前的延迟（模拟在途刷新）
    pub async fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// 真实刷新调用次数
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 默认成功响应
    #[must_use]
    pub fn fresh_token(n: u32) -> RefreshedToken {
        RefreshedToken {
            access_token: format!("mock-access-token-{n}"),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn refresh_grant(
        &self,
        _service: Service,
        _refresh_token: &str,
    ) -> std::result::Result<RefreshedToken, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(scripted) = self.script.lock().await.pop_front() {
            return scripted;
        }

        Ok(Self::fresh_token(n))
    }
}

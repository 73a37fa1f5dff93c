//! # 出站调用门面
//!
//! 业务代码访问外部服务的唯一入口：先过速率限制，再保证访问
//! token 可用，然后执行真正的提供商调用；失败经分类后以类型化
//! 错误重新抛出。
//!
//! 顺序保证：速率限制在任何网络出口之前生效；token 刷新发生在
//! 业务调用之前，避免可预见的 401。

use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

use crate::credential::{CredentialStore, Service};
use crate::error::{FailureKind, GuardError, Result};
use crate::oauth::{classify, ProviderError, TokenRefreshService};
use crate::rate_limit::RateLimiter;

/// 出站调用门面
///
/// 组合速率限制器、刷新服务与凭证存取，全部按 `Arc` 注入，
/// 测试可以独立装配。
pub struct OutboundGateway {
    limiter: Arc<RateLimiter>,
    refresher: Arc<TokenRefreshService>,
    store: Arc<CredentialStore>,
}

impl OutboundGateway {
    /// 创建出站门面
    pub fn new(
        limiter: Arc<RateLimiter>,
        refresher: Arc<TokenRefreshService>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            limiter,
            refresher,
            store,
        }
    }

    /// 执行一次需要授权的提供商调用
    ///
    /// 流程：速率限制 → `ensure_fresh` → 以可用 token 调用 `call`。
    /// `call` 返回的 [`ProviderError`] 会被分类后重新抛出；
    /// 分类为 `Revoked` 时同时清空存储的凭证。
    ///
    /// [`GuardError::RateLimitExceeded`] 只会产生于 `call` 执行之前。
    pub async fn with_authorized_call<T, F, Fut>(
        &self,
        owner_id: &str,
        service: Service,
        max_per_window: u32,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        self.limiter.check(service.as_str(), owner_id, max_per_window)?;

        let fresh = self.refresher.ensure_fresh(owner_id, service).await?;

        match call(fresh.access_token).await {
            Ok(value) => Ok(value),
            Err(provider_error) => {
                let kind = classify(&provider_error);
                if kind == FailureKind::Revoked {
                    warn!(
                        owner_id,
                        service = %service,
                        error = %provider_error,
                        "provider reported revoked grant during call, clearing credential"
                    );
                    if let Err(e) = self.store.clear(owner_id, service).await {
                        error!(owner_id, service = %service, error = %e, "failed to clear revoked credential");
                    }
                    return Err(GuardError::provider_call(
                        service.as_str(),
                        FailureKind::Revoked,
                        "authorization revoked by provider; reconnect the integration in Settings",
                    ));
                }

                Err(GuardError::provider_call(
                    service.as_str(),
                    kind,
                    provider_error.to_string(),
                ))
            }
        }
    }

    /// 执行一次只需限流、无需 OAuth 的出站调用（如 SMTP 发信）
    ///
    /// `key` 必填；仅在调用无法归属到账户时使用
    /// [`crate::rate_limit::GLOBAL_KEY`]。
    pub async fn with_limited_call<T, F, Fut>(
        &self,
        scope: &str,
        key: &str,
        max_per_window: u32,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        self.limiter.check(scope, key, max_per_window)?;

        call().await.map_err(|provider_error| {
            GuardError::provider_call(scope, classify(&provider_error), provider_error.to_string())
        })
    }

    /// 刷新服务访问器，供仅需 token 而无网络调用的场景
    /// （如给前端选择器签发 token）直接使用
    #[must_use]
    pub fn refresher(&self) -> &Arc<TokenRefreshService> {
        &self.refresher
    }
}

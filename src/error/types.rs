//! # 错误类型定义

use thiserror::Error;

use super::ErrorCategory;

/// 外部调用失败的分类结果
///
/// 由 `oauth::classifier` 产出，决定凭证层对失败的处置方式：
/// 只有 `Revoked` 会销毁已存储的凭证。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// 暂时性失败（网络、5xx、超时），可稍后重试
    Transient,
    /// 提供商限流（429 或配额错误码），调用方应退避
    RateLimited,
    /// 授权已被永久撤销（invalid_grant），必须重新授权
    Revoked,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Revoked => "revoked",
        };
        write!(f, "{s}")
    }
}

/// 凭证层主要错误类型
#[derive(Debug, Error)]
pub enum GuardError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 加密配置或加解密错误（启动期出现视为致命）
    #[error("加密错误: {message}")]
    Encryption {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 账户没有可用的授权凭证，需要用户（重新）授权
    #[error("凭证缺失: {owner_id}/{service}，请在设置中连接该服务")]
    CredentialMissing { owner_id: String, service: String },

    /// Token 刷新失败
    #[error("token 刷新失败 ({service}, {kind}): {message}")]
    RefreshFailed {
        service: String,
        kind: FailureKind,
        message: String,
    },

    /// 速率限制：当前窗口内的调用数已达上限
    #[error("速率限制: {scope}:{key} 超过每窗口 {limit} 次")]
    RateLimitExceeded {
        scope: String,
        key: String,
        limit: u32,
    },

    /// 已通过鉴权的外部调用失败（经分类后重新抛出）
    #[error("外部调用失败 ({target}, {kind}): {message}")]
    ProviderCall {
        target: String,
        kind: FailureKind,
        message: String,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 带上下文的包装错误
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<GuardError>,
    },
}

impl GuardError {
    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建加密错误
    pub fn encryption<T: Into<String>>(message: T) -> Self {
        Self::Encryption {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的加密错误
    pub fn encryption_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Encryption {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建网络错误
    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建凭证缺失错误
    pub fn credential_missing<O: Into<String>, S: Into<String>>(owner_id: O, service: S) -> Self {
        Self::CredentialMissing {
            owner_id: owner_id.into(),
            service: service.into(),
        }
    }

    /// 创建 token 刷新失败错误
    pub fn refresh_failed<S: Into<String>, M: Into<String>>(
        service: S,
        kind: FailureKind,
        message: M,
    ) -> Self {
        Self::RefreshFailed {
            service: service.into(),
            kind,
            message: message.into(),
        }
    }

    /// 创建速率限制错误
    pub fn rate_limit_exceeded<S: Into<String>, K: Into<String>>(
        scope: S,
        key: K,
        limit: u32,
    ) -> Self {
        Self::RateLimitExceeded {
            scope: scope.into(),
            key: key.into(),
            limit,
        }
    }

    /// 创建外部调用失败错误
    pub fn provider_call<T: Into<String>, M: Into<String>>(
        target: T,
        kind: FailureKind,
        message: M,
    ) -> Self {
        Self::ProviderCall {
            target: target.into(),
            kind,
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 判断错误是否值得调用方重试
    ///
    /// `Revoked` 与 `CredentialMissing` 在重新授权前重试没有意义。
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Database { .. } => true,
            Self::RefreshFailed { kind, .. } | Self::ProviderCall { kind, .. } => {
                !matches!(kind, FailureKind::Revoked)
            }
            Self::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// 错误归类，用于监控告警
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialMissing { .. } | Self::RateLimitExceeded { .. } => {
                ErrorCategory::Client
            }
            Self::RefreshFailed { kind, .. } | Self::ProviderCall { kind, .. } => match kind {
                FailureKind::Revoked | FailureKind::RateLimited => ErrorCategory::Client,
                FailureKind::Transient => ErrorCategory::Server,
            },
            Self::Context { source, .. } => source.category(),
            _ => ErrorCategory::Server,
        }
    }
}

// 常见底层错误的自动转换
impl From<sea_orm::DbErr> for GuardError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::database_with_source("database operation failed", err)
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("http request failed", err)
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("failed to parse config file", err)
    }
}

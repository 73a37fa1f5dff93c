//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use super::crypto::EncryptionConfig;
use super::database::DatabaseConfig;
use crate::credential::Service;
use crate::ensure_config;

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 静态加密配置
    pub encryption: EncryptionConfig,
    /// 各外部服务的 OAuth 客户端配置
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// 出站调用速率限制配置
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// token 刷新行为配置
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// 单个服务的 OAuth 客户端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// OAuth 客户端 ID
    pub client_id: String,
    /// OAuth 客户端密钥
    pub client_secret: String,
    /// 授权回调地址
    pub redirect_uri: String,
    /// token 端点，默认为 Google 的统一端点
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// 申请的权限范围
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// 各服务 OAuth 客户端配置集合
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub drive: OAuthClientConfig,
    #[serde(default)]
    pub sheets: OAuthClientConfig,
    #[serde(default)]
    pub calendar: OAuthClientConfig,
}

impl OAuthConfig {
    /// 获取指定服务的客户端配置
    #[must_use]
    pub fn client_for(&self, service: Service) -> &OAuthClientConfig {
        match service {
            Service::Drive => &self.drive,
            Service::Sheets => &self.sheets,
            Service::Calendar => &self.calendar,
        }
    }
}

/// 速率限制配置
///
/// 固定窗口，窗口长度与各 scope 的每窗口上限。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 窗口长度（秒）
    pub window_secs: u64,
    /// Drive 每窗口调用上限
    pub drive: u32,
    /// Sheets 每窗口调用上限
    pub sheets: u32,
    /// 日历每窗口调用上限
    pub calendar: u32,
    /// SMTP 每窗口调用上限
    pub smtp: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            drive: 60,
            sheets: 60,
            calendar: 60,
            smtp: 60,
        }
    }
}

impl RateLimitConfig {
    /// 按 scope 名称查询上限
    #[must_use]
    pub fn limit_for(&self, scope: &str) -> Option<u32> {
        match scope {
            "drive" => Some(self.drive),
            "sheets" => Some(self.sheets),
            "calendar" => Some(self.calendar),
            "smtp" => Some(self.smtp),
            _ => None,
        }
    }
}

/// token 刷新行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// 提前刷新时间（分钟），在 token 过期前多久开始刷新
    pub buffer_minutes: i64,
    /// 刷新请求的 HTTP 超时（秒）
    pub http_timeout_secs: u64,
    /// 刷新成功后持久化失败时的重试次数
    pub persist_retry_attempts: u32,
    /// 持久化重试间隔（毫秒）
    pub persist_retry_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            buffer_minutes: 5,              // 提前5分钟刷新
            http_timeout_secs: 30,          // 刷新请求30秒超时
            persist_retry_attempts: 2,      // 持久化最多重试2次
            persist_retry_interval_ms: 200, // 重试间隔200毫秒
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> crate::error::Result<()> {
        ensure_config!(!self.database.url.is_empty(), "Database URL cannot be empty");
        ensure_config!(
            self.database.max_connections > 0,
            "Database max_connections must be greater than 0"
        );

        // 加密密钥必须提供；若声明为十六进制原始密钥则长度必须匹配
        self.encryption.validate()?;

        ensure_config!(
            self.rate_limit.window_secs > 0,
            "rate_limit.window_secs must be greater than 0"
        );

        for (name, client) in [
            ("drive", &self.oauth.drive),
            ("sheets", &self.oauth.sheets),
            ("calendar", &self.oauth.calendar),
        ] {
            if client.client_id.is_empty() {
                // 未配置的服务保持未连接即可，不视为错误
                continue;
            }
            ensure_config!(
                !client.client_secret.is_empty(),
                "oauth.{}.client_secret must be provided when client_id is set",
                name
            );
            ensure_config!(
                url::Url::parse(&client.redirect_uri).is_ok(),
                "oauth.{}.redirect_uri is not a valid URL: {}",
                name,
                client.redirect_uri
            );
            ensure_config!(
                url::Url::parse(&client.token_url).is_ok(),
                "oauth.{}.token_url is not a valid URL: {}",
                name,
                client.token_url
            );
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            encryption: EncryptionConfig::default(),
            oauth: OAuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

//! # Token 刷新客户端
//!
//! 实现 OAuth 2.0 refresh_token 授权类型：用长期刷新 token 向
//! 提供商的 token 端点换取新的短期访问 token。

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::classifier::ProviderError;
use crate::config::OAuthConfig;
use crate::credential::Service;
use crate::error::{GuardError, Result};

/// 访问 token 的默认有效期（提供商未给出 expires_in 时使用）
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// token 端点的原始响应
///
/// 错误响应与成功响应共用一个结构：错误时 `error` 字段非空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    /// 绝对过期时间（毫秒时间戳），部分客户端库回传此字段
    pub expiry_date: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    // 错误响应字段
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// 一次成功刷新的结果
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    /// 新的访问 token
    pub access_token: String,
    /// 轮换后的刷新 token（提供商未轮换时为空）
    pub refresh_token: Option<String>,
    /// 新的过期时间
    pub expires_at: DateTime<Utc>,
}

/// token 刷新端点抽象
///
/// 刷新服务只依赖这个 trait，测试注入可编程的 mock 端点。
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// 执行 refresh_token 授权请求
    async fn refresh_grant(
        &self,
        service: Service,
        refresh_token: &str,
    ) -> std::result::Result<RefreshedToken, ProviderError>;
}

/// Google token 端点客户端
#[derive(Debug, Clone)]
pub struct GoogleTokenClient {
    http_client: reqwest::Client,
    oauth: OAuthConfig,
}

impl GoogleTokenClient {
    /// 创建刷新客户端，HTTP 超时必须有界
    pub fn new(oauth: OAuthConfig, http_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent("integration-guard/0.1")
            .build()
            .map_err(|e| GuardError::internal_with_source("failed to build http client", e))?;

        Ok(Self { http_client, oauth })
    }

    fn parse_expiry(response: &TokenResponse) -> DateTime<Utc> {
        if let Some(expiry_ms) = response.expiry_date {
            if let Some(at) = Utc.timestamp_millis_opt(expiry_ms).single() {
                return at;
            }
        }
        let seconds = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Utc::now() + chrono::Duration::seconds(seconds)
    }
}

#[async_trait]
impl TokenEndpoint for GoogleTokenClient {
    async fn refresh_grant(
        &self,
        service: Service,
        refresh_token: &str,
    ) -> std::result::Result<RefreshedToken, ProviderError> {
        let config = self.oauth.client_for(service);

        // 构建刷新请求
        let mut form_params = HashMap::new();
        form_params.insert("grant_type".to_string(), "refresh_token".to_string());
        form_params.insert("client_id".to_string(), config.client_id.clone());
        form_params.insert("client_secret".to_string(), config.client_secret.clone());
        form_params.insert("refresh_token".to_string(), refresh_token.to_string());

        debug!(service = %service, token_url = %config.token_url, "sending token refresh request");

        let response = self
            .http_client
            .post(&config.token_url)
            .header("Accept", "application/json")
            .form(&form_params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout()
                } else {
                    ProviderError::network(format!("token refresh request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read token response: {e}")))?;

        let parsed = serde_json::from_str::<TokenResponse>(&body).ok();

        if !status.is_success() {
            let (code, description) = parsed
                .map(|p| (p.error, p.error_description))
                .unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), code, description));
        }

        let Some(parsed) = parsed else {
            return Err(ProviderError::network(format!(
                "failed to parse token response (status {status})"
            )));
        };

        // 个别提供商对错误也返回 200
        if parsed.error.is_some() {
            return Err(ProviderError::http(
                status.as_u16(),
                parsed.error,
                parsed.error_description,
            ));
        }

        let Some(access_token) = parsed.access_token.clone() else {
            return Err(ProviderError::network(
                "token response did not contain access_token",
            ));
        };

        let expires_at = Self::parse_expiry(&parsed);

        Ok(RefreshedToken {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_at,
        })
    }
}

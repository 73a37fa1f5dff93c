//! # 外部调用失败分类
//!
//! 检视一次失败的提供商调用，归入 {transient, rate_limited, revoked}
//! 三类。分类结果决定凭证层的处置：只有 `Revoked` 会触发凭证销毁，
//! 其余两类仅向调用方呈报。

use crate::error::FailureKind;

/// 一次失败的提供商调用的结构化描述
///
/// 刷新请求和业务包装调用（`OutboundGateway` 的 `fn`）都以此类型
/// 报告失败，使分类逻辑只需要写一份。
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// HTTP 状态码（网络层失败时为空）
    pub status: Option<u16>,
    /// 提供商错误体中的错误码（如 invalid_grant）
    pub code: Option<String>,
    /// 提供商错误体中的描述
    pub description: Option<String>,
    /// 是否为超时
    pub timed_out: bool,
    /// 可读的失败信息
    pub message: String,
}

impl ProviderError {
    /// 网络层失败（未收到 HTTP 响应）
    #[must_use]
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self {
            status: None,
            code: None,
            description: None,
            timed_out: false,
            message: message.into(),
        }
    }

    /// 请求超时
    #[must_use]
    pub fn timeout() -> Self {
        Self {
            status: None,
            code: None,
            description: None,
            timed_out: true,
            message: "provider request timed out".to_string(),
        }
    }

    /// 收到 HTTP 错误响应
    #[must_use]
    pub fn http(status: u16, code: Option<String>, description: Option<String>) -> Self {
        let message = match (&code, &description) {
            (Some(c), Some(d)) => format!("HTTP {status}: {c}: {d}"),
            (Some(c), None) => format!("HTTP {status}: {c}"),
            _ => format!("HTTP {status}"),
        };
        Self {
            status: Some(status),
            code,
            description,
            timed_out: false,
            message,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// 归一化错误码便于匹配：Google 的错误码同时存在
/// snake_case（OAuth 端点）与 camelCase（Drive/Sheets API）两种拼写
fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// 对失败的提供商调用进行分类
#[must_use]
pub fn classify(error: &ProviderError) -> FailureKind {
    if let Some(code) = &error.code {
        match normalize(code).as_str() {
            // 授权永久失效：刷新 token 被撤销、过期或已在别处轮换
            "invalidgrant" | "invalidrapt" => return FailureKind::Revoked,
            "ratelimitexceeded"
            | "userratelimitexceeded"
            | "quotaexceeded"
            | "dailylimitexceeded" => return FailureKind::RateLimited,
            _ => {}
        }
    }

    if error
        .description
        .as_deref()
        .is_some_and(|d| d.contains("expired or revoked"))
    {
        return FailureKind::Revoked;
    }

    if error.status == Some(429) {
        return FailureKind::RateLimited;
    }

    FailureKind::Transient
}

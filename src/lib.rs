//! # Integration Guard Library
//!
//! 论文管理平台的 OAuth 凭证生命周期与出站调用守卫核心库。
//! 所有对第三方 API（Drive / Sheets / Calendar）和 SMTP 的出站
//! 调用都经由这里：静态加密存储长期凭证、透明刷新临期 token、
//! 识别被永久撤销的授权，并对出站调用限流。

pub mod config;
pub mod credential;
pub mod database;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod oauth;
pub mod rate_limit;
pub mod testing;

// Re-export commonly used types
pub use config::{AppConfig, SecretCipher};
pub use credential::{CredentialPatch, CredentialStore, Service, StoredCredential};
pub use error::{FailureKind, GuardError, Result};
pub use gateway::OutboundGateway;
pub use oauth::TokenRefreshService;
pub use rate_limit::RateLimiter;

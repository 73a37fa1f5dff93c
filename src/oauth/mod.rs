//! # OAuth 模块
//!
//! 外部服务访问 token 的生命周期管理：刷新请求的发送与解析、
//! 失败分类，以及带单飞语义的刷新服务。

pub mod classifier;
pub mod refresh;
pub mod token_client;

pub use classifier::{classify, ProviderError};
pub use refresh::{FreshToken, RefreshStats, TokenRefreshService};
pub use token_client::{GoogleTokenClient, RefreshedToken, TokenEndpoint};

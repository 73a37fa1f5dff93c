//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod crypto;
mod database;

pub use app_config::{
    AppConfig, OAuthClientConfig, OAuthConfig, RateLimitConfig, RefreshConfig,
};
pub use crypto::{DecryptionMode, EncryptionConfig, SecretCipher};
pub use database::DatabaseConfig;

use std::env;
use std::path::Path;

/// 加载配置文件
///
/// 按 `RUST_ENV` 选择 `config/config.{env}.toml`；
/// `GUARD_ENCRYPTION_KEY` 环境变量优先于文件中的加密密钥。
pub fn load_config() -> crate::error::Result<AppConfig> {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/config.{env}.toml");

    if !Path::new(&config_file).exists() {
        return Err(crate::config_error!("配置文件不存在: {}", config_file));
    }

    let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
        crate::error::GuardError::config_with_source(format!("读取配置文件失败: {config_file}"), e)
    })?;

    let mut config: AppConfig = toml::from_str(&config_content)?;

    if let Ok(key) = env::var("GUARD_ENCRYPTION_KEY") {
        config.encryption.key = key;
    }

    // 验证配置的有效性
    config.validate()?;

    Ok(config)
}

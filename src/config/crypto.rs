//! # 凭证加密模块
//!
//! 处理外部服务 token 的静态加密和解密。
//!
//! 密文格式为 `iv:tag:ciphertext` 三段十六进制文本，AES-256-GCM，
//! 每次加密生成新的随机 IV。解密失败时的行为由 [`DecryptionMode`]
//! 决定：迁移窗口内对历史明文值放行，严格模式下直接报错。

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{GuardError, Result};

/// GCM 随机数长度（字节）
const NONCE_LEN: usize = 12;
/// GCM 认证标签长度（字节）
const TAG_LEN: usize = 16;

/// 解密失败时的处置模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptionMode {
    /// 迁移兼容模式：无法解密的值视为历史明文，告警后原样返回
    LegacyPassthrough,
    /// 严格模式：格式错误或密钥不匹配一律报错
    Strict,
}

impl Default for DecryptionMode {
    fn default() -> Self {
        Self::LegacyPassthrough
    }
}

/// 静态加密配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// 加密密钥：64 位十六进制字符串（32 字节原始密钥），
    /// 或任意口令（经 SHA-256 派生，强度较弱，启动时告警）
    pub key: String,
    /// 解密失败处置模式
    #[serde(default)]
    pub mode: DecryptionMode,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            mode: DecryptionMode::default(),
        }
    }
}

impl EncryptionConfig {
    /// 验证加密配置；密钥缺失属于致命的启动错误
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(GuardError::encryption(
                "加密密钥未配置（encryption.key 或 GUARD_ENCRYPTION_KEY）",
            ));
        }
        if self.key.len() == 64 && hex::decode(&self.key).is_err() {
            return Err(GuardError::encryption(
                "加密密钥长度为64但不是合法的十六进制字符串",
            ));
        }
        Ok(())
    }

    /// 测试用配置：全零密钥 + 默认模式
    #[must_use]
    pub fn new_for_tests() -> Self {
        Self {
            key: "0".repeat(64),
            mode: DecryptionMode::default(),
        }
    }
}

/// 凭证加密器
pub struct SecretCipher {
    cipher: Aes256Gcm,
    mode: DecryptionMode,
}

impl SecretCipher {
    /// 从原始 32 字节密钥创建加密器
    #[must_use]
    pub fn new(key: &[u8; 32], mode: DecryptionMode) -> Self {
        let key: [u8; 32] = *key;
        let key = key.into();
        let cipher = Aes256Gcm::new(&key);
        Self { cipher, mode }
    }

    /// 从配置创建加密器
    ///
    /// 64 位十六进制字符串按原始密钥解析；其他任意字符串经 SHA-256
    /// 派生为 32 字节密钥并告警（派生密钥强度低于随机密钥）。
    pub fn from_config(config: &EncryptionConfig) -> Result<Self> {
        config.validate()?;

        let key_bytes = if config.key.len() == 64 {
            hex::decode(&config.key)
                .map_err(|e| GuardError::encryption_with_source("加密密钥格式错误", e))?
        } else {
            warn!(
                "encryption key is not a 64-char hex string; deriving key from passphrase \
                 via SHA-256 (weaker than a random 32-byte key)"
            );
            Sha256::digest(config.key.as_bytes()).to_vec()
        };

        let key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| GuardError::encryption("加密密钥必须是32字节"))?;

        Ok(Self::new(&key, config.mode))
    }

    /// 加密字符串
    ///
    /// 对已经是 `iv:tag:ciphertext` 格式的输入原样返回，
    /// 使重复写入路径无需维护"是否已加密"标记。
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if Self::looks_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| {
                GuardError::encryption_with_source(
                    "凭证加密失败",
                    anyhow::anyhow!("AES-GCM encryption failed: {e}"),
                )
            })?;

        // aes-gcm 输出为 密文||标签，按格式拆开
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// 解密字符串
    ///
    /// 格式错误或密钥不匹配时按 [`DecryptionMode`] 处置：
    /// 兼容模式下告警并原样返回输入，严格模式下返回错误。
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let Some((nonce_bytes, tag, ciphertext)) = Self::parse_blob(blob) else {
            return self.fallback(blob, "value is not a valid iv:tag:ciphertext blob");
        };

        let nonce = aes_gcm::Nonce::from_slice(&nonce_bytes);
        let combined = [ciphertext, tag].concat();

        match self.cipher.decrypt(nonce, combined.as_ref()) {
            Ok(plaintext) => String::from_utf8(plaintext)
                .map_err(|e| GuardError::encryption_with_source("解密后的数据不是有效的UTF-8", e)),
            Err(e) => self.fallback(blob, &format!("AES-GCM decryption failed: {e}")),
        }
    }

    /// 生成新的加密密钥
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        hex::encode(key)
    }

    /// 判断输入是否已经是密文格式
    #[must_use]
    pub fn looks_encrypted(value: &str) -> bool {
        Self::parse_blob(value).is_some()
    }

    fn fallback(&self, blob: &str, reason: &str) -> Result<String> {
        match self.mode {
            DecryptionMode::LegacyPassthrough => {
                // 迁移窗口：历史明文值放行，不中断调用方
                warn!(reason, "decryption fallback: passing value through as-is");
                Ok(blob.to_string())
            }
            DecryptionMode::Strict => Err(GuardError::encryption(format!(
                "凭证解密失败: {reason}"
            ))),
        }
    }

    /// 解析 `iv:tag:ciphertext` 三段十六进制格式
    fn parse_blob(value: &str) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let mut parts = value.split(':');
        let (iv, tag, ct) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let iv = hex::decode(iv).ok()?;
        let tag = hex::decode(tag).ok()?;
        let ct = hex::decode(ct).ok()?;

        if iv.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return None;
        }

        Some((iv, tag, ct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(mode: DecryptionMode) -> SecretCipher {
        SecretCipher::new(&[7u8; 32], mode)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = cipher(DecryptionMode::Strict);

        let plaintext = "ya29.a0AfH6SMBx-sensitive-access-token";
        let encrypted = crypto.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(encrypted.split(':').count(), 3);

        let decrypted = crypto.decrypt(&encrypted).unwrap();
        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_encrypt_is_idempotent_on_blob_format() {
        let crypto = cipher(DecryptionMode::Strict);

        let encrypted = crypto.encrypt("refresh-token-1").unwrap();
        let twice = crypto.encrypt(&encrypted).unwrap();
        assert_eq!(encrypted, twice);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let crypto = cipher(DecryptionMode::Strict);

        let a = crypto.encrypt("same input").unwrap();
        let b = crypto.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_passthrough_on_legacy_plaintext() {
        let crypto = cipher(DecryptionMode::LegacyPassthrough);

        let value = crypto.decrypt("not-a-valid-blob").unwrap();
        assert_eq!(value, "not-a-valid-blob");
    }

    #[test]
    fn test_decrypt_strict_rejects_malformed_blob() {
        let crypto = cipher(DecryptionMode::Strict);

        assert!(crypto.decrypt("not-a-valid-blob").is_err());
        assert!(crypto.decrypt("aa:bb:cc").is_err()); // 长度不合法
    }

    #[test]
    fn test_wrong_key_follows_mode() {
        let encrypted = cipher(DecryptionMode::Strict).encrypt("secret").unwrap();

        let other = SecretCipher::new(&[9u8; 32], DecryptionMode::LegacyPassthrough);
        assert_eq!(other.decrypt(&encrypted).unwrap(), encrypted);

        let strict = SecretCipher::new(&[9u8; 32], DecryptionMode::Strict);
        assert!(strict.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_passphrase_key_derivation() {
        let config = EncryptionConfig {
            key: "not-a-hex-key-just-a-passphrase".to_string(),
            mode: DecryptionMode::Strict,
        };
        let crypto = SecretCipher::from_config(&config).unwrap();

        let encrypted = crypto.encrypt("value").unwrap();
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), "value");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let config = EncryptionConfig {
            key: String::new(),
            mode: DecryptionMode::default(),
        };
        assert!(SecretCipher::from_config(&config).is_err());
    }

    #[test]
    fn test_generate_key() {
        let key1 = SecretCipher::generate_key();
        let key2 = SecretCipher::generate_key();

        assert_eq!(key1.len(), 64); // 32 bytes in hex
        assert_eq!(key2.len(), 64);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let crypto = cipher(DecryptionMode::Strict);
        let encrypted = crypto.encrypt("").unwrap();
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), "");
    }
}

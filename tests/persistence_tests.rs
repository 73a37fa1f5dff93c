//! # Sea-ORM 仓储集成测试
//!
//! 在内存 SQLite 上验证凭证列组的部分更新、清空与
//! 日历服务的 google_ 列前缀映射。

use std::sync::Arc;

use integration_guard::config::{DecryptionMode, SecretCipher};
use integration_guard::credential::{
    CredentialPatch, CredentialStore, SeaOrmCredentialRepository, Service,
};
use integration_guard::testing::{create_test_db, init_test_env, seed_account};
use pretty_assertions::assert_eq;
use sea_orm::EntityTrait;

struct DbSuite {
    db: Arc<sea_orm::DatabaseConnection>,
    store: CredentialStore,
}

impl DbSuite {
    async fn setup() -> Self {
        init_test_env();
        let db = Arc::new(create_test_db().await.expect("create in-memory db"));
        let repository = Arc::new(SeaOrmCredentialRepository::new(db.clone()));
        let cipher = Arc::new(SecretCipher::new(&[3u8; 32], DecryptionMode::Strict));
        let store = CredentialStore::new(repository, cipher);
        Self { db, store }
    }
}

#[tokio::test]
async fn test_partial_update_roundtrip_on_sqlite() {
    let suite = DbSuite::setup().await;
    seed_account(&suite.db, "owner-1").await.unwrap();

    suite
        .store
        .update(
            "owner-1",
            Service::Drive,
            &CredentialPatch {
                access_token: Some("drive-access".to_string()),
                refresh_token: Some("drive-refresh".to_string()),
                expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
                connected: Some(true),
            },
        )
        .await
        .unwrap();

    // 只更新访问 token，刷新 token 必须原样保留
    suite
        .store
        .update(
            "owner-1",
            Service::Drive,
            &CredentialPatch {
                access_token: Some("drive-access-2".to_string()),
                ..CredentialPatch::default()
            },
        )
        .await
        .unwrap();

    let cred = suite.store.get("owner-1", Service::Drive).await.unwrap();
    assert_eq!(cred.access_token.as_deref(), Some("drive-access-2"));
    assert_eq!(cred.refresh_token.as_deref(), Some("drive-refresh"));
    assert!(cred.connected);
}

#[tokio::test]
async fn test_calendar_persists_under_google_columns() {
    let suite = DbSuite::setup().await;
    seed_account(&suite.db, "owner-2").await.unwrap();

    suite
        .store
        .update(
            "owner-2",
            Service::Calendar,
            &CredentialPatch {
                access_token: Some("calendar-access".to_string()),
                connected: Some(true),
                ..CredentialPatch::default()
            },
        )
        .await
        .unwrap();

    // 日历凭证落在 google_ 前缀列上
    let model = entity::accounts::Entity::find_by_id("owner-2")
        .one(suite.db.as_ref())
        .await
        .unwrap()
        .unwrap();

    assert!(model.google_access_token.is_some());
    assert!(model.google_connected);
    assert!(model.drive_access_token.is_none());
    assert!(model.sheets_access_token.is_none());

    // 静态存储的是密文
    assert_ne!(
        model.google_access_token.as_deref(),
        Some("calendar-access")
    );
    assert!(SecretCipher::looks_encrypted(
        model.google_access_token.as_deref().unwrap()
    ));
}

#[tokio::test]
async fn test_clear_resets_service_columns() {
    let suite = DbSuite::setup().await;
    seed_account(&suite.db, "owner-3").await.unwrap();

    suite
        .store
        .update(
            "owner-3",
            Service::Sheets,
            &CredentialPatch {
                access_token: Some("sheets-access".to_string()),
                refresh_token: Some("sheets-refresh".to_string()),
                expires_at: Some(chrono::Utc::now()),
                connected: Some(true),
            },
        )
        .await
        .unwrap();

    suite.store.clear("owner-3", Service::Sheets).await.unwrap();

    let cred = suite.store.get("owner-3", Service::Sheets).await.unwrap();
    assert!(!cred.connected);
    assert!(cred.access_token.is_none());
    assert!(cred.refresh_token.is_none());
    assert!(cred.expires_at.is_none());
}

#[tokio::test]
async fn test_update_unknown_account_is_database_error() {
    let suite = DbSuite::setup().await;

    let result = suite
        .store
        .update(
            "ghost",
            Service::Drive,
            &CredentialPatch {
                access_token: Some("x".to_string()),
                ..CredentialPatch::default()
            },
        )
        .await;

    assert!(result.is_err());
}

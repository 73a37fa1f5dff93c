//! # 出站门面集成测试
//!
//! 覆盖限流顺序、端到端刷新调用链路与调用失败的分类处置。

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use integration_guard::credential::Service;
use integration_guard::error::{FailureKind, GuardError};
use integration_guard::oauth::ProviderError;
use integration_guard::rate_limit::GLOBAL_KEY;
use integration_guard::testing::*;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_rate_limit_three_of_four() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    stack
        .seed_connected(&owner, Service::Drive, Some(minutes_from_now(60)))
        .await;

    let invocations = Arc::new(AtomicU32::new(0));

    for i in 1..=4u32 {
        let counter = invocations.clone();
        let result = stack
            .gateway
            .with_authorized_call(&owner, Service::Drive, 3, |_token| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(())
            })
            .await;

        if i <= 3 {
            assert!(result.is_ok(), "call {i} should pass");
        } else {
            assert!(matches!(
                result.unwrap_err(),
                GuardError::RateLimitExceeded { .. }
            ));
        }
    }

    // 被限流的第四次调用没有产生任何出站调用
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_limit_checked_before_credentials() {
    init_test_env();
    let stack = TestStack::new();

    // 账户根本不存在；上限为 0 时应先报限流而不是凭证缺失，
    // 证明限流发生在任何出口动作之前
    let result = stack
        .gateway
        .with_authorized_call("ghost", Service::Drive, 0, |_token| async move {
            Ok::<_, ProviderError>(())
        })
        .await;

    assert!(matches!(
        result.unwrap_err(),
        GuardError::RateLimitExceeded { .. }
    ));
}

#[tokio::test]
async fn test_end_to_end_expired_token_refresh_then_call() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    // 已过期一分钟，持有有效刷新 token
    stack
        .seed_connected(&owner, Service::Drive, Some(minutes_from_now(-1)))
        .await;

    let result = stack
        .gateway
        .with_authorized_call(&owner, Service::Drive, 60, |token| async move {
            // 业务调用拿到的必须是刷新后的新 token
            assert_eq!(token, "mock-access-token-1");
            Ok::<_, ProviderError>(42)
        })
        .await
        .unwrap();

    assert_eq!(result, 42);
    assert_eq!(stack.endpoint.calls(), 1);

    // 新过期时间（约一小时后）已持久化
    let cred = stack.store.get(&owner, Service::Drive).await.unwrap();
    assert!(cred.expires_at.unwrap() > minutes_from_now(50));
}

#[tokio::test]
async fn test_call_failure_revoked_clears_credential() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    stack
        .seed_connected(&owner, Service::Sheets, Some(minutes_from_now(60)))
        .await;

    let err = stack
        .gateway
        .with_authorized_call(&owner, Service::Sheets, 60, |_token| async move {
            Err::<(), _>(ProviderError::http(
                400,
                Some("invalid_grant".to_string()),
                None,
            ))
        })
        .await
        .unwrap_err();

    match err {
        GuardError::ProviderCall { kind, .. } => assert_eq!(kind, FailureKind::Revoked),
        other => panic!("unexpected error: {other:?}"),
    }

    let cred = stack.store.get(&owner, Service::Sheets).await.unwrap();
    assert!(!cred.connected);
    assert!(cred.access_token.is_none());
}

#[tokio::test]
async fn test_call_failure_rate_limited_keeps_credential() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    stack
        .seed_connected(&owner, Service::Drive, Some(minutes_from_now(60)))
        .await;

    let err = stack
        .gateway
        .with_authorized_call(&owner, Service::Drive, 60, |_token| async move {
            Err::<(), _>(ProviderError::http(429, None, None))
        })
        .await
        .unwrap_err();

    match err {
        GuardError::ProviderCall { kind, .. } => assert_eq!(kind, FailureKind::RateLimited),
        other => panic!("unexpected error: {other:?}"),
    }

    // 限流不动凭证
    let cred = stack.store.get(&owner, Service::Drive).await.unwrap();
    assert!(cred.connected);
}

#[tokio::test]
async fn test_call_failure_transient_is_surfaced() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    stack
        .seed_connected(&owner, Service::Drive, Some(minutes_from_now(60)))
        .await;

    let err = stack
        .gateway
        .with_authorized_call(&owner, Service::Drive, 60, |_token| async move {
            Err::<(), _>(ProviderError::network("connection reset by peer"))
        })
        .await
        .unwrap_err();

    match &err {
        GuardError::ProviderCall { kind, .. } => assert_eq!(*kind, FailureKind::Transient),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_limited_call_guards_smtp_egress() {
    init_test_env();
    let stack = TestStack::new();

    for _ in 0..2 {
        let sent = stack
            .gateway
            .with_limited_call("smtp", GLOBAL_KEY, 2, || async {
                Ok::<_, ProviderError>("queued")
            })
            .await
            .unwrap();
        assert_eq!(sent, "queued");
    }

    let err = stack
        .gateway
        .with_limited_call("smtp", GLOBAL_KEY, 2, || async {
            Ok::<_, ProviderError>("queued")
        })
        .await
        .unwrap_err();

    match err {
        GuardError::RateLimitExceeded { scope, key, limit } => {
            assert_eq!(scope, "smtp");
            assert_eq!(key, GLOBAL_KEY);
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_credential_surfaces_before_call() {
    init_test_env();
    let stack = TestStack::new();
    let owner = random_owner_id();
    stack.ensure_account(&owner);

    let invocations = Arc::new(AtomicU32::new(0));
    let counter = invocations.clone();

    let err = stack
        .gateway
        .with_authorized_call(&owner, Service::Calendar, 60, |_token| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GuardError::CredentialMissing { .. }));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

//! # Token 端点客户端集成测试
//!
//! 用 wiremock 模拟提供商的 token 端点，验证 refresh_token
//! 授权请求的构造与各类响应的解析、分类。

use std::time::Duration;

use integration_guard::config::{OAuthClientConfig, OAuthConfig};
use integration_guard::credential::Service;
use integration_guard::error::FailureKind;
use integration_guard::oauth::{classify, GoogleTokenClient, TokenEndpoint};
use integration_guard::testing::init_test_env;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oauth_config(token_url: String) -> OAuthConfig {
    let client = OAuthClientConfig {
        client_id: "thesis-hub-client".to_string(),
        client_secret: "thesis-hub-secret".to_string(),
        redirect_uri: "https://thesis.example.edu/oauth/callback".to_string(),
        token_url,
        scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
    };
    OAuthConfig {
        drive: client.clone(),
        sheets: client.clone(),
        calendar: client,
    }
}

fn client_against(server: &MockServer) -> GoogleTokenClient {
    let config = oauth_config(format!("{}/token", server.uri()));
    GoogleTokenClient::new(config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_refresh_grant_success() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh-token"))
        .and(body_string_contains("client_id=thesis-hub-client"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "access_token": "ya29.fresh-token",
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "https://www.googleapis.com/auth/drive"
            }"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let refreshed = client
        .refresh_grant(Service::Drive, "stored-refresh-token")
        .await
        .unwrap();

    assert_eq!(refreshed.access_token, "ya29.fresh-token");
    assert!(refreshed.refresh_token.is_none());

    let remaining = refreshed.expires_at - chrono::Utc::now();
    assert!(remaining > chrono::Duration::minutes(59));
    assert!(remaining <= chrono::Duration::minutes(61));
}

#[tokio::test]
async fn test_refresh_grant_rotated_refresh_token() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 1800
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let refreshed = client.refresh_grant(Service::Sheets, "old").await.unwrap();

    assert_eq!(refreshed.refresh_token.as_deref(), Some("new-refresh"));
}

#[tokio::test]
async fn test_invalid_grant_is_classified_revoked() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_raw(
            r#"{
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client
        .refresh_grant(Service::Drive, "revoked-token")
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(400));
    assert_eq!(err.code.as_deref(), Some("invalid_grant"));
    assert_eq!(classify(&err), FailureKind::Revoked);
}

#[tokio::test]
async fn test_http_429_is_classified_rate_limited() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            r#"{"error": "rate_limit_exceeded"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.refresh_grant(Service::Drive, "rt").await.unwrap_err();

    assert_eq!(classify(&err), FailureKind::RateLimited);
}

#[tokio::test]
async fn test_server_error_is_classified_transient() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.refresh_grant(Service::Drive, "rt").await.unwrap_err();

    assert_eq!(err.status, Some(502));
    assert!(err.code.is_none());
    assert_eq!(classify(&err), FailureKind::Transient);
}

#[tokio::test]
async fn test_success_without_access_token_is_error() {
    init_test_env();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"token_type": "Bearer"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.refresh_grant(Service::Drive, "rt").await.unwrap_err();

    assert_eq!(classify(&err), FailureKind::Transient);
    assert!(err.message.contains("access_token"));
}

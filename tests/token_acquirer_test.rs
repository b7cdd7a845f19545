//! # 令牌获取集成测试
//!
//! 使用 wiremock 模拟令牌端点。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use internal_trust::credentials::{ClientCredentials, HttpTokenAcquirer, TokenAcquirer};
use internal_trust::error::AcquireError;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn acquirer_for(server: &MockServer) -> HttpTokenAcquirer {
    HttpTokenAcquirer::new(
        format!("{}/oauth2/token", server.uri()),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn credentials() -> ClientCredentials {
    ClientCredentials::new("gateway", "s3cret", "internal")
}

#[tokio::test]
async fn test_client_credentials_exchange() {
    let server = MockServer::start().await;
    let basic = format!("Basic {}", STANDARD.encode("gateway:s3cret"));

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", basic.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "eyJ.internal.token",
            "token_type": "bearer",
            "expires_in": 600,
            "scope": "internal"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = acquirer_for(&server).acquire(&credentials()).await.unwrap();

    assert_eq!(token.access_token, "eyJ.internal.token");
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, Some(600));
    assert_eq!(token.scope.as_deref(), Some("internal"));
}

#[tokio::test]
async fn test_audience_is_sent_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("audience=billing-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "aud-token",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = acquirer_for(&server)
        .acquire(&credentials().with_audience("billing-api"))
        .await
        .unwrap();

    assert_eq!(token.access_token, "aud-token");
    assert_eq!(token.expires_in, None);
}

#[tokio::test]
async fn test_oauth_error_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "client authentication failed"
        })))
        .mount(&server)
        .await;

    let err = acquirer_for(&server)
        .acquire(&credentials())
        .await
        .unwrap_err();

    match &err {
        AcquireError::Rejected {
            status,
            error,
            description,
        } => {
            assert_eq!(*status, 401);
            assert_eq!(error, "invalid_client");
            assert_eq!(description.as_deref(), Some("client authentication failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.oauth_error(), Some("invalid_client"));
}

#[tokio::test]
async fn test_missing_access_token_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 600
        })))
        .mount(&server)
        .await;

    let err = acquirer_for(&server)
        .acquire(&credentials())
        .await
        .unwrap_err();
    assert!(matches!(err, AcquireError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late", "token_type": "Bearer"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let acquirer = HttpTokenAcquirer::new(
        format!("{}/oauth2/token", server.uri()),
        Duration::from_millis(200),
    )
    .unwrap();

    let err = acquirer.acquire(&credentials()).await.unwrap_err();
    assert!(matches!(err, AcquireError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // 端口 9 (discard) 通常没有监听
    let acquirer =
        HttpTokenAcquirer::new("http://127.0.0.1:9/oauth2/token", Duration::from_secs(2)).unwrap();

    let err = acquirer.acquire(&credentials()).await.unwrap_err();
    assert!(matches!(err, AcquireError::Transport(_)));
}

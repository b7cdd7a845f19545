//! # 错误处理测试

use crate::error::{AcquireError, Context, DatabaseError, ErrorCategory, TrustError};
use axum::http::StatusCode;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = TrustError::config("测试配置错误");
    assert!(matches!(err, TrustError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = TrustError::config_with_source("配置文件加载失败", io_err);

    assert!(err.to_string().contains("配置错误: 配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_context_wraps_and_keeps_status() {
    let result: Result<(), TrustError> = Err(TrustError::conflict("registered_client", "billing"));
    let err = result.context("添加客户端失败").unwrap_err();

    assert!(matches!(err, TrustError::Context { .. }));
    assert!(err.to_string().starts_with("添加客户端失败"));
    assert_eq!(err.to_http_response_parts().0, StatusCode::CONFLICT);
    assert!(matches!(err.root(), TrustError::Conflict { .. }));
}

#[test]
fn test_auto_conversion_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err: TrustError = io_err.into();

    assert!(matches!(err, TrustError::Io { .. }));
    assert!(err.to_string().contains("IO错误: 文件操作失败"));
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
    let err: TrustError = toml_err.into();

    assert!(matches!(err, TrustError::Config { .. }));
    assert!(err.to_string().contains("配置错误: TOML解析失败"));
}

#[test]
fn test_unique_violation_becomes_conflict() {
    let err: TrustError = DatabaseError::UniqueViolation {
        resource_type: "registered_client".to_string(),
        identifier: "billing".to_string(),
    }
    .into();

    assert!(matches!(err, TrustError::Conflict { .. }));
    assert_eq!(err.category(), ErrorCategory::Client);
}

#[test]
fn test_invalid_request_uses_oauth_error_code() {
    let err = TrustError::invalid_request("client_id 参数重复");
    let (status, code) = err.to_http_response_parts();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code, "invalid_request");
}

#[test]
fn test_token_errors_are_server_side() {
    let timeout = TrustError::refresh_timeout("internal", std::time::Duration::from_millis(1500));
    assert_eq!(timeout.to_string(), "令牌刷新等待超时: identity=internal, timeout=1500ms");
    assert_eq!(timeout.category(), ErrorCategory::Server);

    let failed = TrustError::acquisition_failed_with_source(
        "internal",
        AcquireError::Rejected {
            status: 401,
            error: "invalid_client".to_string(),
            description: Some("bad secret".to_string()),
        },
    );
    assert!(failed.to_string().contains("invalid_client"));
    assert!(failed.to_string().contains("bad secret"));
    assert_eq!(failed.to_http_response_parts().1, "ACQUISITION_FAILED");
}

#[test]
fn test_unsupported_operation() {
    let err = TrustError::unsupported("RegisteredClientRepository::save");
    assert_eq!(err.to_http_response_parts().0, StatusCode::NOT_IMPLEMENTED);
}

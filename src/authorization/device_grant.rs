//! # 设备码授权请求匹配
//!
//! 识别设备码授权流程的两个请求：
//! - 设备授权端点（默认 `POST /oauth2/device_authorization`）
//! - 令牌端点（默认 `POST /oauth2/token`）上 `grant_type` 为设备码且携带 `device_code` 的请求
//!
//! 匹配成功时抽取公共客户端认证信息（认证方式为 `none`），供后续授权评估使用。
//! 纯函数，不访问任何存储。

use axum::http::{Method, header::CONTENT_TYPE, request::Parts};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::types::{auth_method, grant_type};
use crate::config::AuthorizationConfig;
use crate::error::{Result, TrustError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

const CLIENT_ID: &str = "client_id";
const GRANT_TYPE: &str = "grant_type";
const DEVICE_CODE: &str = "device_code";
const SCOPE: &str = "scope";

/// 匹配到的设备码流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceGrantLeg {
    /// 设备请求用户码与设备码
    Authorization,
    /// 设备用设备码换取令牌
    Token,
}

/// 待匹配的请求：方法、路径与合并后的查询参数和表单参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGrantRequest {
    method: Method,
    path: String,
    parameters: Vec<(String, String)>,
}

impl DeviceGrantRequest {
    pub fn new(method: Method, path: impl Into<String>, query: Option<&str>, body: &[u8]) -> Self {
        let mut parameters: Vec<(String, String)> = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        parameters.extend(url::form_urlencoded::parse(body).into_owned());

        Self {
            method,
            path: path.into(),
            parameters,
        }
    }

    /// 由 `http` 请求头部与请求体构造；非表单请求体不参与解析
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        let is_form = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_none_or(|value| value.starts_with("application/x-www-form-urlencoded"));

        Self::new(
            parts.method.clone(),
            parts.uri.path(),
            parts.uri.query(),
            if is_form { body } else { &[] },
        )
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.parameters
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn first(&self, name: &str) -> Option<&str> {
        self.values(name).next()
    }
}

/// 匹配成功后抽取的客户端认证信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceClientAuthentication {
    pub client_id: String,
    /// 设备客户端为公共客户端，恒为 `none`
    pub authentication_method: String,
    pub leg: DeviceGrantLeg,
    pub device_code: Option<String>,
    pub scopes: BTreeSet<String>,
    pub additional_parameters: BTreeMap<String, String>,
}

/// 端点模式：方法加路径，`*` 匹配单个路径段，忽略末尾斜杠
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPattern {
    method: Method,
    segments: Vec<String>,
}

impl EndpointPattern {
    pub fn new(method: Method, pattern: &str) -> Self {
        Self {
            method,
            segments: split_path(pattern).map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if *method != self.method {
            return false;
        }
        let mut segments = split_path(path);
        let all_match = self.segments.iter().all(|expected| {
            segments
                .next()
                .is_some_and(|actual| expected == "*" || expected == actual)
        });
        all_match && segments.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_end_matches('/').split('/').filter(|s| !s.is_empty())
}

/// 设备码授权请求匹配器
#[derive(Debug, Clone)]
pub struct DeviceGrantMatcher {
    authorization_endpoint: EndpointPattern,
    token_endpoint: EndpointPattern,
}

impl Default for DeviceGrantMatcher {
    fn default() -> Self {
        Self::from_config(&AuthorizationConfig::default())
    }
}

impl DeviceGrantMatcher {
    pub fn new(device_authorization_endpoint: &str, token_endpoint: &str) -> Self {
        Self {
            authorization_endpoint: EndpointPattern::new(Method::POST, device_authorization_endpoint),
            token_endpoint: EndpointPattern::new(Method::POST, token_endpoint),
        }
    }

    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self::new(&config.device_authorization_endpoint, &config.token_endpoint)
    }

    /// 匹配请求；未匹配或不带 `client_id` 返回 `None`，`client_id` 为空或重复返回 `invalid_request`
    ///
    /// 不带 `client_id` 的请求留给其他客户端认证方式（如 HTTP Basic）处理。
    pub fn matches(&self, request: &DeviceGrantRequest) -> Result<Option<DeviceClientAuthentication>> {
        let Some(leg) = self.leg_of(request) else {
            return Ok(None);
        };
        let Some(client_id) = single_value(request, CLIENT_ID)? else {
            return Ok(None);
        };

        let device_code = match leg {
            DeviceGrantLeg::Authorization => None,
            DeviceGrantLeg::Token => single_value(request, DEVICE_CODE)?,
        };

        let scopes = request
            .first(SCOPE)
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut additional_parameters = BTreeMap::new();
        for (key, value) in &request.parameters {
            if [CLIENT_ID, GRANT_TYPE, DEVICE_CODE, SCOPE].contains(&key.as_str()) {
                continue;
            }
            additional_parameters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        ldebug!(
            "system",
            LogStage::RequestParse,
            LogComponent::DeviceGrant,
            "matched",
            &format!("设备码请求: leg={leg:?}, client_id={client_id}, path={}", request.path)
        );

        Ok(Some(DeviceClientAuthentication {
            client_id,
            authentication_method: auth_method::NONE.to_string(),
            leg,
            device_code,
            scopes,
            additional_parameters,
        }))
    }

    fn leg_of(&self, request: &DeviceGrantRequest) -> Option<DeviceGrantLeg> {
        if self
            .authorization_endpoint
            .matches(&request.method, &request.path)
        {
            return Some(DeviceGrantLeg::Authorization);
        }

        let is_device_token_request = self.token_endpoint.matches(&request.method, &request.path)
            && request.first(GRANT_TYPE) == Some(grant_type::DEVICE_CODE)
            && request
                .first(DEVICE_CODE)
                .is_some_and(|code| !code.trim().is_empty());
        is_device_token_request.then_some(DeviceGrantLeg::Token)
    }
}

/// 取单值参数：缺失返回 `None`，空白或重复返回 `invalid_request`
fn single_value(request: &DeviceGrantRequest, name: &str) -> Result<Option<String>> {
    let mut values = request.values(name);
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(TrustError::invalid_request(format!("{name} 参数重复")));
    }
    if first.trim().is_empty() {
        return Err(TrustError::invalid_request(format!("{name} 参数为空")));
    }
    Ok(Some(first.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn post(path: &str, body: &str) -> DeviceGrantRequest {
        DeviceGrantRequest::new(Method::POST, path, None, body.as_bytes())
    }

    const DEVICE_TOKEN_BODY: &str =
        "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&device_code=GmRh&client_id=tv-app";

    #[test]
    fn test_authorization_leg() {
        let matcher = DeviceGrantMatcher::default();
        let auth = matcher
            .matches(&post(
                "/oauth2/device_authorization",
                "client_id=tv-app&scope=profile%20media.read&locale=de",
            ))
            .unwrap()
            .unwrap();

        assert_eq!(auth.leg, DeviceGrantLeg::Authorization);
        assert_eq!(auth.client_id, "tv-app");
        assert_eq!(auth.authentication_method, "none");
        assert_eq!(auth.device_code, None);
        assert_eq!(
            auth.scopes,
            BTreeSet::from(["media.read".to_string(), "profile".to_string()])
        );
        assert_eq!(auth.additional_parameters.get("locale").map(String::as_str), Some("de"));
    }

    #[test]
    fn test_token_leg_populated() {
        let auth = DeviceGrantMatcher::default()
            .matches(&post("/oauth2/token", DEVICE_TOKEN_BODY))
            .unwrap()
            .unwrap();

        assert_eq!(auth.leg, DeviceGrantLeg::Token);
        assert_eq!(auth.device_code.as_deref(), Some("GmRh"));
        assert!(auth.additional_parameters.is_empty());
    }

    #[rstest]
    #[case::missing_device_code(
        "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&client_id=tv-app"
    )]
    #[case::blank_device_code(
        "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&device_code=&client_id=tv-app"
    )]
    #[case::other_grant("grant_type=client_credentials&device_code=GmRh&client_id=tv-app")]
    #[case::no_grant("device_code=GmRh&client_id=tv-app")]
    fn test_token_endpoint_not_matched(#[case] body: &str) {
        let result = DeviceGrantMatcher::default()
            .matches(&post("/oauth2/token", body))
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_wrong_method_or_path_not_matched() {
        let matcher = DeviceGrantMatcher::default();
        let get = DeviceGrantRequest::new(
            Method::GET,
            "/oauth2/device_authorization",
            Some("client_id=tv-app"),
            b"",
        );
        assert_eq!(matcher.matches(&get).unwrap(), None);
        assert_eq!(
            matcher.matches(&post("/oauth2/authorize", "client_id=tv-app")).unwrap(),
            None
        );
    }

    #[rstest]
    #[case::repeated("client_id=tv-app&client_id=other")]
    #[case::blank("client_id=%20")]
    fn test_invalid_client_id(#[case] body: &str) {
        let err = DeviceGrantMatcher::default()
            .matches(&post("/oauth2/device_authorization", body))
            .unwrap_err();
        assert_eq!(err.to_http_response_parts().1, "invalid_request");
    }

    #[rstest]
    #[case::authorization("/oauth2/device_authorization", "scope=profile")]
    #[case::token(
        "/oauth2/token",
        "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&device_code=GmRh"
    )]
    fn test_missing_client_id_falls_through(#[case] path: &str, #[case] body: &str) {
        let result = DeviceGrantMatcher::default().matches(&post(path, body)).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_client_id_repeated_across_query_and_body() {
        let request = DeviceGrantRequest::new(
            Method::POST,
            "/oauth2/device_authorization",
            Some("client_id=tv-app"),
            b"client_id=tv-app",
        );
        assert!(DeviceGrantMatcher::default().matches(&request).is_err());
    }

    #[test]
    fn test_endpoint_pattern_wildcard_and_trailing_slash() {
        let pattern = EndpointPattern::new(Method::POST, "/tenants/*/oauth2/token/");

        assert!(pattern.matches(&Method::POST, "/tenants/acme/oauth2/token"));
        assert!(pattern.matches(&Method::POST, "/tenants/acme/oauth2/token/"));
        assert!(!pattern.matches(&Method::POST, "/tenants/acme/extra/oauth2/token"));
        assert!(!pattern.matches(&Method::POST, "/tenants/oauth2/token"));
        assert!(!pattern.matches(&Method::PUT, "/tenants/acme/oauth2/token"));
    }

    #[test]
    fn test_from_parts_ignores_json_body() {
        let (parts, ()) = Request::builder()
            .method(Method::POST)
            .uri("/oauth2/device_authorization?client_id=tv-app")
            .header(CONTENT_TYPE, "application/json")
            .body(())
            .unwrap()
            .into_parts();

        let request = DeviceGrantRequest::from_parts(&parts, br#"{"client_id":"x"}"#);
        let auth = DeviceGrantMatcher::default().matches(&request).unwrap().unwrap();
        assert_eq!(auth.client_id, "tv-app");
    }
}

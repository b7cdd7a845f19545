//! # 出站认证中间件
//!
//! `tower` 层：在把 `http::Request` 交给内层服务之前执行出站认证。
//! 目标服务名取自请求扩展 [`OutboundTarget`]，缺省时使用 URI 的 host。

use axum::http::Request;
use futures::future::BoxFuture;
use std::fmt;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::authenticator::OutboundAuthenticator;

/// 请求扩展：显式指定出站目标服务名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTarget(String);

impl OutboundTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutboundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct OutboundAuthLayer {
    authenticator: OutboundAuthenticator,
}

impl OutboundAuthLayer {
    pub fn new(authenticator: OutboundAuthenticator) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for OutboundAuthLayer {
    type Service = OutboundAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OutboundAuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundAuthService<S> {
    inner: S,
    authenticator: OutboundAuthenticator,
}

impl<S, B> Service<Request<B>> for OutboundAuthService<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        // 使用已就绪的实例，留下克隆供下次调用
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let target = target_of(&request);
            authenticator
                .authenticate(&target, request.headers_mut())
                .await;
            inner.call(request).await
        })
    }
}

fn target_of<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<OutboundTarget>()
        .map(|target| target.as_str().to_string())
        .or_else(|| request.uri().host().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_prefers_extension() {
        let mut request = Request::builder()
            .uri("http://billing.svc.local/invoices")
            .body(())
            .unwrap();
        assert_eq!(target_of(&request), "billing.svc.local");

        request.extensions_mut().insert(OutboundTarget::new("billing"));
        assert_eq!(target_of(&request), "billing");
    }
}

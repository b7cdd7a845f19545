//! # 出站认证模块
//!
//! 内部服务之间调用时自动附加客户端凭据令牌。

pub mod authenticator;
pub mod layer;
pub mod policy;

pub use authenticator::{OutboundAuthenticator, OutboundDecision};
pub use layer::{OutboundAuthLayer, OutboundAuthService, OutboundTarget};
pub use policy::{
    IdentityRoutes, SKIP_HEADER, SkipPolicy, SkipReason, TargetCapability, TargetRegistry,
    TargetService,
};

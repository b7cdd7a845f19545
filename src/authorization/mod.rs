//! # 授权服务器存储与匹配模块
//!
//! 授权服务器在评估授权请求时依赖的存储契约与协议匹配：
//! - [`ClientRegistry`]：已注册客户端
//! - [`ConsentStore`]：用户授权同意
//! - [`DeviceGrantMatcher`]：设备码授权请求识别

pub mod client_registry;
pub mod consent_store;
pub mod device_grant;
pub mod pagination;
pub mod types;

pub use client_registry::ClientRegistry;
pub use consent_store::ConsentStore;
pub use device_grant::{
    DeviceClientAuthentication, DeviceGrantLeg, DeviceGrantMatcher, DeviceGrantRequest,
    EndpointPattern,
};
pub use pagination::{Page, PageRequest, PaginationInfo};
pub use types::{
    ClientFilter, Consent, RegisteredClient, RegisteredClientDraft, SCOPE_AUTHORITY_PREFIX,
    auth_method, grant_type,
};

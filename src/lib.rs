//! # Internal Trust
//!
//! 内部服务信任基础设施：
//! - 出站调用的客户端凭据令牌缓存与自动附加
//! - 授权服务器所需的注册客户端、授权同意存储与设备码请求匹配

pub mod app;
pub mod authorization;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod logging;
pub mod outbound;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, TrustError};

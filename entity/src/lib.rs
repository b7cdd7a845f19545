//! # Entity 模块
//!
//! 授权服务器持久化所需的 Sea-ORM 实体定义

pub mod oauth2_authorization_consent;
pub mod oauth2_registered_client;

pub use oauth2_authorization_consent::Entity as OAuth2AuthorizationConsent;
pub use oauth2_registered_client::Entity as OAuth2RegisteredClient;

#[cfg(test)]
mod tests;

//! # 实体定义测试

#[cfg(test)]
mod tests {
    use crate::{oauth2_authorization_consent, oauth2_registered_client};
    use chrono::{Duration, Utc};
    use sea_orm::Set;

    fn sample_client(expires_at: Option<chrono::NaiveDateTime>) -> oauth2_registered_client::Model {
        let now = Utc::now().naive_utc();
        oauth2_registered_client::Model {
            id: "c0ffee".to_string(),
            client_id: "billing-service".to_string(),
            client_id_issued_at: now,
            client_secret: Some("$2b$04$hash".to_string()),
            client_secret_expires_at: expires_at,
            client_name: "Billing".to_string(),
            client_authentication_methods: r#"["client_secret_basic"]"#.to_string(),
            authorization_grant_types: r#"["client_credentials"]"#.to_string(),
            redirect_uris: "[]".to_string(),
            post_logout_redirect_uris: "[]".to_string(),
            scopes: r#"["internal"]"#.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_secret_expiry() {
        let now = Utc::now().naive_utc();
        assert!(!sample_client(None).is_secret_expired_at(now));
        assert!(sample_client(Some(now)).is_secret_expired_at(now));
        assert!(!sample_client(Some(now + Duration::hours(1))).is_secret_expired_at(now));
    }

    #[test]
    fn test_secret_not_serialized() {
        let json = serde_json::to_string(&sample_client(None)).unwrap();
        assert!(!json.contains("client_secret\""));
        assert!(json.contains("billing-service"));
    }

    #[tokio::test]
    async fn test_consent_active_model() {
        let consent = oauth2_authorization_consent::ActiveModel {
            registered_client_id: Set("c0ffee".to_string()),
            principal_name: Set("alice".to_string()),
            authorities: Set(r#"["SCOPE_read"]"#.to_string()),
            ..Default::default()
        };

        assert_eq!(consent.principal_name.as_ref(), "alice");
        assert_eq!(consent.authorities.as_ref(), r#"["SCOPE_read"]"#);
    }
}

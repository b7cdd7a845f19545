//! # 授权同意存储集成测试

mod common;

use common::{create_file_test_db, create_test_db};
use futures::future::join_all;
use internal_trust::authorization::{
    ClientRegistry, Consent, ConsentStore, RegisteredClientDraft, grant_type,
};
use internal_trust::config::AuthorizationConfig;
use internal_trust::error::TrustError;
use pretty_assertions::assert_eq;
use sea_orm::DatabaseConnection;
use std::collections::BTreeSet;

/// 创建存储并注册两个客户端 `c-1`、`c-2`
async fn setup() -> ConsentStore {
    setup_on(create_test_db().await).await
}

async fn setup_on(db: DatabaseConnection) -> ConsentStore {
    let registry = ClientRegistry::new(
        db.clone(),
        &AuthorizationConfig {
            secret_hash_cost: 4,
            ..AuthorizationConfig::default()
        },
    );
    for (id, client_id) in [("c-1", "orders"), ("c-2", "billing")] {
        registry
            .add(
                RegisteredClientDraft::new(client_id, client_id)
                    .with_id(id)
                    .with_grant_type(grant_type::AUTHORIZATION_CODE),
            )
            .await
            .unwrap();
    }
    ConsentStore::new(db)
}

fn scopes(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_second_save_overwrites_first() {
    let store = setup().await;

    store
        .save(&Consent::new("c-1", "alice").with_scope("read"))
        .await
        .unwrap();
    store
        .save(&Consent::new("c-1", "alice").with_scope("read").with_scope("write"))
        .await
        .unwrap();

    let found = store.find_by_id("c-1", "alice").await.unwrap().unwrap();
    assert_eq!(found.scopes(), scopes(&["read", "write"]));
    assert_eq!(store.list_by_principal("alice").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_keep_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = setup_on(create_file_test_db(dir.path()).await).await;

    let submitted: Vec<BTreeSet<String>> = (0..8)
        .map(|i| scopes(&["read", format!("scope-{i}").as_str()]))
        .collect();
    let handles = submitted.iter().map(|set| {
        let store = store.clone();
        let mut consent = Consent::new("c-1", "alice");
        for scope in set {
            consent.add_scope(scope);
        }
        tokio::spawn(async move { store.save(&consent).await })
    });

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let saved = store.list_by_principal("alice").await.unwrap();
    assert_eq!(saved.len(), 1);
    assert!(submitted.contains(&saved[0].scopes()));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let store = setup().await;
    let consent = Consent::new("c-1", "alice").with_scope("read");
    store.save(&consent).await.unwrap();

    store.remove(&consent).await.unwrap();
    assert!(store.find_by_id("c-1", "alice").await.unwrap().is_none());

    store.remove(&consent).await.unwrap();
    assert!(store.find_by_id("c-1", "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_saving_empty_authorities_removes_consent() {
    let store = setup().await;
    store
        .save(&Consent::new("c-1", "alice").with_scope("read"))
        .await
        .unwrap();

    store.save(&Consent::new("c-1", "alice")).await.unwrap();

    assert!(store.find_by_id("c-1", "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_scope_authorities_are_kept() {
    let store = setup().await;
    let mut consent = Consent::new("c-2", "bob").with_scope("invoices.read");
    consent.add_authority("ROLE_AUDITOR");
    store.save(&consent).await.unwrap();

    let found = store.find_by_id("c-2", "bob").await.unwrap().unwrap();
    assert_eq!(found, consent);
    assert_eq!(found.scopes(), scopes(&["invoices.read"]));
}

#[tokio::test]
async fn test_list_and_bulk_remove() {
    let store = setup().await;
    for (client, principal) in [("c-2", "alice"), ("c-1", "alice"), ("c-1", "bob")] {
        store
            .save(&Consent::new(client, principal).with_scope("read"))
            .await
            .unwrap();
    }

    let alice: Vec<_> = store
        .list_by_principal("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.registered_client_id)
        .collect();
    assert_eq!(alice, ["c-1", "c-2"]);

    assert_eq!(store.remove_all_for_client("c-1").await.unwrap(), 2);
    assert!(store.find_by_id("c-1", "bob").await.unwrap().is_none());
    assert!(store.find_by_id("c-2", "alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_consent_for_unknown_client_is_not_found() {
    let store = setup().await;

    let err = store
        .save(&Consent::new("ghost", "alice").with_scope("read"))
        .await
        .unwrap_err();

    assert!(matches!(err, TrustError::NotFound { .. }));
}

//! Tests for the admin key service behind `/admin/keys`.

mod common;

use common::TestContext;
use keystash::admin::{KeyAdmin, Principal, UpdateKeyRequest};
use keystash::env::MapEnv;
use keystash::store::SecretsStore;
use std::sync::Arc;

fn admin_service(ctx: &TestContext) -> KeyAdmin {
    KeyAdmin::from_config(Arc::new(ctx.store()), &ctx.config())
}

fn update(key: &str) -> UpdateKeyRequest {
    UpdateKeyRequest {
        key: key.to_string(),
    }
}

#[test]
fn test_list_requires_auth() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.list_keys(None);
    assert_eq!(response.status, 401);
}

#[test]
fn test_list_with_admin() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);
    admin.store().set("OPENAI_API_KEY", "sk-1");

    let response = admin.list_keys(Some(&Principal::new("admin")));

    assert_eq!(response.status, 200);
    assert_eq!(response.body, serde_json::json!(["OPENAI_API_KEY"]));
}

#[test]
fn test_list_non_admin_forbidden() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.list_keys(Some(&Principal::new("testuser")));

    assert_eq!(response.status, 403);
    assert!(response.body["detail"]
        .as_str()
        .unwrap()
        .contains("Only admin users can list keys"));
}

#[test]
fn test_update_requires_auth() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.update_key(None, "TEST_KEY", &update("test-key-value"));
    assert_eq!(response.status, 401);
    assert!(matches!(
        admin.store().get("TEST_KEY"),
        keystash::store::Lookup::NotFound
    ));
}

#[test]
fn test_update_with_admin() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.update_key(
        Some(&Principal::new("admin")),
        "TEST_KEY",
        &update("test-key-value"),
    );

    assert_eq!(response.status, 200);
    assert_eq!(response.body["status"], "success");
    assert!(response.body["message"].as_str().unwrap().contains("TEST_KEY"));
    assert_eq!(ctx.store().get("TEST_KEY").value(), Some("test-key-value"));
}

#[test]
fn test_update_non_admin_forbidden() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.update_key(
        Some(&Principal::new("testuser")),
        "TEST_KEY",
        &update("test-key-value"),
    );

    assert_eq!(response.status, 403);
    assert!(response.body["detail"]
        .as_str()
        .unwrap()
        .contains("Only admin users can update keys"));
    assert!(!ctx.keys_file().exists());
}

#[test]
fn test_update_invalid_name() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);

    let response = admin.update_key(
        Some(&Principal::new("admin")),
        "../../etc/passwd",
        &update("x"),
    );

    assert_eq!(response.status, 400);
}

#[test]
fn test_update_failure_is_500() {
    let ctx = TestContext::new().unwrap();
    let mut config = ctx.config();
    config.encryption_key = None;
    let store = SecretsStore::with_env(&config, Arc::new(MapEnv::new()));
    let admin = KeyAdmin::new(Arc::new(store), vec!["admin".to_string()]);

    let response = admin.update_key(Some(&Principal::new("admin")), "TEST_KEY", &update("v"));

    assert_eq!(response.status, 500);
    assert_eq!(response.body["detail"], "Failed to update API key");
}

#[test]
fn test_delete_with_admin() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);
    let principal = Principal::new("admin");
    admin.update_key(Some(&principal), "TEST_KEY", &update("v"));

    let response = admin.delete_key(Some(&principal), "TEST_KEY");

    assert_eq!(response.status, 200);
    assert!(ctx.store().get("TEST_KEY").value().is_none());

    // Deleting again is still a success.
    assert_eq!(admin.delete_key(Some(&principal), "TEST_KEY").status, 200);
}

#[test]
fn test_delete_non_admin_forbidden() {
    let ctx = TestContext::new().unwrap();
    let admin = admin_service(&ctx);
    admin.store().set("TEST_KEY", "v");

    let response = admin.delete_key(Some(&Principal::new("testuser")), "TEST_KEY");

    assert_eq!(response.status, 403);
    assert_eq!(ctx.store().get("TEST_KEY").value(), Some("v"));
}

#[test]
fn test_configured_admin_users() {
    let ctx = TestContext::new().unwrap();
    let mut config = ctx.config();
    config.admin_users = vec!["root".to_string(), "ops".to_string()];
    let store = SecretsStore::with_env(&config, Arc::new(MapEnv::new()));
    let admin = KeyAdmin::from_config(Arc::new(store), &config);

    assert_eq!(admin.list_keys(Some(&Principal::new("ops"))).status, 200);
    assert_eq!(admin.list_keys(Some(&Principal::new("admin"))).status, 403);
}

use actix_middleware::{AuthGate, InMemoryRevocationStore, RevocationStore};
use actix_web::{test, web, App};
use crypto_core::{verify_password, TokenCodec};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::fixtures::*;
use crate::config::DEFAULT_AUTH_WHITELIST;
use crate::directory::DirectoryProvider;
use crate::middleware::RequestDirectoryMiddleware;
use crate::routes;
use crate::services::{AccountService, SessionService};

struct Harness {
    directory: Arc<InMemoryDirectory>,
    provider: Arc<InMemoryDirectoryProvider>,
    codec: Arc<TokenCodec>,
    store: Arc<InMemoryRevocationStore>,
}

impl Harness {
    fn new() -> Self {
        let directory = InMemoryDirectory::seeded();
        Self {
            provider: Arc::new(InMemoryDirectoryProvider::new(directory.clone())),
            directory,
            codec: Arc::new(TokenCodec::new(TEST_SECRET, 3600)),
            store: Arc::new(InMemoryRevocationStore::new()),
        }
    }
}

macro_rules! build_app {
    ($h:expr) => {{
        let h: &Harness = &$h;
        let store: Arc<dyn RevocationStore> = h.store.clone();
        let provider: Arc<dyn DirectoryProvider> = h.provider.clone();
        let gate = AuthGate::new(h.codec.clone(), Some(store.clone()))
            .with_whitelist(DEFAULT_AUTH_WHITELIST.split(','));
        test::init_service(
            App::new()
                .app_data(web::Data::new(SessionService::new(h.codec.clone(), Some(store))))
                .app_data(web::Data::new(AccountService::new()))
                .wrap(RequestDirectoryMiddleware::new(provider))
                .configure(|cfg| routes::configure(cfg, gate)),
        )
        .await
    }};
}

macro_rules! login_token {
    ($app:expr, $username:expr, $password:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "username": $username, "password": $password }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body["data"]["token"].as_str().unwrap().to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn test_health_is_public() {
    let h = Harness::new();
    let app = build_app!(h);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn test_login_returns_token_and_profile() {
    let h = Harness::new();
    let app = build_app!(h);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": ALICE, "password": ALICE_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["user"]["username"], ALICE);
    assert_eq!(body["data"]["user"]["isActive"], true);
    assert_eq!(body["data"]["user"]["roles"][0]["name"], "operator");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let token = body["data"]["token"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[actix_web::test]
async fn test_login_failures_are_indistinguishable() {
    let h = Harness::new();
    let app = build_app!(h);

    let mut bodies = Vec::new();
    for (username, password) in [("nobody", ALICE_PASSWORD), (ALICE, "wrong-password")] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "username": username, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: Value = test::read_body_json(resp).await;
        bodies.push(body);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["message"], "Invalid username or password");
}

#[actix_web::test]
async fn test_disabled_account_is_403() {
    let h = Harness::new();
    let app = build_app!(h);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": DISABLED, "password": DISABLED_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn test_malformed_login_payload_is_400() {
    let h = Harness::new();
    let app = build_app!(h);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"username\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "al", "password": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_me_requires_token_and_refetches_roles() {
    let h = Harness::new();
    let app = build_app!(h);

    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let token = login_token!(app, ALICE, ALICE_PASSWORD);
    h.directory
        .set_roles(h.directory.user_id(ALICE), &["admin"]);

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], ALICE);
    assert_eq!(body["data"]["roles"][0]["name"], "admin");
}

#[actix_web::test]
async fn test_logout_revokes_token() {
    let h = Harness::new();
    let app = build_app!(h);
    let token = login_token!(app, ALICE, ALICE_PASSWORD);

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(h.store.contains(&token).await.unwrap());

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Token has been revoked");
}

#[actix_web::test]
async fn test_roles_listing() {
    let h = Harness::new();
    let app = build_app!(h);
    let token = login_token!(app, ALICE, ALICE_PASSWORD);

    let req = test::TestRequest::get()
        .uri("/api/auth/roles")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "operator", "super_admin"]);
}

#[actix_web::test]
async fn test_create_user_requires_super_admin() {
    let h = Harness::new();
    let app = build_app!(h);
    let payload = json!({
        "username": "carol",
        "password": "carolpass",
        "displayName": "Carol",
        "roleIds": [h.directory.role_id("admin")]
    });

    let operator = login_token!(app, ALICE, ALICE_PASSWORD);
    let req = test::TestRequest::post()
        .uri("/api/users")
        .insert_header(bearer(&operator))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let admin = login_token!(app, ROOT, ROOT_PASSWORD);
    let req = test::TestRequest::post()
        .uri("/api/users")
        .insert_header(bearer(&admin))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["displayName"], "Carol");
    assert_eq!(body["data"]["roles"][0]["name"], "admin");

    // The new account can log in with its password
    login_token!(app, "carol", "carolpass");

    let req = test::TestRequest::post()
        .uri("/api/users")
        .insert_header(bearer(&admin))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn test_list_and_get_users_for_any_authenticated_caller() {
    let h = Harness::new();
    let app = build_app!(h);
    let token = login_token!(app, ALICE, ALICE_PASSWORD);

    let req = test::TestRequest::get()
        .uri("/api/users?page=1&limit=2")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["totalPages"], 2);

    let root_id = h.directory.user_id(ROOT);
    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{root_id}"))
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], ROOT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", Uuid::new_v4()))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get()
        .uri("/api/users/not-a-uuid")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_update_and_delete_are_admin_only() {
    let h = Harness::new();
    let app = build_app!(h);
    let alice_id = h.directory.user_id(ALICE);
    let operator = login_token!(app, ALICE, ALICE_PASSWORD);
    let admin = login_token!(app, ROOT, ROOT_PASSWORD);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{alice_id}"))
        .insert_header(bearer(&operator))
        .set_json(json!({ "displayName": "Self-promoted" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{alice_id}"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "displayName": "Alice", "roleIds": [h.directory.role_id("admin")] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["displayName"], "Alice");
    assert_eq!(body["data"]["roles"][0]["name"], "admin");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{alice_id}"))
        .insert_header(bearer(&operator))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{alice_id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{alice_id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn test_change_password_self_or_super_admin() {
    let h = Harness::new();
    let app = build_app!(h);
    let alice_id = h.directory.user_id(ALICE);
    let root_id = h.directory.user_id(ROOT);
    let operator = login_token!(app, ALICE, ALICE_PASSWORD);
    let admin = login_token!(app, ROOT, ROOT_PASSWORD);

    // Someone else's password: forbidden without super_admin
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{root_id}/password"))
        .insert_header(bearer(&operator))
        .set_json(json!({ "newPassword": "hijacked1" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    assert!(verify_password(ROOT_PASSWORD, &h.directory.stored_credential(root_id)));

    // Own password
    let before = h.directory.stored_credential(alice_id);
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{alice_id}/password"))
        .insert_header(bearer(&operator))
        .set_json(json!({ "newPassword": "newsecret1" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let after = h.directory.stored_credential(alice_id);
    assert_ne!(before, after);
    assert!(verify_password("newsecret1", &after));

    // Super admin on someone else
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{alice_id}/password"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "newPassword": "resetbyroot" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(verify_password("resetbyroot", &h.directory.stored_credential(alice_id)));

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{alice_id}/password"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "newPassword": "short" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_directory_released_on_every_path() {
    let h = Harness::new();
    let app = build_app!(h);

    // Success
    let token = login_token!(app, ALICE, ALICE_PASSWORD);
    assert_eq!(h.provider.opened(), 1);
    assert_eq!(h.directory.releases(), 1);

    // Handler error
    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", Uuid::new_v4()))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    assert_eq!(h.directory.releases(), 2);

    // Gate rejection
    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
    assert_eq!(h.directory.releases(), 3);

    assert_eq!(h.provider.opened(), h.directory.releases());
}

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use rolegate_api::app::{build_app, services::AppServices};
use rolegate_auth::TokenService;

const JWT_SECRET: &str = "test-secret";
const DEMO_PASSWORD: &str = "Test123";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores with demo users, bound to
        // an ephemeral port.
        let services = AppServices::in_memory(TokenService::new(JWT_SECRET), true)
            .await
            .expect("failed to build services");
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token(&self, email: &str) -> String {
        let res = self.login(email, DEMO_PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK, "login failed for {email}");
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    async fn user_id(&self, admin_token: &str, email: &str) -> i64 {
        let body: Value = self.get("/admin/users", Some(admin_token)).await.json().await.unwrap();
        body["users"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["email"] == email)
            .and_then(|u| u["id"].as_i64())
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, user_id: i64, version: i64) -> String {
    let now = Utc::now();
    let claims = json!({
        "user_id": user_id,
        "v": version,
        "iat": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(10)).timestamp(),
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_credentials() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.get("/health", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_whoami_is_unauthorized_with_json_body() {
    let srv = TestServer::spawn().await;
    let res = srv.get("/whoami", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn login_returns_bearer_token_and_resolves_identity() {
    let srv = TestServer::spawn().await;
    let res = srv.login("  ADMIN@test.com ", DEMO_PASSWORD).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "admin@test.com");
    let token = body["access_token"].as_str().unwrap();

    let res = srv.get("/whoami", Some(token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["role"], "admin");
    assert_eq!(me["token_version"], 1);
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let srv = TestServer::spawn().await;

    let wrong = srv.login("admin@test.com", "Wrong123").await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    let wrong: Value = wrong.json().await.unwrap();

    let unknown = srv.login("nobody@test.com", DEMO_PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn scheme_is_case_insensitive_and_other_schemes_are_anonymous() {
    let srv = TestServer::spawn().await;
    let token = srv.token("user1@example.com").await;

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .header("Authorization", format!("bearer \"{token}\""))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .header("Authorization", format!("Token {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_and_stale_tokens_are_anonymous() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;
    let id = srv.user_id(&admin, "user2@example.com").await;

    let forged = mint_jwt("other-secret", id, 0);
    assert_eq!(srv.get("/whoami", Some(&forged)).await.status(), StatusCode::UNAUTHORIZED);

    // Valid signature, but login bumps the stored version past 0.
    srv.token("user2@example.com").await;
    let stale = mint_jwt(JWT_SECRET, id, 0);
    assert_eq!(srv.get("/whoami", Some(&stale)).await.status(), StatusCode::UNAUTHORIZED);

    let current = mint_jwt(JWT_SECRET, id, 1);
    assert_eq!(srv.get("/whoami", Some(&current)).await.status(), StatusCode::OK);
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registration_then_profile_roundtrip() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/users/registration"))
        .json(&json!({
            "first_name": "Ivan",
            "last_name": "Petrov",
            "email": "Ivan@Example.com",
            "password": "Abc123",
            "password_repeat": "Abc123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["email"], "ivan@example.com");

    let token = {
        let res = srv.login("ivan@example.com", "Abc123").await;
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    };

    let res = srv
        .client
        .patch(srv.url("/users/profile"))
        .bearer_auth(&token)
        .json(&json!({ "first_name": "  Ivan  ", "middle_name": "Ivanovich" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let profile: Value = srv.get("/users/profile", Some(&token)).await.json().await.unwrap();
    assert_eq!(profile["first_name"], "Ivan");
    assert_eq!(profile["middle_name"], "Ivanovich");
    assert_eq!(profile["email"], "ivan@example.com");
}

#[tokio::test]
async fn registration_rejects_weak_or_mismatched_passwords() {
    let srv = TestServer::spawn().await;
    for (password, repeat) in [("123456", "123456"), ("abcdef", "abcdef"), ("Abc123", "Abc124")] {
        let res = srv
            .client
            .post(srv.url("/users/registration"))
            .json(&json!({
                "first_name": "Weak",
                "email": "weak@example.com",
                "password": password,
                "password_repeat": repeat,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{password}/{repeat}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
    }
}

#[tokio::test]
async fn logout_revokes_outstanding_tokens() {
    let srv = TestServer::spawn().await;
    let token = srv.token("user1@example.com").await;

    let res = srv
        .client
        .post(srv.url("/users/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(srv.get("/users/profile", Some(&token)).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_revokes_and_requires_new_password() {
    let srv = TestServer::spawn().await;
    let token = srv.token("user3@example.com").await;

    let res = srv
        .client
        .post(srv.url("/users/profile/password"))
        .bearer_auth(&token)
        .json(&json!({
            "old_password": DEMO_PASSWORD,
            "new_password": "Fresh456",
            "new_password_repeat": "Fresh456",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(srv.get("/whoami", Some(&token)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(srv.login("user3@example.com", DEMO_PASSWORD).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.login("user3@example.com", "Fresh456").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn self_deactivation_blocks_login() {
    let srv = TestServer::spawn().await;
    let token = srv.token("user2@example.com").await;

    let res = srv
        .client
        .post(srv.url("/users/profile/deactivate"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(srv.get("/whoami", Some(&token)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(srv.login("user2@example.com", DEMO_PASSWORD).await.status(), StatusCode::BAD_REQUEST);
}

// ─────────────────────────────────────────────────────────────────────────────
// User administration
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_list_is_scoped_by_role() {
    let srv = TestServer::spawn().await;

    let admin = srv.token("admin@test.com").await;
    let body: Value = srv.get("/admin/users", Some(&admin)).await.json().await.unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 6);

    let user = srv.token("user1@example.com").await;
    let body: Value = srv.get("/admin/users", Some(&user)).await.json().await.unwrap();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "user1@example.com");

    let guest = srv.token("user4@example.com").await;
    assert_eq!(srv.get("/admin/users", Some(&guest)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get("/admin/users", None).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn detail_checks_identity_then_existence_then_permission() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;
    let other = srv.user_id(&admin, "user2@example.com").await;
    let user = srv.token("user1@example.com").await;

    assert_eq!(srv.get("/admin/users/9999", None).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(srv.get("/admin/users/9999", Some(&user)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        srv.get(&format!("/admin/users/{other}"), Some(&user)).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn manager_edits_but_cannot_delete_admin_can() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;
    let target = srv.user_id(&admin, "user3@example.com").await;
    let victim = srv.token("user3@example.com").await;
    let manager = srv.token("manager@test.com").await;

    let res = srv
        .client
        .patch(srv.url(&format!("/admin/users/{target}")))
        .bearer_auth(&manager)
        .json(&json!({ "last_name": "Edited", "role_id": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["last_name"], "Edited");
    assert!(body["role_id"].is_null());

    let res = srv
        .client
        .delete(srv.url(&format!("/admin/users/{target}")))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .delete(srv.url(&format!("/admin/users/{target}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(srv.get("/whoami", Some(&victim)).await.status(), StatusCode::UNAUTHORIZED);
    let body: Value = srv
        .get(&format!("/admin/users/{target}"), Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn admin_creates_user_with_default_role() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;

    let res = srv
        .client
        .post(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "email": "created@example.com",
            "first_name": "Created",
            "password": "Created1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv.login("created@example.com", "Created1").await;
    let token = res.json::<Value>().await.unwrap()["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let me: Value = srv.get("/whoami", Some(&token)).await.json().await.unwrap();
    assert_eq!(me["role"], "user");
}

// ─────────────────────────────────────────────────────────────────────────────
// RBAC administration
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rule_table_is_admin_only() {
    let srv = TestServer::spawn().await;
    let manager = srv.token("manager@test.com").await;
    assert_eq!(srv.get("/rbac/rules", Some(&manager)).await.status(), StatusCode::FORBIDDEN);

    let admin = srv.token("admin@test.com").await;
    let roles: Value = srv.get("/rbac/roles", Some(&admin)).await.json().await.unwrap();
    assert_eq!(roles["roles"].as_array().unwrap().len(), 4);
    let elements: Value = srv.get("/rbac/elements", Some(&admin)).await.json().await.unwrap();
    assert_eq!(elements["elements"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn rule_lifecycle_changes_access_immediately() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;
    let guest = srv.token("user4@example.com").await;

    let roles: Value = srv.get("/rbac/roles", Some(&admin)).await.json().await.unwrap();
    let guest_role = roles["roles"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "guest")
        .and_then(|r| r["id"].as_i64())
        .unwrap();
    let elements: Value = srv.get("/rbac/elements", Some(&admin)).await.json().await.unwrap();
    let users_element = elements["elements"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "users")
        .and_then(|e| e["id"].as_i64())
        .unwrap();

    assert_eq!(srv.get("/admin/users", Some(&guest)).await.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .post(srv.url("/rbac/rules"))
        .bearer_auth(&admin)
        .json(&json!({ "role_id": guest_role, "element_id": users_element, "read": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let rule: Value = res.json().await.unwrap();
    let rule_id = rule["id"].as_i64().unwrap();
    assert_eq!(rule["read"], true);
    assert_eq!(rule["read_all"], false);

    let body: Value = srv.get("/admin/users", Some(&guest)).await.json().await.unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 1);

    let dup = srv
        .client
        .post(srv.url("/rbac/rules"))
        .bearer_auth(&admin)
        .json(&json!({ "role_id": guest_role, "element_id": users_element }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .patch(srv.url(&format!("/rbac/rules/{rule_id}")))
        .bearer_auth(&admin)
        .json(&json!({ "read_all": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = srv.get("/admin/users", Some(&guest)).await.json().await.unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 6);

    let res = srv
        .client
        .delete(srv.url(&format!("/rbac/rules/{rule_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(srv.get("/admin/users", Some(&guest)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        srv.get(&format!("/rbac/rules/{rule_id}"), Some(&admin)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn explain_describes_the_callers_decision() {
    let srv = TestServer::spawn().await;
    let user = srv.token("user1@example.com").await;

    let res = srv
        .get("/rbac/explain?element=users&action=update&is_owner=true", Some(&user))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["granted"], false);
    assert_eq!(body["denial_reason"]["kind"], "missing_capability");

    let body: Value = srv
        .get("/rbac/explain?element=users&action=read&is_owner=true", Some(&user))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["granted"], true);
    assert_eq!(body["scope"], "own_only");

    let res = srv.get("/rbac/explain?element=users&action=fly", Some(&user)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        srv.get("/rbac/explain?element=users&action=read", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Malformed requests
// ─────────────────────────────────────────────────────────────────────────────

async fn assert_json_error(res: reqwest::Response, status: StatusCode, code: &str) {
    assert_eq!(res.status(), status);
    let body: Value = res.json().await.expect("error body is JSON");
    assert_eq!(body["error"], code);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn anonymous_callers_get_401_before_body_or_path_parsing() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .patch(srv.url("/admin/users/abc"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_json_error(res, StatusCode::UNAUTHORIZED, "unauthenticated").await;

    let res = srv
        .client
        .post(srv.url("/users/profile/password"))
        .send()
        .await
        .unwrap();
    assert_json_error(res, StatusCode::UNAUTHORIZED, "unauthenticated").await;
}

#[tokio::test]
async fn unparseable_path_ids_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;
    let res = srv.get("/admin/users/abc", Some(&admin)).await;
    assert_json_error(res, StatusCode::BAD_REQUEST, "validation_error").await;

    let res = srv.get("/rbac/rules/not-a-number", Some(&admin)).await;
    assert_json_error(res, StatusCode::BAD_REQUEST, "validation_error").await;
}

#[tokio::test]
async fn malformed_bodies_and_queries_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let admin = srv.token("admin@test.com").await;

    let res = srv
        .client
        .post(srv.url("/rbac/rules"))
        .bearer_auth(&admin)
        .header("content-type", "application/json")
        .body("{\"role_id\":")
        .send()
        .await
        .unwrap();
    assert_json_error(res, StatusCode::BAD_REQUEST, "validation_error").await;

    let res = srv
        .client
        .post(srv.url("/users/registration"))
        .json(&json!({ "email": "missing-fields@example.com" }))
        .send()
        .await
        .unwrap();
    assert_json_error(res, StatusCode::BAD_REQUEST, "validation_error").await;

    let res = srv.get("/rbac/explain?element=users&action=fly", Some(&admin)).await;
    assert_json_error(res, StatusCode::BAD_REQUEST, "validation_error").await;
}

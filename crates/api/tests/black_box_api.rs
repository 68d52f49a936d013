use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::json;

use portcullis_api::app::{self, InMemoryBackends};
use portcullis_api::middleware::ClaimsSource;
use portcullis_auth::{AccountState, Hs256TokenVerifier, TOP_ADMIN_GROUP};
use portcullis_core::keys;
use portcullis_infra::{AccountStateStore, IdentityProvider};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    backends: InMemoryBackends,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Bearer-token variant (the default deployment shape).
    async fn spawn() -> Self {
        Self::spawn_with(ClaimsSource::Bearer {
            verifier: Arc::new(Hs256TokenVerifier::new(JWT_SECRET.as_bytes())),
        })
        .await
    }

    async fn spawn_with(claims: ClaimsSource) -> Self {
        // Same router as prod, in-memory backends, ephemeral port.
        let (services, backends) = app::build_in_memory();
        let router = app::build_app(services, claims);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url,
            backends,
            handle,
        }
    }

    /// Seed an admin in the identity provider and mint a matching token.
    fn seed_admin(&self, email: &str) -> (String, String) {
        let user = self.backends.idp.seed_user(email, &[TOP_ADMIN_GROUP]);
        let token = mint_token(&user.user_id, email, &[TOP_ADMIN_GROUP]);
        (user.user_id, token)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_token(sub: &str, email: &str, groups: &[&str]) -> String {
    let claims = json!({
        "sub": sub,
        "email": email,
        "groups": groups,
        "exp": (Utc::now() + ChronoDuration::minutes(10)).timestamp(),
    });

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

// ─────────────────────────────────────────────────────────────────────────────
// Public surface
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_without_credentials_returns_null_principal() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/me", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["principal"].is_null());
    assert!(body["state"].is_null());
    assert_eq!(body["capabilities"], json!([]));
    assert_eq!(body["grants"], json!([]));
}

#[tokio::test]
async fn me_with_garbage_token_is_unauthorized() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/me", srv.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

// ─────────────────────────────────────────────────────────────────────────────
// New-signup flow and self-heal
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_gated_call_heals_state_from_null_to_active() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    // Optional resolution: no row yet, no repair.
    let body: serde_json::Value = client
        .get(format!("{}/me", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["principal"]["email"], "boss@x.com");
    assert!(body["state"].is_null());

    // First ACTIVE-gated call self-heals the row and succeeds.
    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = client
        .get(format!("{}/me", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "ACTIVE");
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin gating
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_authentication() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/admin/users", srv.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_the_admin_group() {
    let srv = TestServer::spawn().await;
    let user = srv.backends.idp.seed_user("mortal@x.com", &["viewer"]);
    let token = mint_token(&user.user_id, "mortal@x.com", &["viewer"]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn suspended_admin_fails_closed_despite_valid_credentials() {
    let srv = TestServer::spawn().await;
    let (admin_id, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    // Establish the state row, then suspend out-of-band.
    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    srv.backends
        .accounts
        .update_state(
            &keys::account_state_key(&admin_id),
            AccountState::Suspended,
            "security",
            Some("incident"),
        )
        .await
        .unwrap();

    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

// ─────────────────────────────────────────────────────────────────────────────
// User lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_create_returns_conflict_with_existing_representation() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "a@b.com", "groups": ["viewer"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["state"], "ACTIVE");

    let res = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "a@b.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["user"]["email"], "a@b.com");
    assert_eq!(body["user"]["state"], "ACTIVE");
}

#[tokio::test]
async fn caller_supplied_state_is_ignored_at_creation() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    // "state" is not part of the contract; accounts always start ACTIVE.
    let res = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "sneaky@x.com", "state": "DISABLED"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["state"], "ACTIVE");
}

#[tokio::test]
async fn unknown_group_on_create_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "n@x.com", "groups": ["made-up"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn disabling_a_user_turns_off_idp_login_and_stores_the_state() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "target@x.com"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = created["user_id"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("{}/admin/users/state", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "target@x.com", "state": "DISABLED", "reason": "offboarding"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["state"], "DISABLED");
    assert_eq!(body["login_enabled"], false);

    let idp_user = srv.backends.idp.get_user(&user_id).await.unwrap().unwrap();
    assert!(!idp_user.login_enabled);

    let record = srv
        .backends
        .accounts
        .get(&keys::account_state_key(&user_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state, AccountState::Disabled);
    assert_eq!(record.last_reason.as_deref(), Some("offboarding"));
}

#[tokio::test]
async fn invalid_state_value_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let res = client
        .patch(format!("{}/admin/users/state", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "boss@x.com", "state": "banished"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admins_cannot_lock_themselves_out_but_can_demote_peers() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    srv.backends.idp.seed_user("peer@x.com", &[TOP_ADMIN_GROUP]);
    let client = reqwest::Client::new();

    let res = client
        .patch(format!("{}/admin/users/groups", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "boss@x.com", "set": ["viewer"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(format!("{}/admin/users/groups", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "peer@x.com", "set": ["viewer"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["groups"], json!(["viewer"]));
}

#[tokio::test]
async fn group_update_rejects_set_combined_with_delta() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let res = client
        .patch(format!("{}/admin/users/groups", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "boss@x.com", "set": ["viewer"], "add": ["support"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn self_deletion_is_rejected_and_others_can_be_deleted() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let victim = srv.backends.idp.seed_user("victim@x.com", &["viewer"]);
    let client = reqwest::Client::new();

    let res = client
        .delete(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "boss@x.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "victim@x.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(srv
        .backends
        .idp
        .get_user(&victim.user_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deleting_an_unknown_user_is_not_found() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    let res = client
        .delete(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({"email": "ghost@x.com"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants and capabilities through /me
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn provisioned_grants_and_capabilities_show_up_in_me() {
    let srv = TestServer::spawn().await;
    let (_, admin_token) = srv.seed_admin("boss@x.com");
    let client = reqwest::Client::new();

    srv.backends
        .capabilities
        .insert(keys::group_key("viewer"), ["reports.read"]);
    let user = srv.backends.idp.seed_user("owner@x.com", &["viewer"]);

    let res = client
        .post(format!("{}/admin/grants", srv.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({"user_id": user.user_id, "resource": "STORE#42", "permission": "OWNER"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let token = mint_token(&user.user_id, "owner@x.com", &["viewer"]);
    let body: serde_json::Value = client
        .get(format!("{}/me", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["capabilities"], json!(["reports.read"]));
    assert_eq!(
        body["grants"],
        json!([{"resource": "STORE#42", "permission": "OWNER"}])
    );
}

#[tokio::test]
async fn revoked_grants_disappear() {
    let srv = TestServer::spawn().await;
    let (_, admin_token) = srv.seed_admin("boss@x.com");
    let user = srv.backends.idp.seed_user("owner@x.com", &[]);
    let client = reqwest::Client::new();

    let grant = json!({"user_id": user.user_id, "resource": "STORE#42", "permission": "OWNER"});
    client
        .post(format!("{}/admin/grants", srv.base_url))
        .bearer_auth(&admin_token)
        .json(&grant)
        .send()
        .await
        .unwrap();

    let res = client
        .delete(format!("{}/admin/grants", srv.base_url))
        .bearer_auth(&admin_token)
        .json(&grant)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let token = mint_token(&user.user_id, "owner@x.com", &[]);
    let body: serde_json::Value = client
        .get(format!("{}/me", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["grants"], json!([]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway-injected claims variant
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gateway_claims_header_drives_the_same_surface() {
    let srv = TestServer::spawn_with(ClaimsSource::Gateway {
        header: "x-verified-claims".to_string(),
    })
    .await;
    let admin = srv.backends.idp.seed_user("boss@x.com", &[TOP_ADMIN_GROUP]);
    let client = reqwest::Client::new();

    let claims = json!({
        "sub": admin.user_id,
        "email": "boss@x.com",
        // Comma-joined encoding, as some gateways flatten arrays.
        "groups": TOP_ADMIN_GROUP,
    });

    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .header("x-verified-claims", claims.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Without the header the same request is unauthenticated.
    let res = client
        .get(format!("{}/admin/users", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

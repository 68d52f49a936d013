//! Request DTOs and JSON mapping helpers.

use serde::Deserialize;

use portcullis_auth::AuthContext;
use portcullis_infra::UserSummary;

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub groups: Option<Vec<String>>,
}

/// Group update: either `set` (replace) or `add`/`remove` (delta), never both.
#[derive(Debug, Deserialize)]
pub struct UpdateGroupsRequest {
    pub email: String,
    pub set: Option<Vec<String>>,
    pub add: Option<Vec<String>>,
    pub remove: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub email: String,
    pub state: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: String,
    pub resource: String,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON mapping
// ─────────────────────────────────────────────────────────────────────────────

pub fn user_to_json(user: &UserSummary) -> serde_json::Value {
    serde_json::json!({
        "user_id": user.user_id,
        "email": user.email,
        "name": user.display_name,
        "login_enabled": user.login_enabled,
        "groups": user.groups,
        "state": user.state,
    })
}

/// `/me` payload. Unauthenticated callers get the same shape with a null
/// principal and empty collections.
pub fn context_to_json(ctx: Option<&AuthContext>) -> serde_json::Value {
    match ctx {
        None => serde_json::json!({
            "principal": null,
            "state": null,
            "capabilities": [],
            "grants": [],
        }),
        Some(ctx) => serde_json::json!({
            "principal": {
                "user_id": ctx.principal.user_id,
                "email": ctx.principal.email,
                "groups": ctx.principal.groups,
            },
            "state": ctx.state,
            "capabilities": ctx.capabilities,
            "grants": ctx.grants,
        }),
    }
}

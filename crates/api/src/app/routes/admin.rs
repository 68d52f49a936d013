//! Admin routes for user lifecycle and grant management.
//!
//! Every handler passes the same gate before touching anything: principal
//! extracted → top admin group → ACTIVE account state (self-healed). No
//! path under `/admin` skips a step.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use portcullis_auth::{AccountState, AuthContext, TOP_ADMIN_GROUP, require_group};
use portcullis_core::AuthError;
use portcullis_infra::{CreateUserInput, CreateUserOutcome, GroupChange};

use crate::app::{dto, errors, services::AppServices};
use crate::context::MaybePrincipal;

/// Default and maximum page sizes for user listings.
const DEFAULT_PAGE_SIZE: usize = 25;
const MAX_PAGE_SIZE: usize = 100;

pub fn router() -> Router {
    Router::new()
        .route(
            "/users",
            get(list_users)
                .post(create_user)
                .delete(delete_user),
        )
        .route("/users/groups", patch(update_groups))
        .route("/users/state", patch(update_state))
        .route("/grants", post(provision_grant).delete(revoke_grant))
}

/// The admin gate. Group membership is checked before the resolver runs so
/// non-admin callers never trigger store fetches or self-heal writes.
async fn admin_gate(
    services: &AppServices,
    principal: MaybePrincipal,
) -> Result<AuthContext, axum::response::Response> {
    let principal = principal
        .0
        .ok_or(AuthError::Unauthenticated)
        .map_err(|e| errors::error_response(&e))?;

    require_group(&principal, TOP_ADMIN_GROUP).map_err(|e| errors::error_response(&e))?;

    services
        .resolver
        .resolve_required(Some(principal))
        .await
        .map_err(|e| errors::error_response(&e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    let ctx = match admin_gate(&services, principal).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let input = CreateUserInput {
        email: body.email,
        display_name: body.name,
        groups: body.groups.unwrap_or_default(),
    };

    match services.admin.create_user(&ctx.principal, input).await {
        Ok(CreateUserOutcome::Created(user)) => {
            (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response()
        }
        // Duplicate create: conflict envelope plus the existing user's
        // current representation.
        Ok(CreateUserOutcome::AlreadyExists(user)) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "conflict",
                "message": format!("user {} already exists", user.email),
                "user": dto::user_to_json(&user),
            })),
        )
            .into_response(),
        Err(e) => errors::error_response(&e),
    }
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Query(query): Query<dto::ListUsersQuery>,
) -> axum::response::Response {
    if let Err(resp) = admin_gate(&services, principal).await {
        return resp;
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    match services
        .admin
        .list_users(limit, query.page_token.as_deref())
        .await
    {
        Ok((users, next_token)) => {
            let items: Vec<_> = users.iter().map(dto::user_to_json).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "items": items,
                    "next_token": next_token,
                })),
            )
                .into_response()
        }
        Err(e) => errors::error_response(&e),
    }
}

/// PATCH /admin/users/groups
pub async fn update_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::UpdateGroupsRequest>,
) -> axum::response::Response {
    let ctx = match admin_gate(&services, principal).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let change = match (body.set, body.add, body.remove) {
        (Some(set), None, None) => GroupChange::Set(set),
        (Some(_), _, _) => {
            return errors::error_response(&AuthError::bad_request(
                "'set' cannot be combined with 'add'/'remove'",
            ));
        }
        (None, None, None) => {
            return errors::error_response(&AuthError::bad_request(
                "one of 'set' or 'add'/'remove' is required",
            ));
        }
        (None, add, remove) => GroupChange::Delta {
            add: add.unwrap_or_default(),
            remove: remove.unwrap_or_default(),
        },
    };

    match services
        .admin
        .update_groups(&ctx.principal, &body.email, change)
        .await
    {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::error_response(&e),
    }
}

/// PATCH /admin/users/state
pub async fn update_state(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::UpdateStateRequest>,
) -> axum::response::Response {
    let ctx = match admin_gate(&services, principal).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let state = match AccountState::from_str(&body.state) {
        Ok(state) => state,
        Err(e) => return errors::error_response(&AuthError::bad_request(e.to_string())),
    };

    match services
        .admin
        .update_state(&ctx.principal, &body.email, state, body.reason.as_deref())
        .await
    {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::error_response(&e),
    }
}

/// DELETE /admin/users
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::DeleteUserRequest>,
) -> axum::response::Response {
    let ctx = match admin_gate(&services, principal).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    match services.admin.delete_user(&ctx.principal, &body.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": body.email })),
        )
            .into_response(),
        Err(e) => errors::error_response(&e),
    }
}

/// POST /admin/grants
pub async fn provision_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = admin_gate(&services, principal).await {
        return resp;
    }

    match services
        .admin
        .provision_grant(&body.user_id, &body.resource, &body.permission)
        .await
    {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::error_response(&e),
    }
}

/// DELETE /admin/grants
pub async fn revoke_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = admin_gate(&services, principal).await {
        return resp;
    }

    match services
        .admin
        .revoke_grant(&body.user_id, &body.resource, &body.permission)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::error_response(&e),
    }
}

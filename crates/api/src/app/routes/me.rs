use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::{dto, errors, services::AppServices};
use crate::context::MaybePrincipal;

/// GET /me — optional auth: resolves whatever context the caller has.
///
/// Unauthenticated callers get `principal: null`, not an error, and this
/// path never creates an account-state row.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<MaybePrincipal>,
) -> axum::response::Response {
    match services.resolver.resolve_optional(principal.0).await {
        Ok(ctx) => Json(dto::context_to_json(ctx.as_ref())).into_response(),
        Err(e) => errors::error_response(&e),
    }
}

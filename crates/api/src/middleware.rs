use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use portcullis_auth::{Principal, TokenVerifier, principal_from_claims};
use portcullis_core::{AuthError, AuthResult};

use crate::app::errors;
use crate::context::MaybePrincipal;

/// Where verified claims come from.
///
/// Exactly one source is configured per deployment; the two variants are the
/// same contract with different transport.
#[derive(Clone)]
pub enum ClaimsSource {
    /// An upstream token-verifying gateway injects a JSON claims object into
    /// the named request header. Trust in that header is a deployment
    /// concern (the gateway strips it from client traffic).
    Gateway { header: String },

    /// Raw `Authorization: Bearer <token>` verified here through the
    /// injected verifier.
    Bearer { verifier: Arc<dyn TokenVerifier> },
}

#[derive(Clone)]
pub struct AuthState {
    pub source: ClaimsSource,
}

/// Extract a principal (or its absence) and stash it on the request.
///
/// Absent credentials are not an error here — optional routes must still
/// run. A credential that is present but invalid is rejected immediately
/// with 401, before any handler.
pub async fn claims_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let principal = extract_principal(&state.source, req.headers())
        .map_err(|e| errors::error_response(&e))?;

    req.extensions_mut().insert(MaybePrincipal(principal));
    Ok(next.run(req).await)
}

fn extract_principal(
    source: &ClaimsSource,
    headers: &HeaderMap,
) -> AuthResult<Option<Principal>> {
    match source {
        ClaimsSource::Gateway { header } => {
            let Some(raw) = headers.get(header.as_str()) else {
                return Ok(None);
            };
            let raw = raw.to_str().map_err(|_| AuthError::Unauthenticated)?;
            let claims: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(raw).map_err(|_| AuthError::Unauthenticated)?;
            principal_from_claims(claims).map(Some)
        }
        ClaimsSource::Bearer { verifier } => {
            let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
                return Ok(None);
            };
            let header = header.to_str().map_err(|_| AuthError::Unauthenticated)?;
            let token = header
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(AuthError::Unauthenticated)?;

            let claims = verifier.verify(token).map_err(|err| {
                // The specific upstream reason stays in the logs only.
                tracing::debug!(error = %err, "bearer token rejected");
                AuthError::Unauthenticated
            })?;
            principal_from_claims(claims).map(Some)
        }
    }
}

//! HTTP application wiring (axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store/identity-provider/resolver wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::middleware::{self, AuthState, ClaimsSource};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, InMemoryBackends, build_in_memory, build_postgres};

/// Build the full HTTP router.
///
/// `/health` sits outside the claims middleware; everything else gets a
/// `MaybePrincipal` extension and decides per-route whether authentication
/// is required.
pub fn build_app(services: AppServices, claims: ClaimsSource) -> Router {
    let auth_state = AuthState { source: claims };

    let authed = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::claims_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(authed)
}

use axum::{Router, routing::get};

pub mod admin;
pub mod me;
pub mod system;

/// Router for every endpoint behind the claims middleware.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(me::me))
        .nest("/admin", admin::router())
}

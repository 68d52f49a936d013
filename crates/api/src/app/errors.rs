use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use portcullis_core::AuthError;

/// Map an `AuthError` onto the response envelope.
///
/// Internal failures are logged with their detail and surfaced with a
/// generic message; everything else carries its own text.
pub fn error_response(err: &AuthError) -> axum::response::Response {
    let status = match err {
        AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AuthError::Conflict(_) => StatusCode::CONFLICT,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if let AuthError::Internal(detail) = err {
        tracing::error!(error = %detail, "collaborator call failed");
        return json_error(status, err.code(), "unexpected internal error");
    }

    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

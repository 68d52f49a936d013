//! Authorization error model.

use thiserror::Error;

/// Result type used across the authorization core.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authorization-plane error.
///
/// Every failure a request can surface maps onto exactly one of these
/// variants; the HTTP layer translates them to status codes without
/// inspecting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential, or a credential that failed verification.
    ///
    /// Verifier failures collapse here regardless of the upstream reason
    /// (expired/malformed/bad signature all look the same to the caller).
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated but lacking a required group, capability, or grant,
    /// or the account is not ACTIVE.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed or invalid input (unknown group name, missing field).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Duplicate resource on create.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced principal or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected failure in a collaborator call (store, identity provider).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

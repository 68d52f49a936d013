//! `portcullis-auth` — pure authentication/authorization boundary (zero-trust).
//!
//! This crate interprets already-verified claims and enforces business rules
//! on top of them. It is intentionally decoupled from HTTP and storage; the
//! only I/O-adjacent piece is the [`TokenVerifier`] seam, whose
//! implementations validate token cryptography elsewhere.

pub mod claims;
pub mod context;
pub mod groups;
pub mod guard;
pub mod principal;
pub mod state;
pub mod verifier;

pub use claims::{normalize_groups, principal_from_claims};
pub use context::{AuthContext, Grant};
pub use groups::{ALLOWED_GROUPS, TOP_ADMIN_GROUP, is_allowed_group};
pub use guard::{has_group, require_any_group, require_group};
pub use principal::Principal;
pub use state::{AccountRecord, AccountState, ParseStateError};
pub use verifier::{Hs256TokenVerifier, InvalidToken, TokenVerifier};

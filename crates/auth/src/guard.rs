//! Group membership guards.
//!
//! - No I/O
//! - No panics
//! - No business logic (pure policy checks)

use portcullis_core::{AuthError, AuthResult};

use crate::Principal;

/// Membership test.
pub fn has_group(principal: &Principal, group: &str) -> bool {
    principal.groups.contains(group)
}

/// Fail `Forbidden` unless the principal holds `group`.
pub fn require_group(principal: &Principal, group: &str) -> AuthResult<()> {
    if has_group(principal, group) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!("missing group '{group}'")))
    }
}

/// Fail `Forbidden` unless the principal holds at least one of `groups`.
///
/// The error message enumerates every acceptable group so a denied caller
/// can see what would have passed.
pub fn require_any_group(principal: &Principal, groups: &[&str]) -> AuthResult<()> {
    if groups.iter().any(|g| has_group(principal, g)) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "requires one of groups [{}]",
            groups.join(", ")
        )))
    }
}

//! Claims interpretation: verified-claims mapping → [`Principal`].
//!
//! Verification (signature, expiry, audience, issuer) happens upstream —
//! either in the gateway that injected the claims or in a
//! [`crate::TokenVerifier`]. This module only interprets the result.

use std::collections::BTreeSet;

use serde_json::Value;

use portcullis_core::{AuthError, AuthResult};

use crate::Principal;

/// Claim carrying the subject identifier.
pub const SUB_CLAIM: &str = "sub";
/// Claim carrying the email, when present.
pub const EMAIL_CLAIM: &str = "email";
/// Claim carrying group membership, in whatever shape the issuer picked.
pub const GROUPS_CLAIM: &str = "groups";

/// Build a [`Principal`] from a verified claims mapping.
///
/// Fails `Unauthenticated` iff the subject claim is missing or blank after
/// trimming. Everything else is best-effort: a missing email stays `None`,
/// malformed groups degrade to whatever [`normalize_groups`] salvages.
pub fn principal_from_claims(
    claims: serde_json::Map<String, Value>,
) -> AuthResult<Principal> {
    let user_id = claims
        .get(SUB_CLAIM)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::Unauthenticated)?
        .to_string();

    let email = claims
        .get(EMAIL_CLAIM)
        .and_then(Value::as_str)
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let groups = normalize_groups(claims.get(GROUPS_CLAIM));

    Ok(Principal {
        user_id,
        email,
        groups,
        claims,
    })
}

/// Normalize a group claim into a set of group names.
///
/// Issuers encode this claim inconsistently; the patterns below are tried in
/// order and the function is total — malformed input degrades to best-effort
/// parsing, never to an error:
///
/// - absent / null → empty set
/// - JSON array → entries stringified, trimmed, empties dropped
/// - string that parses as a JSON array → same cleanup
/// - string containing commas → split on `,`, trimmed
/// - any other bare string → singleton set
pub fn normalize_groups(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => clean(items.iter().map(element_to_string)),
        Some(Value::String(s)) => {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
                return clean(items.iter().map(element_to_string));
            }
            clean(s.split(',').map(str::to_string))
        }
        // Scalar of another type (number, bool): treat like a bare string.
        Some(other) => clean(std::iter::once(element_to_string(other))),
    }
}

fn element_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clean(items: impl Iterator<Item = String>) -> BTreeSet<String> {
    items
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

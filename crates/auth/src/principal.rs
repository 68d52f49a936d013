use std::collections::BTreeSet;

use serde::Serialize;

/// Identity of an authenticated caller, normalized for one request.
///
/// A `Principal` is derived from verified claims and never persisted. The
/// subject id is the canonical key for every internal record; the email is a
/// human-facing handle only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Stable subject identifier from the token issuer. Never empty.
    pub user_id: String,

    /// Lower-cased, trimmed email, when the issuer provided one.
    pub email: Option<String>,

    /// Normalized group membership (order-irrelevant, de-duplicated).
    pub groups: BTreeSet<String>,

    /// Raw claims retained for diagnostics. Opaque to authorization logic.
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl Principal {
    /// Test/fixture constructor; production principals come from
    /// [`crate::principal_from_claims`].
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            groups: BTreeSet::new(),
            claims: serde_json::Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into().trim().to_lowercase());
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

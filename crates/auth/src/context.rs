//! Per-request authorization context.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{AccountState, Principal};

/// One fine-grained permission held by a principal on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub resource: String,
    pub permission: String,
}

/// Everything known about the caller, assembled once per request and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub principal: Principal,
    /// `None` when no account-state row exists yet (optional resolution does
    /// not self-heal; the first ACTIVE-gated request creates the row).
    pub state: Option<AccountState>,
    /// Union of the capability sets of the principal's groups.
    pub capabilities: BTreeSet<String>,
    /// Fine-grained grants, in store order (for display/debugging).
    pub grants: Vec<Grant>,
}

impl AuthContext {
    /// Convenience combinator over capabilities + grants: true if the
    /// permission is in the capability set, or (when a resource is given) a
    /// matching grant exists. Not a separate data source.
    pub fn can(&self, permission: &str, resource: Option<&str>) -> bool {
        if self.capabilities.contains(permission) {
            return true;
        }
        match resource {
            Some(resource) => self
                .grants
                .iter()
                .any(|g| g.resource == resource && g.permission == permission),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AuthContext {
        AuthContext {
            principal: Principal::new("u-1"),
            state: Some(AccountState::Active),
            capabilities: ["billing.read".to_string()].into_iter().collect(),
            grants: vec![Grant {
                resource: "STORE#42".to_string(),
                permission: "OWNER".to_string(),
            }],
        }
    }

    #[test]
    fn capability_alone_suffices() {
        assert!(context().can("billing.read", None));
        assert!(!context().can("billing.write", None));
    }

    #[test]
    fn grant_requires_matching_resource() {
        let ctx = context();
        assert!(ctx.can("OWNER", Some("STORE#42")));
        assert!(!ctx.can("OWNER", Some("STORE#43")));
        assert!(!ctx.can("OWNER", None));
    }
}

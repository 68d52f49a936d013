//! Composite key conventions for the key-value collaborator stores.
//!
//! Keys are plain strings with `#`-separated segments so that prefix queries
//! over a sort key cover whole resource subtrees. All builders live here so
//! no call site hand-assembles a key.

/// Account-state record key: `USER#<user_id>`.
pub fn account_state_key(user_id: &str) -> String {
    format!("USER#{user_id}")
}

/// Group→capability record key: `GROUP#<name>`.
pub fn group_key(group: &str) -> String {
    format!("GROUP#{group}")
}

/// Grant partition key: `PRINCIPAL#USER#<user_id>`.
pub fn grant_partition_key(user_id: &str) -> String {
    format!("PRINCIPAL#USER#{user_id}")
}

/// Grant sort key: `RESOURCE#<resource>#PERM#<perm>`.
pub fn grant_sort_key(resource: &str, perm: &str) -> String {
    format!("RESOURCE#{resource}#PERM#{perm}")
}

/// Prefix matching every grant on one resource, any permission.
pub fn grant_resource_prefix(resource: &str) -> String {
    format!("RESOURCE#{resource}#PERM#")
}

/// Sort key of the owner grant for a store resource:
/// `RESOURCE#STORE#<store_id>#PERM#OWNER`.
pub fn store_owner_sort_key(store_id: &str) -> String {
    grant_sort_key(&format!("STORE#{store_id}"), "OWNER")
}

/// Split a grant sort key back into `(resource, permission)`.
///
/// Returns `None` for keys that do not follow the convention (foreign rows
/// are skipped, not treated as errors).
pub fn parse_grant_sort_key(sort_key: &str) -> Option<(String, String)> {
    let rest = sort_key.strip_prefix("RESOURCE#")?;
    let (resource, perm) = rest.rsplit_once("#PERM#")?;
    if resource.is_empty() || perm.is_empty() {
        return None;
    }
    Some((resource.to_string(), perm.to_string()))
}

//! Group→capability resolution.

use std::collections::BTreeSet;

use portcullis_core::{AuthResult, keys};

use crate::store::CapabilityStore;

/// Effective capabilities for a set of groups: one batch fetch, then the
/// de-duplicated union of every group's capability set.
///
/// Empty input short-circuits without touching the store. Groups with no
/// record contribute nothing — unknown groups are not an error.
pub async fn resolve_capabilities<S>(
    groups: &BTreeSet<String>,
    store: &S,
) -> AuthResult<BTreeSet<String>>
where
    S: CapabilityStore + ?Sized,
{
    if groups.is_empty() {
        return Ok(BTreeSet::new());
    }

    let group_keys: Vec<String> = groups.iter().map(|g| keys::group_key(g)).collect();
    let records = store.batch_get(&group_keys).await?;

    Ok(records.into_values().flatten().collect())
}

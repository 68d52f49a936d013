//! Fine-grained grant resolution.

use portcullis_auth::{Grant, Principal, TOP_ADMIN_GROUP, has_group};
use portcullis_core::{AuthError, AuthResult, keys};

use crate::store::GrantStore;

/// Existence-only check: does the principal hold at least one grant whose
/// sort key starts with `sort_key_prefix`?
///
/// Prefix matching lets one grant cover sub-permissions sharing a resource
/// prefix, and expresses "is owner of X" without an exact-key read.
pub async fn has_grant<S>(
    store: &S,
    user_id: &str,
    sort_key_prefix: &str,
) -> AuthResult<bool>
where
    S: GrantStore + ?Sized,
{
    let items = store
        .query_prefix(&keys::grant_partition_key(user_id), Some(sort_key_prefix))
        .await?;
    Ok(!items.is_empty())
}

/// Every grant held by the principal, in sort-key order. Used to populate an
/// `AuthContext` for display/debugging — the boolean checks never enumerate.
pub async fn list_grants<S>(store: &S, user_id: &str) -> AuthResult<Vec<Grant>>
where
    S: GrantStore + ?Sized,
{
    let items = store
        .query_prefix(&keys::grant_partition_key(user_id), None)
        .await?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            keys::parse_grant_sort_key(&item.sort_key).map(|(resource, permission)| Grant {
                resource,
                permission,
            })
        })
        .collect())
}

/// Require that the principal owns store `store_id`.
///
/// Members of the top administrative group pass unconditionally — this
/// override is deliberate and lives here so every bypass goes through one
/// auditable call site.
pub async fn require_store_owner<S>(
    store: &S,
    principal: &Principal,
    store_id: &str,
) -> AuthResult<()>
where
    S: GrantStore + ?Sized,
{
    if has_group(principal, TOP_ADMIN_GROUP) {
        tracing::debug!(
            user_id = %principal.user_id,
            store_id,
            "store-owner check satisfied by top admin group"
        );
        return Ok(());
    }

    if has_grant(
        store,
        &principal.user_id,
        &keys::store_owner_sort_key(store_id),
    )
    .await?
    {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "not an owner of store {store_id}"
        )))
    }
}

//! Per-request `AuthContext` assembly.

use std::sync::Arc;

use portcullis_auth::{AccountRecord, AccountState, AuthContext, Principal};
use portcullis_core::{AuthError, AuthResult, keys};

use crate::resolver::{list_grants, resolve_capabilities};
use crate::store::{AccountStateStore, CapabilityStore, CreateOutcome, GrantStore};

/// Actor recorded on rows the resolver creates transparently.
pub const SELF_HEAL_ACTOR: &str = "system:self-heal";

/// Resolves principals into `AuthContext`s against the three stores.
///
/// Handles are shared (`Arc`) and injected at construction — there is no
/// global client state anywhere in this plane.
#[derive(Clone)]
pub struct AuthContextResolver {
    accounts: Arc<dyn AccountStateStore>,
    capabilities: Arc<dyn CapabilityStore>,
    grants: Arc<dyn GrantStore>,
}

impl AuthContextResolver {
    pub fn new(
        accounts: Arc<dyn AccountStateStore>,
        capabilities: Arc<dyn CapabilityStore>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        Self {
            accounts,
            capabilities,
            grants,
        }
    }

    /// Resolve without requiring authentication.
    ///
    /// `None` principal → `Ok(None)`; this path never fails on absent
    /// credentials and never self-heals (the context reports `state: null`
    /// until an ACTIVE-gated request creates the row).
    pub async fn resolve_optional(
        &self,
        principal: Option<Principal>,
    ) -> AuthResult<Option<AuthContext>> {
        let Some(principal) = principal else {
            return Ok(None);
        };

        let state_key = keys::account_state_key(&principal.user_id);
        let (record, capabilities, grants) = tokio::try_join!(
            async { Ok::<_, AuthError>(self.accounts.get(&state_key).await?) },
            resolve_capabilities(&principal.groups, &self.capabilities),
            list_grants(&self.grants, &principal.user_id),
        )?;

        Ok(Some(AuthContext {
            principal,
            state: record.map(|r| r.state),
            capabilities,
            grants,
        }))
    }

    /// Resolve and fail closed: `Unauthenticated` without a principal,
    /// `Forbidden` unless the (self-healed) account state is exactly ACTIVE.
    ///
    /// The self-heal runs before the state is evaluated, so a first-time
    /// caller is never rejected for a missing row. All three sub-fetches
    /// must succeed — an incomplete context could under-enforce.
    pub async fn resolve_required(
        &self,
        principal: Option<Principal>,
    ) -> AuthResult<AuthContext> {
        let principal = principal.ok_or(AuthError::Unauthenticated)?;

        let (record, capabilities, grants) = tokio::try_join!(
            self.ensure_account_record(&principal),
            resolve_capabilities(&principal.groups, &self.capabilities),
            list_grants(&self.grants, &principal.user_id),
        )?;

        if record.state != AccountState::Active {
            return Err(AuthError::forbidden(format!(
                "account is not active (state: {})",
                record.state
            )));
        }

        Ok(AuthContext {
            principal,
            state: Some(record.state),
            capabilities,
            grants,
        })
    }

    /// Create-if-absent with the ACTIVE default, then hand back whichever
    /// record now exists. Losing the creation race just means reading the
    /// winner's row.
    async fn ensure_account_record(&self, principal: &Principal) -> AuthResult<AccountRecord> {
        let key = keys::account_state_key(&principal.user_id);
        let outcome = self
            .accounts
            .create_if_absent(AccountRecord::new(&key, SELF_HEAL_ACTOR, None))
            .await?;

        if let CreateOutcome::Created(record) = &outcome {
            tracing::info!(key = %record.key, "self-healed missing account-state row");
        }

        Ok(outcome.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        GrantItem, InMemoryAccountStateStore, InMemoryCapabilityStore, InMemoryGrantStore,
    };

    fn resolver() -> (
        AuthContextResolver,
        Arc<InMemoryAccountStateStore>,
        Arc<InMemoryCapabilityStore>,
        Arc<InMemoryGrantStore>,
    ) {
        let accounts = Arc::new(InMemoryAccountStateStore::new());
        let capabilities = Arc::new(InMemoryCapabilityStore::new());
        let grants = Arc::new(InMemoryGrantStore::new());
        let resolver = AuthContextResolver::new(
            accounts.clone(),
            capabilities.clone(),
            grants.clone(),
        );
        (resolver, accounts, capabilities, grants)
    }

    #[tokio::test]
    async fn optional_without_principal_is_none() {
        let (resolver, ..) = resolver();
        assert_eq!(resolver.resolve_optional(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn optional_does_not_self_heal() {
        let (resolver, accounts, ..) = resolver();
        let principal = Principal::new("u-new");

        let ctx = resolver
            .resolve_optional(Some(principal))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.state, None);
        assert!(accounts.get("USER#u-new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn required_without_principal_is_unauthenticated() {
        let (resolver, ..) = resolver();
        assert_eq!(
            resolver.resolve_required(None).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn required_self_heals_to_active_exactly_once() {
        let (resolver, accounts, ..) = resolver();
        let principal = Principal::new("u-new");

        let first = resolver
            .resolve_required(Some(principal.clone()))
            .await
            .unwrap();
        assert_eq!(first.state, Some(AccountState::Active));

        let created = accounts.get("USER#u-new").await.unwrap().unwrap();
        assert_eq!(created.created_by, SELF_HEAL_ACTOR);

        // Second resolution observes the same row, not a fresh one.
        let second = resolver.resolve_required(Some(principal)).await.unwrap();
        assert_eq!(second.state, Some(AccountState::Active));
        let after = accounts.get("USER#u-new").await.unwrap().unwrap();
        assert_eq!(after.created_at, created.created_at);
    }

    #[tokio::test]
    async fn required_fails_closed_on_suspended() {
        let (resolver, accounts, ..) = resolver();
        let principal = Principal::new("u-1").with_groups(["viewer"]);

        // Establish the row, then suspend it out-of-band.
        resolver
            .resolve_required(Some(principal.clone()))
            .await
            .unwrap();
        accounts
            .update_state("USER#u-1", AccountState::Suspended, "admin", Some("test"))
            .await
            .unwrap();

        let err = resolver.resolve_required(Some(principal)).await.unwrap_err();
        let AuthError::Forbidden(msg) = err else {
            panic!("expected Forbidden");
        };
        assert!(msg.contains("SUSPENDED"));
    }

    #[tokio::test]
    async fn context_carries_capabilities_and_grants() {
        let (resolver, _, capabilities, grants) = resolver();
        capabilities.insert(keys::group_key("viewer"), ["reports.read"]);
        grants
            .put(GrantItem {
                partition_key: keys::grant_partition_key("u-1"),
                sort_key: keys::store_owner_sort_key("42"),
            })
            .await
            .unwrap();

        let principal = Principal::new("u-1").with_groups(["viewer"]);
        let ctx = resolver.resolve_required(Some(principal)).await.unwrap();

        assert!(ctx.capabilities.contains("reports.read"));
        assert!(ctx.can("reports.read", None));
        assert!(ctx.can("OWNER", Some("STORE#42")));
        assert!(!ctx.can("OWNER", Some("STORE#43")));
    }
}

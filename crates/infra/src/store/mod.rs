//! Key-value collaborator store contracts.
//!
//! Three stores back the authorization core: group→capability lookups, the
//! per-principal grant table, and the authoritative account-state table.
//! Traits make no storage assumptions; the in-memory backends serve tests
//! and dev, the Postgres backends serve production.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use portcullis_auth::{AccountRecord, AccountState};
use portcullis_core::AuthError;

mod in_memory;
mod postgres;

pub use in_memory::{InMemoryAccountStateStore, InMemoryCapabilityStore, InMemoryGrantStore};
pub use postgres::{PostgresAccountStateStore, PostgresCapabilityStore, PostgresGrantStore};

/// Store operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The targeted record does not exist (only for operations that require
    /// one, e.g. `update_state`).
    #[error("record not found: {0}")]
    NotFound(String),

    /// Backend failure (connection, query, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => AuthError::not_found(key),
            StoreError::Backend(msg) => AuthError::internal(msg),
        }
    }
}

/// Group→capability lookup store.
///
/// Records are keyed `GROUP#<name>` and hold a set of capability strings.
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Batch point-lookup. Missing keys are simply absent from the result —
    /// never an error.
    async fn batch_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, BTreeSet<String>>, StoreError>;
}

/// One row of the grant table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GrantItem {
    /// `PRINCIPAL#USER#<user_id>`
    pub partition_key: String,
    /// `RESOURCE#<resource>#PERM#<perm>`
    pub sort_key: String,
}

/// Fine-grained grant store with sort-key prefix queries.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Items under `partition_key` whose sort key starts with
    /// `sort_key_prefix` (all items when `None`), in sort-key order.
    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<GrantItem>, StoreError>;

    /// Idempotent put (re-provisioning an existing grant is a no-op).
    async fn put(&self, item: GrantItem) -> Result<(), StoreError>;

    /// Idempotent delete (removing an absent grant is a no-op).
    async fn delete(&self, partition_key: &str, sort_key: &str) -> Result<(), StoreError>;
}

/// Outcome of an atomic create-if-absent write.
///
/// Losing the creation race is the expected outcome for the loser, not an
/// error; it gets the winner's record back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(AccountRecord),
    AlreadyExists(AccountRecord),
}

impl CreateOutcome {
    pub fn into_record(self) -> AccountRecord {
        match self {
            Self::Created(r) | Self::AlreadyExists(r) => r,
        }
    }
}

/// Authoritative account-lifecycle store, keyed `USER#<user_id>`.
#[async_trait]
pub trait AccountStateStore: Send + Sync {
    /// Strongly-consistent point read.
    async fn get(&self, key: &str) -> Result<Option<AccountRecord>, StoreError>;

    /// Atomic conditional create: writes only if the key is absent. Two
    /// concurrent first-touches must not race to conflicting rows.
    async fn create_if_absent(&self, record: AccountRecord) -> Result<CreateOutcome, StoreError>;

    /// Unconditional update of state + audit fields. Fails `NotFound` if the
    /// row is missing (callers ensure existence first).
    async fn update_state(
        &self,
        key: &str,
        state: AccountState,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<AccountRecord, StoreError>;

    /// Denormalized group mirror for observability. Callers treat failures
    /// as fire-and-log; a missing row is a no-op.
    async fn mirror_groups(&self, key: &str, groups: &[String]) -> Result<(), StoreError>;

    /// Idempotent delete.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// Blanket impls so services can share Arc handles.

#[async_trait]
impl<S> CapabilityStore for Arc<S>
where
    S: CapabilityStore + ?Sized,
{
    async fn batch_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, BTreeSet<String>>, StoreError> {
        (**self).batch_get(keys).await
    }
}

#[async_trait]
impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<GrantItem>, StoreError> {
        (**self).query_prefix(partition_key, sort_key_prefix).await
    }

    async fn put(&self, item: GrantItem) -> Result<(), StoreError> {
        (**self).put(item).await
    }

    async fn delete(&self, partition_key: &str, sort_key: &str) -> Result<(), StoreError> {
        (**self).delete(partition_key, sort_key).await
    }
}

#[async_trait]
impl<S> AccountStateStore for Arc<S>
where
    S: AccountStateStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<AccountRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn create_if_absent(&self, record: AccountRecord) -> Result<CreateOutcome, StoreError> {
        (**self).create_if_absent(record).await
    }

    async fn update_state(
        &self,
        key: &str,
        state: AccountState,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<AccountRecord, StoreError> {
        (**self).update_state(key, state, actor, reason).await
    }

    async fn mirror_groups(&self, key: &str, groups: &[String]) -> Result<(), StoreError> {
        (**self).mirror_groups(key, groups).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

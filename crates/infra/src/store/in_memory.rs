//! In-memory store backends for tests/dev.
//!
//! Semantics match the Postgres backends: `create_if_absent` is atomic (one
//! write lock spans check and insert), grant queries come back in sort-key
//! order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use portcullis_auth::{AccountRecord, AccountState};

use super::{
    AccountStateStore, CapabilityStore, CreateOutcome, GrantItem, GrantStore, StoreError,
};

fn poisoned(_: impl std::fmt::Debug) -> StoreError {
    StoreError::Backend("store lock poisoned".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory group→capability store.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityStore {
    inner: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one group record (dev/test fixture).
    pub fn insert<I, S>(&self, key: impl Into<String>, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let caps = capabilities.into_iter().map(Into::into).collect();
        if let Ok(mut map) = self.inner.write() {
            map.insert(key.into(), caps);
        }
    }
}

#[async_trait]
impl CapabilityStore for InMemoryCapabilityStore {
    async fn batch_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, BTreeSet<String>>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(keys
            .iter()
            .filter_map(|k| map.get(k).map(|caps| (k.clone(), caps.clone())))
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory grant store. Sort keys live in a `BTreeMap` per partition so
/// prefix queries return items in sort-key order, like the real table.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    inner: RwLock<HashMap<String, BTreeMap<String, ()>>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<GrantItem>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        let Some(partition) = map.get(partition_key) else {
            return Ok(Vec::new());
        };

        let prefix = sort_key_prefix.unwrap_or("");
        Ok(partition
            .range(prefix.to_string()..)
            .take_while(|(sk, _)| sk.starts_with(prefix))
            .map(|(sk, _)| GrantItem {
                partition_key: partition_key.to_string(),
                sort_key: sk.clone(),
            })
            .collect())
    }

    async fn put(&self, item: GrantItem) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.entry(item.partition_key)
            .or_default()
            .insert(item.sort_key, ());
        Ok(())
    }

    async fn delete(&self, partition_key: &str, sort_key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        if let Some(partition) = map.get_mut(partition_key) {
            partition.remove(sort_key);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account state
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory account-state store.
#[derive(Debug, Default)]
pub struct InMemoryAccountStateStore {
    inner: RwLock<HashMap<String, AccountRecord>>,
}

impl InMemoryAccountStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStateStore for InMemoryAccountStateStore {
    async fn get(&self, key: &str) -> Result<Option<AccountRecord>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    async fn create_if_absent(&self, record: AccountRecord) -> Result<CreateOutcome, StoreError> {
        // One write lock spans the check and the insert, so concurrent
        // first-touches cannot both create.
        let mut map = self.inner.write().map_err(poisoned)?;
        match map.get(&record.key) {
            Some(existing) => Ok(CreateOutcome::AlreadyExists(existing.clone())),
            None => {
                map.insert(record.key.clone(), record.clone());
                Ok(CreateOutcome::Created(record))
            }
        }
    }

    async fn update_state(
        &self,
        key: &str,
        state: AccountState,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<AccountRecord, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        let record = map
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        record.state = state;
        record.updated_at = Utc::now();
        record.updated_by = actor.to_string();
        record.last_reason = reason.map(str::to_string);
        Ok(record.clone())
    }

    async fn mirror_groups(&self, key: &str, groups: &[String]) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        if let Some(record) = map.get_mut(key) {
            record.groups = groups.to_vec();
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

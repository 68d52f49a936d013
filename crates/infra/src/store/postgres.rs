//! Postgres-backed store implementations.
//!
//! Schema (one table per store):
//!
//! ```sql
//! CREATE TABLE group_capabilities (
//!     key          TEXT PRIMARY KEY,        -- GROUP#<name>
//!     capabilities JSONB NOT NULL           -- ["cap", ...]
//! );
//!
//! CREATE TABLE grants (
//!     partition_key TEXT NOT NULL,          -- PRINCIPAL#USER#<user_id>
//!     sort_key      TEXT NOT NULL,          -- RESOURCE#<r>#PERM#<p>
//!     PRIMARY KEY (partition_key, sort_key)
//! );
//!
//! CREATE TABLE account_state (
//!     key         TEXT PRIMARY KEY,         -- USER#<user_id>
//!     state       TEXT NOT NULL,            -- ACTIVE | SUSPENDED | DISABLED
//!     groups      JSONB NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL,
//!     created_by  TEXT NOT NULL,
//!     updated_by  TEXT NOT NULL,
//!     last_reason TEXT
//! );
//! ```
//!
//! The conditional create maps to `INSERT .. ON CONFLICT DO NOTHING`, which
//! gives the atomic create-if-absent the account-state invariant needs.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use portcullis_auth::{AccountRecord, AccountState};

use super::{
    AccountStateStore, CapabilityStore, CreateOutcome, GrantItem, GrantStore, StoreError,
};

fn map_sqlx_error(op: &str, err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("{op}: {err}"))
}

/// Escape `%`, `_`, and `\` so a key prefix is a literal LIKE prefix.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresCapabilityStore {
    pool: Arc<PgPool>,
}

impl PostgresCapabilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl CapabilityStore for PostgresCapabilityStore {
    #[instrument(skip(self), fields(key_count = keys.len()))]
    async fn batch_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, BTreeSet<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT key, capabilities FROM group_capabilities WHERE key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("capabilities.batch_get", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| map_sqlx_error("capabilities.batch_get", e))?;
            let caps: serde_json::Value = row
                .try_get("capabilities")
                .map_err(|e| map_sqlx_error("capabilities.batch_get", e))?;
            let caps: BTreeSet<String> = serde_json::from_value(caps)
                .map_err(|e| StoreError::Backend(format!("capabilities payload: {e}")))?;
            out.insert(key, caps);
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresGrantStore {
    pool: Arc<PgPool>,
}

impl PostgresGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    #[instrument(skip(self))]
    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<GrantItem>, StoreError> {
        let pattern = like_prefix(sort_key_prefix.unwrap_or(""));
        let rows = sqlx::query(
            r#"
            SELECT partition_key, sort_key FROM grants
            WHERE partition_key = $1 AND sort_key LIKE $2
            ORDER BY sort_key ASC
            "#,
        )
        .bind(partition_key)
        .bind(pattern)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("grants.query_prefix", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(GrantItem {
                    partition_key: row
                        .try_get("partition_key")
                        .map_err(|e| map_sqlx_error("grants.query_prefix", e))?,
                    sort_key: row
                        .try_get("sort_key")
                        .map_err(|e| map_sqlx_error("grants.query_prefix", e))?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn put(&self, item: GrantItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO grants (partition_key, sort_key)
            VALUES ($1, $2)
            ON CONFLICT (partition_key, sort_key) DO NOTHING
            "#,
        )
        .bind(&item.partition_key)
        .bind(&item.sort_key)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("grants.put", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, partition_key: &str, sort_key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM grants WHERE partition_key = $1 AND sort_key = $2")
            .bind(partition_key)
            .bind(sort_key)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("grants.delete", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresAccountStateStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn record_from_row(row: &PgRow) -> Result<AccountRecord, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("account_state.row", e);

    let state_raw: String = row.try_get("state").map_err(get)?;
    let state = AccountState::from_str(&state_raw)
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    let groups: serde_json::Value = row.try_get("groups").map_err(get)?;
    let groups: Vec<String> = serde_json::from_value(groups)
        .map_err(|e| StoreError::Backend(format!("groups payload: {e}")))?;

    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(get)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(get)?;

    Ok(AccountRecord {
        key: row.try_get("key").map_err(get)?,
        state,
        groups,
        created_at,
        updated_at,
        created_by: row.try_get("created_by").map_err(get)?,
        updated_by: row.try_get("updated_by").map_err(get)?,
        last_reason: row.try_get("last_reason").map_err(get)?,
    })
}

const RECORD_COLUMNS: &str =
    "key, state, groups, created_at, updated_at, created_by, updated_by, last_reason";

#[async_trait]
impl AccountStateStore for PostgresAccountStateStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM account_state WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_state.get", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn create_if_absent(&self, record: AccountRecord) -> Result<CreateOutcome, StoreError> {
        let groups = serde_json::to_value(&record.groups)
            .map_err(|e| StoreError::Backend(format!("groups payload: {e}")))?;

        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO account_state
                (key, state, groups, created_at, updated_at, created_by, updated_by, last_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO NOTHING
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(&record.key)
        .bind(record.state.as_str())
        .bind(groups)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(&record.created_by)
        .bind(&record.updated_by)
        .bind(&record.last_reason)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_state.create_if_absent", e))?;

        if let Some(row) = inserted {
            return Ok(CreateOutcome::Created(record_from_row(&row)?));
        }

        // Lost the race (or the row predates us): re-read the winner.
        match self.get(&record.key).await? {
            Some(existing) => Ok(CreateOutcome::AlreadyExists(existing)),
            None => Err(StoreError::Backend(format!(
                "account_state.create_if_absent: row for {} vanished between insert and read",
                record.key
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn update_state(
        &self,
        key: &str,
        state: AccountState,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<AccountRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE account_state
            SET state = $2, updated_at = $3, updated_by = $4, last_reason = $5
            WHERE key = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(key)
        .bind(state.as_str())
        .bind(Utc::now())
        .bind(actor)
        .bind(reason)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_state.update_state", e))?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    #[instrument(skip(self, groups))]
    async fn mirror_groups(&self, key: &str, groups: &[String]) -> Result<(), StoreError> {
        let groups = serde_json::to_value(groups)
            .map_err(|e| StoreError::Backend(format!("groups payload: {e}")))?;

        sqlx::query("UPDATE account_state SET groups = $2, updated_at = $3 WHERE key = $1")
            .bind(key)
            .bind(groups)
            .bind(Utc::now())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("account_state.mirror_groups", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM account_state WHERE key = $1")
            .bind(key)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("account_state.delete", e))?;
        Ok(())
    }
}

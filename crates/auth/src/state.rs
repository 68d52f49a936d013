//! Account lifecycle state.
//!
//! The account state gates every privileged request regardless of credential
//! validity. There is no transition graph: any state may move to any other,
//! but only through an explicit admin transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a principal's account.
///
/// `Suspended` is an application-level restriction only: upstream login still
/// works, this plane rejects the request. `Disabled` additionally revokes the
/// identity provider's login capability (as re-enabling does the reverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    #[default]
    Active,
    Suspended,
    Disabled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid account state '{0}' (expected ACTIVE, SUSPENDED, or DISABLED)")]
pub struct ParseStateError(pub String);

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl core::fmt::Display for AccountState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "DISABLED" => Ok(Self::Disabled),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

/// Persisted account-state record, one per principal.
///
/// `groups` is a best-effort mirror of identity-provider membership kept for
/// lifecycle observability; authorization never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// `USER#<user_id>` — see `portcullis_core::keys`.
    pub key: String,
    pub state: AccountState,
    pub groups: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    pub last_reason: Option<String>,
}

impl AccountRecord {
    /// Fresh record in the default state.
    pub fn new(key: impl Into<String>, actor: impl Into<String>, reason: Option<String>) -> Self {
        let now = Utc::now();
        let actor = actor.into();
        Self {
            key: key.into(),
            state: AccountState::Active,
            groups: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: actor.clone(),
            updated_by: actor,
            last_reason: reason,
        }
    }
}

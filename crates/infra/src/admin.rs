//! Admin user-lifecycle operations.
//!
//! Every operation here runs behind the API layer's admin gate (top admin
//! group + ACTIVE state). The service keeps the identity provider and the
//! account-state store consistent: validation precedes any side effect, and
//! provider-side calls precede the authoritative local write so the two
//! systems never diverge.

use std::sync::Arc;

use portcullis_auth::{
    AccountRecord, AccountState, Principal, TOP_ADMIN_GROUP, is_allowed_group,
};
use portcullis_core::{AuthError, AuthResult, keys};

use crate::idp::{IdentityProvider, IdpUser};
use crate::store::{AccountStateStore, GrantItem, GrantStore};

/// Upper bound on the user sample inspected by the last-administrator
/// safeguard. The check is a bounded heuristic, not an exhaustive scan:
/// with more than this many users it can refuse a deletion that would
/// actually be safe, never the reverse.
pub const LAST_ADMIN_SCAN_LIMIT: usize = 60;

/// Input for user creation. There is deliberately no state field: accounts
/// always start ACTIVE, whatever the caller might wish.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub display_name: Option<String>,
    pub groups: Vec<String>,
}

/// Group update semantics: replace the whole set, or apply a delta.
#[derive(Debug, Clone)]
pub enum GroupChange {
    Set(Vec<String>),
    Delta {
        add: Vec<String>,
        remove: Vec<String>,
    },
}

/// A user as the admin surface reports it: identity-provider fields plus
/// the lifecycle state. `groups` comes from the provider on single-user
/// operations and from the mirrored account row on listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub login_enabled: bool,
    pub groups: Vec<String>,
    pub state: Option<AccountState>,
}

/// Outcome of a create: duplicates are a recognized outcome carrying the
/// existing user, not a bare error, so the API can return the current
/// representation with the conflict.
#[derive(Debug, Clone)]
pub enum CreateUserOutcome {
    Created(UserSummary),
    AlreadyExists(UserSummary),
}

/// Orchestrates user-lifecycle mutations across the identity provider and
/// the local stores.
#[derive(Clone)]
pub struct AdminService {
    idp: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountStateStore>,
    grants: Arc<dyn GrantStore>,
}

impl AdminService {
    pub fn new(
        idp: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountStateStore>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        Self {
            idp,
            accounts,
            grants,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    /// Create a user in the identity provider plus its ACTIVE account row.
    ///
    /// Idempotency is a pre-check on the email, not a compare-and-swap:
    /// provider-side user creation is not natively conditional on email.
    pub async fn create_user(
        &self,
        actor: &Principal,
        input: CreateUserInput,
    ) -> AuthResult<CreateUserOutcome> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::bad_request("invalid email address"));
        }
        validate_group_names(&input.groups)?;

        if let Some(existing) = self.idp.find_by_email(&email).await? {
            let summary = self.summarize(existing).await?;
            return Ok(CreateUserOutcome::AlreadyExists(summary));
        }

        let user = self
            .idp
            .create_user(&email, input.display_name.as_deref())
            .await?;

        for group in &input.groups {
            self.idp.add_to_group(&user.user_id, group).await?;
        }

        let mut record = AccountRecord::new(
            keys::account_state_key(&user.user_id),
            actor_label(actor),
            Some("admin create".to_string()),
        );
        record.groups = input.groups.clone();
        // A concurrent self-heal may have won; either way the row is ACTIVE.
        self.accounts.create_if_absent(record).await?;

        Ok(CreateUserOutcome::Created(UserSummary {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            login_enabled: user.login_enabled,
            groups: input.groups,
            state: Some(AccountState::Active),
        }))
    }

    /// One page of users. Listing doubles as a repair pass: any user without
    /// an account-state row gets one (ACTIVE) on the way through.
    pub async fn list_users(
        &self,
        limit: usize,
        page_token: Option<&str>,
    ) -> AuthResult<(Vec<UserSummary>, Option<String>)> {
        let page = self.idp.list_users(limit, page_token).await?;

        let mut summaries = Vec::with_capacity(page.users.len());
        for user in page.users {
            let record = self
                .accounts
                .create_if_absent(AccountRecord::new(
                    keys::account_state_key(&user.user_id),
                    crate::resolver::SELF_HEAL_ACTOR,
                    None,
                ))
                .await?
                .into_record();

            summaries.push(UserSummary {
                user_id: user.user_id,
                email: user.email,
                display_name: user.display_name,
                login_enabled: user.login_enabled,
                groups: record.groups,
                state: Some(record.state),
            });
        }

        Ok((summaries, page.next_token))
    }

    /// Replace or adjust a user's groups, then mirror the result into the
    /// account row (best-effort).
    pub async fn update_groups(
        &self,
        actor: &Principal,
        email: &str,
        change: GroupChange,
    ) -> AuthResult<UserSummary> {
        let user = self.require_user_by_email(email).await?;
        let current = self.idp.groups_for_user(&user.user_id).await?;

        let target = match &change {
            GroupChange::Set(groups) => {
                validate_group_names(groups)?;
                groups.clone()
            }
            GroupChange::Delta { add, remove } => {
                validate_group_names(add)?;
                validate_group_names(remove)?;
                let mut target = current.clone();
                for g in add {
                    if !target.contains(g) {
                        target.push(g.clone());
                    }
                }
                target.retain(|g| !remove.contains(g));
                target
            }
        };

        // Self-lockout prevention: an admin may not strip their own
        // platform-admin membership.
        let is_self = user.user_id == actor.user_id;
        let losing_admin = current.iter().any(|g| g == TOP_ADMIN_GROUP)
            && !target.iter().any(|g| g == TOP_ADMIN_GROUP);
        if is_self && losing_admin {
            return Err(AuthError::bad_request(format!(
                "cannot remove {TOP_ADMIN_GROUP} from your own account"
            )));
        }

        for group in target.iter().filter(|g| !current.contains(g)) {
            self.idp.add_to_group(&user.user_id, group).await?;
        }
        for group in current.iter().filter(|g| !target.contains(g)) {
            self.idp.remove_from_group(&user.user_id, group).await?;
        }

        self.best_effort_mirror(&user.user_id, &target).await;

        let state = self
            .accounts
            .get(&keys::account_state_key(&user.user_id))
            .await?
            .map(|r| r.state);

        Ok(UserSummary {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            login_enabled: user.login_enabled,
            groups: target,
            state,
        })
    }

    /// Transition a user's lifecycle state.
    ///
    /// DISABLED and ACTIVE propagate to the identity provider **before** the
    /// authoritative local write; if the provider call fails the stored state
    /// stays at its prior value. SUSPENDED is an app-level gate only.
    pub async fn update_state(
        &self,
        actor: &Principal,
        email: &str,
        new_state: AccountState,
        reason: Option<&str>,
    ) -> AuthResult<UserSummary> {
        let user = self.require_user_by_email(email).await?;
        let state_key = keys::account_state_key(&user.user_id);

        // First admin touch of a pre-existing user: make sure the row exists
        // before the unconditional update.
        self.accounts
            .create_if_absent(AccountRecord::new(
                &state_key,
                crate::resolver::SELF_HEAL_ACTOR,
                None,
            ))
            .await?;

        match new_state {
            AccountState::Disabled => {
                self.idp.set_login_enabled(&user.user_id, false).await?;
            }
            AccountState::Active => {
                self.idp.set_login_enabled(&user.user_id, true).await?;
            }
            AccountState::Suspended => {}
        }

        let record = self
            .accounts
            .update_state(&state_key, new_state, &actor_label(actor), reason)
            .await?;

        let login_enabled = match new_state {
            AccountState::Disabled => false,
            AccountState::Active => true,
            AccountState::Suspended => user.login_enabled,
        };

        Ok(UserSummary {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            login_enabled,
            groups: record.groups,
            state: Some(record.state),
        })
    }

    /// Delete a user from the identity provider, then clean up the account
    /// row (best-effort).
    ///
    /// Refuses self-deletion outright. When the target is an administrator,
    /// a bounded sample of users (`LAST_ADMIN_SCAN_LIMIT`) is scanned for
    /// another administrator first — a documented heuristic, not a
    /// guarantee, kept cheap on purpose.
    pub async fn delete_user(&self, actor: &Principal, email: &str) -> AuthResult<()> {
        let user = self.require_user_by_email(email).await?;

        if user.user_id == actor.user_id {
            return Err(AuthError::bad_request("cannot delete your own account"));
        }

        let target_groups = self.idp.groups_for_user(&user.user_id).await?;
        if target_groups.iter().any(|g| g == TOP_ADMIN_GROUP)
            && !self.another_admin_exists(&user.user_id).await?
        {
            return Err(AuthError::bad_request(format!(
                "refusing to delete the only known {TOP_ADMIN_GROUP} \
                 (checked a sample of {LAST_ADMIN_SCAN_LIMIT} users)"
            )));
        }

        self.idp.delete_user(&user.user_id).await?;

        let state_key = keys::account_state_key(&user.user_id);
        if let Err(err) = self.accounts.delete(&state_key).await {
            tracing::warn!(key = %state_key, error = %err, "account-state cleanup failed; leaving orphan row");
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────

    /// Provision a `(resource, permission)` grant for a principal.
    pub async fn provision_grant(
        &self,
        user_id: &str,
        resource: &str,
        permission: &str,
    ) -> AuthResult<()> {
        validate_grant_parts(resource, permission)?;
        if self.idp.get_user(user_id).await?.is_none() {
            return Err(AuthError::not_found(format!("user {user_id}")));
        }

        self.grants
            .put(GrantItem {
                partition_key: keys::grant_partition_key(user_id),
                sort_key: keys::grant_sort_key(resource, permission),
            })
            .await?;
        Ok(())
    }

    /// Remove a grant. Idempotent: revoking an absent grant is a no-op.
    pub async fn revoke_grant(
        &self,
        user_id: &str,
        resource: &str,
        permission: &str,
    ) -> AuthResult<()> {
        validate_grant_parts(resource, permission)?;
        self.grants
            .delete(
                &keys::grant_partition_key(user_id),
                &keys::grant_sort_key(resource, permission),
            )
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    async fn require_user_by_email(&self, email: &str) -> AuthResult<IdpUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::bad_request("email is required"));
        }
        self.idp
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("user {email}")))
    }

    /// Scan a bounded sample of users for an administrator other than
    /// `excluding`.
    async fn another_admin_exists(&self, excluding: &str) -> AuthResult<bool> {
        let page = self.idp.list_users(LAST_ADMIN_SCAN_LIMIT, None).await?;
        for candidate in page.users.iter().filter(|u| u.user_id != excluding) {
            let groups = self.idp.groups_for_user(&candidate.user_id).await?;
            if groups.iter().any(|g| g == TOP_ADMIN_GROUP) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fire-and-log group mirror: lifecycle observability only, never worth
    /// failing the admin operation over.
    async fn best_effort_mirror(&self, user_id: &str, groups: &[String]) {
        let key = keys::account_state_key(user_id);
        if let Err(err) = self.accounts.mirror_groups(&key, groups).await {
            tracing::warn!(key = %key, error = %err, "group mirror failed; continuing");
        }
    }

    async fn summarize(&self, user: IdpUser) -> AuthResult<UserSummary> {
        let groups = self.idp.groups_for_user(&user.user_id).await?;
        let state = self
            .accounts
            .get(&keys::account_state_key(&user.user_id))
            .await?
            .map(|r| r.state);

        Ok(UserSummary {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            login_enabled: user.login_enabled,
            groups,
            state,
        })
    }
}

/// Audit label for the acting principal: prefer the email, fall back to the
/// subject id.
fn actor_label(actor: &Principal) -> String {
    actor
        .email
        .clone()
        .unwrap_or_else(|| actor.user_id.clone())
}

fn validate_group_names(groups: &[String]) -> AuthResult<()> {
    for group in groups {
        if !is_allowed_group(group) {
            return Err(AuthError::bad_request(format!("unknown group: {group}")));
        }
    }
    Ok(())
}

fn validate_grant_parts(resource: &str, permission: &str) -> AuthResult<()> {
    if resource.trim().is_empty() || permission.trim().is_empty() {
        return Err(AuthError::bad_request(
            "resource and permission are required",
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

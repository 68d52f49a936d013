//! Identity-provider admin contract.
//!
//! The identity provider owns credentials, token issuance, and the login
//! capability itself; this plane consumes its admin API as a trusted
//! collaborator. The in-memory implementation backs tests and dev.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use portcullis_core::AuthError;

/// A user as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpUser {
    /// Immutable subject id — the canonical principal key.
    pub user_id: String,
    /// Lower-cased unique email.
    pub email: String,
    pub display_name: Option<String>,
    /// Whether the provider will accept a login for this user.
    pub login_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// One page of a user listing.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<IdpUser>,
    /// Opaque cursor; `None` means the listing is exhausted.
    pub next_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("identity provider: user not found: {0}")]
    UserNotFound(String),

    #[error("identity provider: user already exists: {0}")]
    AlreadyExists(String),

    #[error("identity provider: unknown group: {0}")]
    UnknownGroup(String),

    #[error("identity provider error: {0}")]
    Provider(String),
}

impl From<IdpError> for AuthError {
    fn from(err: IdpError) -> Self {
        match err {
            IdpError::UserNotFound(who) => AuthError::not_found(who),
            IdpError::AlreadyExists(who) => AuthError::conflict(who),
            IdpError::UnknownGroup(name) => AuthError::bad_request(format!("unknown group: {name}")),
            IdpError::Provider(msg) => AuthError::internal(msg),
        }
    }
}

/// Admin surface of the identity provider consumed by this plane.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a user with login enabled. Fails `AlreadyExists` on a
    /// duplicate email.
    async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<IdpUser, IdpError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), IdpError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<IdpUser>, IdpError>;

    /// Server-side exact-email lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<IdpUser>, IdpError>;

    /// Paginated listing in provider order.
    async fn list_users(
        &self,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<UserPage, IdpError>;

    async fn groups_for_user(&self, user_id: &str) -> Result<Vec<String>, IdpError>;

    async fn add_to_group(&self, user_id: &str, group: &str) -> Result<(), IdpError>;

    async fn remove_from_group(&self, user_id: &str, group: &str) -> Result<(), IdpError>;

    /// Enable/disable the provider-side login capability.
    async fn set_login_enabled(&self, user_id: &str, enabled: bool) -> Result<(), IdpError>;
}

#[async_trait]
impl<P> IdentityProvider for Arc<P>
where
    P: IdentityProvider + ?Sized,
{
    async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<IdpUser, IdpError> {
        (**self).create_user(email, display_name).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), IdpError> {
        (**self).delete_user(user_id).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<IdpUser>, IdpError> {
        (**self).get_user(user_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdpUser>, IdpError> {
        (**self).find_by_email(email).await
    }

    async fn list_users(
        &self,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<UserPage, IdpError> {
        (**self).list_users(limit, page_token).await
    }

    async fn groups_for_user(&self, user_id: &str) -> Result<Vec<String>, IdpError> {
        (**self).groups_for_user(user_id).await
    }

    async fn add_to_group(&self, user_id: &str, group: &str) -> Result<(), IdpError> {
        (**self).add_to_group(user_id, group).await
    }

    async fn remove_from_group(&self, user_id: &str, group: &str) -> Result<(), IdpError> {
        (**self).remove_from_group(user_id, group).await
    }

    async fn set_login_enabled(&self, user_id: &str, enabled: bool) -> Result<(), IdpError> {
        (**self).set_login_enabled(user_id, enabled).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredUser {
    user: IdpUser,
    groups: Vec<String>,
}

/// In-memory identity provider for tests/dev.
///
/// Listing order is by subject id; the page token is the last id of the
/// previous page.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    inner: RwLock<HashMap<String, StoredUser>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err(_: impl std::fmt::Debug) -> IdpError {
        IdpError::Provider("identity provider lock poisoned".to_string())
    }

    /// Fixture helper: create a user already holding `groups`.
    pub fn seed_user(&self, email: &str, groups: &[&str]) -> IdpUser {
        let user = IdpUser {
            user_id: Uuid::now_v7().to_string(),
            email: email.trim().to_lowercase(),
            display_name: None,
            login_enabled: true,
            created_at: Utc::now(),
        };
        let mut map = self.inner.write().expect("lock poisoned");
        map.insert(
            user.user_id.clone(),
            StoredUser {
                user: user.clone(),
                groups: groups.iter().map(|g| g.to_string()).collect(),
            },
        );
        user
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<IdpUser, IdpError> {
        let email = email.trim().to_lowercase();
        let mut map = self.inner.write().map_err(Self::lock_err)?;

        if map.values().any(|u| u.user.email == email) {
            return Err(IdpError::AlreadyExists(email));
        }

        let user = IdpUser {
            user_id: Uuid::now_v7().to_string(),
            email,
            display_name: display_name.map(str::to_string),
            login_enabled: true,
            created_at: Utc::now(),
        };
        map.insert(
            user.user_id.clone(),
            StoredUser {
                user: user.clone(),
                groups: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), IdpError> {
        let mut map = self.inner.write().map_err(Self::lock_err)?;
        map.remove(user_id)
            .map(|_| ())
            .ok_or_else(|| IdpError::UserNotFound(user_id.to_string()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<IdpUser>, IdpError> {
        let map = self.inner.read().map_err(Self::lock_err)?;
        Ok(map.get(user_id).map(|u| u.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdpUser>, IdpError> {
        let email = email.trim().to_lowercase();
        let map = self.inner.read().map_err(Self::lock_err)?;
        Ok(map
            .values()
            .find(|u| u.user.email == email)
            .map(|u| u.user.clone()))
    }

    async fn list_users(
        &self,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<UserPage, IdpError> {
        let map = self.inner.read().map_err(Self::lock_err)?;

        let mut ids: Vec<&String> = map.keys().collect();
        ids.sort();

        let start = match page_token {
            Some(token) => ids.partition_point(|id| id.as_str() <= token),
            None => 0,
        };

        let page: Vec<IdpUser> = ids[start..]
            .iter()
            .take(limit)
            .map(|id| map[*id].user.clone())
            .collect();

        let next_token = if start + page.len() < ids.len() {
            page.last().map(|u| u.user_id.clone())
        } else {
            None
        };

        Ok(UserPage {
            users: page,
            next_token,
        })
    }

    async fn groups_for_user(&self, user_id: &str) -> Result<Vec<String>, IdpError> {
        let map = self.inner.read().map_err(Self::lock_err)?;
        map.get(user_id)
            .map(|u| u.groups.clone())
            .ok_or_else(|| IdpError::UserNotFound(user_id.to_string()))
    }

    async fn add_to_group(&self, user_id: &str, group: &str) -> Result<(), IdpError> {
        let mut map = self.inner.write().map_err(Self::lock_err)?;
        let user = map
            .get_mut(user_id)
            .ok_or_else(|| IdpError::UserNotFound(user_id.to_string()))?;
        if !user.groups.iter().any(|g| g == group) {
            user.groups.push(group.to_string());
        }
        Ok(())
    }

    async fn remove_from_group(&self, user_id: &str, group: &str) -> Result<(), IdpError> {
        let mut map = self.inner.write().map_err(Self::lock_err)?;
        let user = map
            .get_mut(user_id)
            .ok_or_else(|| IdpError::UserNotFound(user_id.to_string()))?;
        user.groups.retain(|g| g != group);
        Ok(())
    }

    async fn set_login_enabled(&self, user_id: &str, enabled: bool) -> Result<(), IdpError> {
        let mut map = self.inner.write().map_err(Self::lock_err)?;
        let user = map
            .get_mut(user_id)
            .ok_or_else(|| IdpError::UserNotFound(user_id.to_string()))?;
        user.user.login_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let idp = InMemoryIdentityProvider::new();
        idp.create_user("a@b.com", None).await.unwrap();

        let err = idp.create_user(" A@B.COM ", None).await.unwrap_err();
        assert!(matches!(err, IdpError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let idp = InMemoryIdentityProvider::new();
        let created = idp.create_user("Mixed@Case.com", None).await.unwrap();

        let found = idp.find_by_email("mixed@case.com").await.unwrap().unwrap();
        assert_eq!(found.user_id, created.user_id);
    }

    #[tokio::test]
    async fn group_membership_round_trip() {
        let idp = InMemoryIdentityProvider::new();
        let user = idp.create_user("a@b.com", None).await.unwrap();

        idp.add_to_group(&user.user_id, "viewer").await.unwrap();
        idp.add_to_group(&user.user_id, "viewer").await.unwrap();
        assert_eq!(idp.groups_for_user(&user.user_id).await.unwrap(), ["viewer"]);

        idp.remove_from_group(&user.user_id, "viewer").await.unwrap();
        assert!(idp.groups_for_user(&user.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_pages_through_all_users() {
        let idp = InMemoryIdentityProvider::new();
        for i in 0..5 {
            idp.create_user(&format!("u{i}@x.com"), None).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = idp.list_users(2, token.as_deref()).await.unwrap();
            seen.extend(page.users.into_iter().map(|u| u.email));
            match page.next_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        seen.sort();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0], "u0@x.com");
    }
}

//! Infrastructure layer: collaborator contracts and their backends.
//!
//! Everything the authorization core talks to lives behind a trait here —
//! the three key-value stores, the identity provider, and the resolvers and
//! admin service that orchestrate them. Each trait ships an in-memory
//! implementation for tests/dev; the stores additionally have Postgres
//! backends for production.

pub mod admin;
pub mod idp;
pub mod resolver;
pub mod store;

pub use admin::{
    AdminService, CreateUserInput, CreateUserOutcome, GroupChange, UserSummary,
    LAST_ADMIN_SCAN_LIMIT,
};
pub use idp::{IdentityProvider, IdpError, IdpUser, InMemoryIdentityProvider, UserPage};
pub use resolver::{
    AuthContextResolver, SELF_HEAL_ACTOR, has_grant, list_grants, require_store_owner,
    resolve_capabilities,
};
pub use store::{
    AccountStateStore, CapabilityStore, CreateOutcome, GrantItem, GrantStore,
    InMemoryAccountStateStore, InMemoryCapabilityStore, InMemoryGrantStore,
    PostgresAccountStateStore, PostgresCapabilityStore, PostgresGrantStore, StoreError,
};

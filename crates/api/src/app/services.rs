//! Service wiring: stores, identity provider, resolver, admin service.
//!
//! All handles are constructed once and shared via `Arc` — components take
//! their collaborators by injection, never from globals.

use std::sync::Arc;

use sqlx::PgPool;

use portcullis_infra::{
    AdminService, AuthContextResolver, IdentityProvider, InMemoryAccountStateStore,
    InMemoryCapabilityStore, InMemoryGrantStore, InMemoryIdentityProvider,
    PostgresAccountStateStore, PostgresCapabilityStore, PostgresGrantStore,
};

/// Shared application services, injected into handlers as an extension.
#[derive(Clone)]
pub struct AppServices {
    pub resolver: AuthContextResolver,
    pub admin: AdminService,
}

/// Handles to the in-memory backends, for seeding in dev and tests.
#[derive(Clone)]
pub struct InMemoryBackends {
    pub idp: Arc<InMemoryIdentityProvider>,
    pub accounts: Arc<InMemoryAccountStateStore>,
    pub capabilities: Arc<InMemoryCapabilityStore>,
    pub grants: Arc<InMemoryGrantStore>,
}

/// Everything in memory: dev server and black-box tests.
pub fn build_in_memory() -> (AppServices, InMemoryBackends) {
    let backends = InMemoryBackends {
        idp: Arc::new(InMemoryIdentityProvider::new()),
        accounts: Arc::new(InMemoryAccountStateStore::new()),
        capabilities: Arc::new(InMemoryCapabilityStore::new()),
        grants: Arc::new(InMemoryGrantStore::new()),
    };

    let services = AppServices {
        resolver: AuthContextResolver::new(
            backends.accounts.clone(),
            backends.capabilities.clone(),
            backends.grants.clone(),
        ),
        admin: AdminService::new(
            backends.idp.clone(),
            backends.accounts.clone(),
            backends.grants.clone(),
        ),
    };

    (services, backends)
}

/// Postgres-backed stores; the identity provider is still whatever the
/// deployment supplies (a real provider adapter, or the in-memory one for
/// staging).
pub fn build_postgres(pool: PgPool, idp: Arc<dyn IdentityProvider>) -> AppServices {
    let accounts = Arc::new(PostgresAccountStateStore::new(pool.clone()));
    let capabilities = Arc::new(PostgresCapabilityStore::new(pool.clone()));
    let grants = Arc::new(PostgresGrantStore::new(pool));

    AppServices {
        resolver: AuthContextResolver::new(
            accounts.clone(),
            capabilities.clone(),
            grants.clone(),
        ),
        admin: AdminService::new(idp, accounts, grants),
    }
}

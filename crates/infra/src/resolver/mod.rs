//! Authorization resolution: capabilities, grants, and the per-request
//! `AuthContext`.

mod capability;
mod context;
mod grant;

pub use capability::resolve_capabilities;
pub use context::{AuthContextResolver, SELF_HEAL_ACTOR};
pub use grant::{has_grant, list_grants, require_store_owner};

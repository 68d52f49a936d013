//! The fixed group vocabulary of the platform.
//!
//! Group names come from the identity provider; admin operations validate
//! against this set so a typo cannot mint a novel group.

/// The single group whose members bypass fine-grained grant checks and may
/// use the admin surface.
pub const TOP_ADMIN_GROUP: &str = "platform-admin";

/// Groups an admin may assign. `TOP_ADMIN_GROUP` is deliberately included:
/// promoting another admin is an ordinary, auditable group update.
pub const ALLOWED_GROUPS: &[&str] = &[
    TOP_ADMIN_GROUP,
    "tenant-admin",
    "support",
    "billing",
    "viewer",
];

pub fn is_allowed_group(name: &str) -> bool {
    ALLOWED_GROUPS.contains(&name)
}

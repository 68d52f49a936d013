use portcullis_auth::Principal;

/// Request extension carrying the extracted principal, if any.
///
/// The middleware inserts this on every request behind it; `None` means the
/// request carried no credential at all. Whether that is acceptable is the
/// route's decision (optional vs. required resolution), not the middleware's.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

//! `portcullis-core` — shared foundation for the authorization control plane.
//!
//! This crate contains the error taxonomy and the composite store-key
//! conventions. No I/O, no framework concerns.

pub mod error;
pub mod keys;

pub use error::{AuthError, AuthResult};

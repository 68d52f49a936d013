//! Bearer-token verification seam.
//!
//! The verifier is a trusted collaborator: signature, expiry, issuer, and
//! audience are all its problem. This crate only consumes the claims it
//! yields, and callers collapse every [`InvalidToken`] into
//! `Unauthenticated` — the specific upstream reason is never user-visible.

use std::sync::Arc;

use thiserror::Error;

/// Opaque verification failure. Carries the upstream reason for logs only.
#[derive(Debug, Error, Clone)]
#[error("token verification failed: {0}")]
pub struct InvalidToken(pub String);

/// Validates an opaque bearer token and returns its claims.
pub trait TokenVerifier: Send + Sync {
    fn verify(
        &self,
        token: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, InvalidToken>;
}

impl<V> TokenVerifier for Arc<V>
where
    V: TokenVerifier + ?Sized,
{
    fn verify(
        &self,
        token: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, InvalidToken> {
        (**self).verify(token)
    }
}

/// HS256 verifier over a shared secret.
///
/// Suitable for dev and single-issuer deployments; other algorithms slot in
/// behind the same trait.
pub struct Hs256TokenVerifier {
    key: jsonwebtoken::DecodingKey,
    validation: jsonwebtoken::Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: jsonwebtoken::DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Require an `aud` claim matching `audience`.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self
    }

    /// Require an `iss` claim matching `issuer`.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(
        &self,
        token: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, InvalidToken> {
        let data = jsonwebtoken::decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &self.key,
            &self.validation,
        )
        .map_err(|e| InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

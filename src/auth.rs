//! Bearer credential verification.
//!
//! The auth service issues HS256 tokens; older clients still hold tokens
//! from before the claim layout changed. [`TokenVerifier`] therefore
//! tries the current layout first (`sub` claim, `exp` enforced) and
//! falls back to the legacy one (`user_id` claim, no `exp`). Absence or
//! failure never rejects a connection, it only leaves it
//! unauthenticated.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::domain::Identity;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

#[derive(Debug, Deserialize)]
struct LegacyClaims {
    user_id: Identity,
}

/// Outcome of a successful token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Identity encoded in the token.
    pub identity: Identity,
    /// Whether the identity is a guest.
    pub is_guest: bool,
}

/// Decodes and validates bearer tokens against the shared HS256 secret.
pub struct TokenVerifier {
    key: DecodingKey,
    strict: Validation,
    legacy: Validation,
}

// `DecodingKey` holds secret material and implements neither `Debug`
// nor redaction, so the key is left out of the output.
impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("strict", &self.strict)
            .field("legacy", &self.legacy)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for the given shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let strict = Validation::new(Algorithm::HS256);
        let mut legacy = Validation::new(Algorithm::HS256);
        legacy.validate_exp = false;
        legacy.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            strict,
            legacy,
        }
    }

    /// Verifies a token, trying the current claim layout first and the
    /// legacy one second. Returns `None` for anything undecodable.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<VerifiedIdentity> {
        let identity = match decode::<Claims>(token, &self.key, &self.strict) {
            Ok(data) => Identity::from_wire(&data.claims.sub),
            Err(primary_err) => match decode::<LegacyClaims>(token, &self.key, &self.legacy) {
                Ok(data) => data.claims.user_id,
                Err(fallback_err) => {
                    tracing::debug!(%primary_err, %fallback_err, "token failed both decode paths");
                    return None;
                }
            },
        };
        let is_guest = identity.is_guest();
        Some(VerifiedIdentity { identity, is_guest })
    }
}

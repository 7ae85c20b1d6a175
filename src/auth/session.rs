//! Session tokens: Ed25519-signed JWTs, 24 hour lifetime.

use std::collections::HashSet;

use ed25519_dalek::SigningKey;
use jwt_simple::prelude::*;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const ISSUER: &str = "talkline";
const SESSION_TTL_HOURS: u64 = 24;

/// Custom claims carried in a session token. The user id lives in the
/// standard `sub` claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
}

/// A validated session: subject plus custom claims.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

/// Ed25519 signing key for session tokens.
///
/// Holds the 32-byte seed; the key pair is rebuilt per operation, which is
/// cheap and keeps the struct trivially `Clone`.
#[derive(Clone)]
pub struct SessionKey {
    seed: [u8; 32],
}

impl SessionKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// Generate a random key (dev mode and tests).
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            seed: signing_key.to_bytes(),
        }
    }

    fn key_pair(&self) -> Result<Ed25519KeyPair> {
        let signing_key = SigningKey::from_bytes(&self.seed);
        Ed25519KeyPair::from_bytes(&signing_key.to_keypair_bytes())
            .map_err(|e| AppError::Internal(format!("Failed to create key pair: {}", e)))
    }

    /// Sign a session token for a user.
    pub fn sign_session(&self, user_id: &str, email: &str) -> Result<String> {
        let claims = SessionClaims {
            email: email.to_string(),
        };
        let jwt_claims = Claims::with_custom_claims(claims, Duration::from_hours(SESSION_TTL_HOURS))
            .with_issuer(ISSUER)
            .with_subject(user_id);

        self.key_pair()?
            .sign(jwt_claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a session token and return the session it encodes. Any
    /// verification failure (signature, expiry, issuer) maps to 401.
    pub fn verify_session(&self, token: &str) -> Result<Session> {
        let mut allowed_issuers = HashSet::new();
        allowed_issuers.insert(ISSUER.to_string());
        let options = VerificationOptions {
            allowed_issuers: Some(allowed_issuers),
            ..Default::default()
        };

        let verified = self
            .key_pair()?
            .public_key()
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|_| AppError::Unauthorized)?;

        let user_id = verified.subject.ok_or(AppError::Unauthorized)?;

        Ok(Session {
            user_id,
            email: verified.custom.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = SessionKey::generate();
        let token = key.sign_session("user-1", "alice@example.com").unwrap();

        let session = key.verify_session(&token).unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.email, "alice@example.com");
    }

    #[test]
    fn rejects_token_from_another_key() {
        let key = SessionKey::generate();
        let other = SessionKey::generate();
        let token = key.sign_session("user-1", "alice@example.com").unwrap();

        assert!(matches!(
            other.verify_session(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_garbage() {
        let key = SessionKey::generate();
        assert!(key.verify_session("not-a-token").is_err());
    }
}

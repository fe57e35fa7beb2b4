//! Identity verification seam.
//!
//! The platform's identity provider is external; this server only consumes
//! signed credentials. The `IdentityVerifier` trait keeps the provider
//! swappable — the default implementation validates HS256 JWTs whose claims
//! carry the provider uid and display name. A client-supplied identity string
//! is never trusted directly.

use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result of a successful credential verification.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Stable uid issued by the identity provider.
    pub identity: String,
    /// Display label cached from the credential.
    pub display_name: String,
}

/// Why a credential was rejected. Expired is split out so the WS handler can
/// pick the right close code.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("credential expired")]
    Expired,
    #[error("credential invalid")]
    Invalid,
}

/// Credential verification contract. `verify` may involve a provider
/// round-trip, so implementations must be callable from async context.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<VerifiedIdentity, VerifyError>;
}

/// Claims carried in the HS256 credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Provider uid
    pub sub: String,
    /// Display name
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Default verifier: HS256 JWT against a locally stored secret.
pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Issue a credential for a given identity (1-hour expiry).
    /// Used by tests and tooling; production credentials come from the provider.
    pub fn issue_token(
        &self,
        identity: &str,
        display_name: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.to_string(),
            name: display_name.to_string(),
            iat: now,
            exp: now + 3600,
        };

        encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<VerifiedIdentity, VerifyError> {
        let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        let token_data = decode::<Claims>(
            credential,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
            _ => VerifyError::Invalid,
        })?;

        Ok(VerifiedIdentity {
            identity: token_data.claims.sub,
            display_name: token_data.claims.name,
        })
    }
}

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        // Invalid key file — regenerate
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_roundtrip() {
        let verifier = JwtVerifier::new(vec![7u8; 32]);
        let token = verifier.issue_token("uid-123", "Lautaro").unwrap();
        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified.identity, "uid-123");
        assert_eq!(verified.display_name, "Lautaro");
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let issuer = JwtVerifier::new(vec![1u8; 32]);
        let verifier = JwtVerifier::new(vec![2u8; 32]);
        let token = issuer.issue_token("uid-123", "Lautaro").unwrap();
        assert!(matches!(verifier.verify(&token), Err(VerifyError::Invalid)));
    }

    #[test]
    fn verify_rejects_expired() {
        let secret = vec![9u8; 32];
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "uid-123".to_string(),
            name: "Lautaro".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&secret),
        )
        .unwrap();

        let verifier = JwtVerifier::new(secret);
        assert!(matches!(verifier.verify(&token), Err(VerifyError::Expired)));
    }
}

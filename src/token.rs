//! Bearer credential verification and issuing.
//!
//! Tokens are HS256 JWTs signed with the shared secret from
//! [`AccessConfig`](crate::config::AccessConfig). The subject claim is the
//! principal id; tokens minted by older clients under the `userId` claim name
//! are still accepted.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;
use crate::error::{AccessError, AccessResult};
use crate::model::PrincipalId;
use crate::secret::Secret;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "userId")]
    pub sub: PrincipalId,
    /// Issued-at, seconds since the epoch
    #[serde(default)]
    pub iat: u64,
    /// Expiry, seconds since the epoch
    pub exp: u64,
}

/// Why a credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Bad signature, bad encoding, wrong algorithm, missing claims
    Invalid,
    /// Signature fine, validity window has passed
    Expired,
}

impl From<CredentialError> for AccessError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid => AccessError::Unauthenticated,
            CredentialError::Expired => AccessError::Expired,
        }
    }
}

/// A credential whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub subject: PrincipalId,
    pub expires_at: u64,
}

/// Checks a bearer credential and extracts its subject.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, CredentialError>;
}

/// HS256 signer/verifier over a shared secret.
pub struct JwtCredentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    leeway: Duration,
}

impl JwtCredentials {
    pub fn new(secret: &Secret<String>, ttl: Duration, leeway: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
            leeway,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl, config.leeway)
    }

    /// Signs a token for `subject` valid for the configured ttl from now.
    pub fn issue(&self, subject: PrincipalId) -> AccessResult<Secret<String>> {
        self.issue_at(subject, jsonwebtoken::get_current_timestamp())
    }

    /// Signs a token as if issued at `issued_at` (seconds since the epoch).
    pub fn issue_at(&self, subject: PrincipalId, issued_at: u64) -> AccessResult<Secret<String>> {
        let claims = Claims {
            sub: subject,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs()),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(Secret::new)
            .map_err(|err| {
                tracing::warn!(error = %err, "failed to sign access token");
                AccessError::UpstreamFailure
            })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl CredentialVerifier for JwtCredentials {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, CredentialError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation())
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Invalid,
            })?;

        Ok(VerifiedCredential {
            subject: data.claims.sub,
            expires_at: data.claims.exp,
        })
    }
}

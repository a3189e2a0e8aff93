// ── Authentication collaborators ──
//
// Password hashing and token issuance sit behind traits so the facade
// depends only on their contracts. The default implementations are
// Argon2id (PHC strings) and HS256 JWTs signed with a configured secret.

use std::time::Duration;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::TokenConfig;
use crate::error::CoreError;
use crate::model::UserId;

// ── Passwords ───────────────────────────────────────────────────────

pub trait PasswordHasher: Send + Sync {
    /// Hash `plaintext` into a self-describing string.
    fn hash(&self, plaintext: &str) -> Result<String, CoreError>;

    /// Whether `plaintext` produces `hash`.
    fn matches(&self, plaintext: &str, hash: &str) -> Result<bool, CoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, CoreError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::Internal(format!("password hashing failed: {e}")))
    }

    fn matches(&self, plaintext: &str, hash: &str) -> Result<bool, CoreError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| CoreError::Internal(format!("stored password hash is malformed: {e}")))?;
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CoreError::Internal(format!(
                "password verification failed: {e}"
            ))),
        }
    }
}

// ── Tokens ──────────────────────────────────────────────────────────

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: UserId) -> Result<AuthToken, CoreError>;

    /// The user a still-valid token was issued to.
    fn verify(&self, token: &str) -> Result<UserId, CoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// HS256 JWT issuer. The secret is supplied at construction.
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtIssuer {
    pub fn new(config: &TokenConfig) -> Result<Self, CoreError> {
        let secret = config.secret.expose_secret();
        if secret.is_empty() {
            return Err(CoreError::Internal(
                "token signing secret is not configured".into(),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: config.ttl,
        })
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, user: UserId) -> Result<AuthToken, CoreError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| CoreError::Internal(format!("token lifetime out of range: {e}")))?;
        let expiry = now + ttl;
        let claims = Claims {
            sub: user.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Internal(format!("token signing failed: {e}")))?;
        Ok(AuthToken { token, expiry })
    }

    fn verify(&self, token: &str) -> Result<UserId, CoreError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| CoreError::InvalidToken)?;
        data.claims
            .sub
            .parse()
            .map_err(|_| CoreError::InvalidToken)
    }
}

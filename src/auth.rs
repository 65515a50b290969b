//! Authentication for Bookseerr.
//!
//! Passwords are stored as argon2id hashes. Sessions are HS256 JWTs
//! carried in the `token` cookie or an `Authorization: Bearer` header.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::model::{NewUser, Role, User};
use crate::store::LibraryStore;

/// Username of the account created on first start.
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Auth errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired session: {0}")]
    InvalidToken(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token signing failed: {0}")]
    Token(String),
}

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct Auth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl Auth {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl_secs: config.token_ttl.as_secs() as i64,
        }
    }

    /// Token lifetime, also used as the cookie `Max-Age`.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_secs,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Decode a token. Fails if it is malformed, tampered with or expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Resolve a token to its current user. The role comes from the
    /// store, not from the token.
    pub fn authenticate_token(&self, store: &LibraryStore, token: &str) -> crate::Result<User> {
        let claims = self.verify_token(token)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken(format!("bad subject {}", claims.sub)))?;
        store
            .get_user(user_id)?
            .ok_or(crate::Error::Unauthenticated)
    }
}

/// Check a username and password against the store.
pub fn login(store: &LibraryStore, username: &str, password: &str) -> crate::Result<User> {
    let user = store
        .get_user_by_username(username.trim())?
        .ok_or(AuthError::InvalidCredentials)?;

    let matches = user
        .password_hash
        .as_deref()
        .map(|hash| verify_password(password, hash))
        .unwrap_or(false);

    if !matches {
        warn!(username = %user.username, "Failed login");
        return Err(AuthError::InvalidCredentials.into());
    }

    info!(user_id = user.id, username = %user.username, "User logged in");
    Ok(user)
}

/// Create the default admin account if it does not exist yet.
pub fn bootstrap_admin(store: &LibraryStore, password: &str) -> crate::Result<Option<User>> {
    if store.get_user_by_username(BOOTSTRAP_ADMIN)?.is_some() {
        return Ok(None);
    }

    let user = store.create_user(NewUser {
        username: BOOTSTRAP_ADMIN.to_string(),
        email: "admin@bookseerr.local".to_string(),
        password_hash: Some(hash_password(password)?),
        role: Role::Admin,
        ..Default::default()
    })?;

    warn!(
        username = BOOTSTRAP_ADMIN,
        "Created default admin account; change its password"
    );
    Ok(Some(user))
}

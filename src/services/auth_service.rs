//! AuthService owns users, login sessions and bearer access tokens, and turns
//! request credentials into an [`Identity`].
//!
//! Session and token secrets are handed to the client once and stored only
//! as SHA-256 digests.

use crate::{
    models::user::{Credential, Identity, User},
    services::is_unique_violation,
};
use argon2::{
    Argon2, PasswordHash,
    password_hash::{
        PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user `{0}` already exists")]
    UserExists(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone)]
pub struct AuthService {
    db: Arc<SqlitePool>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(db: Arc<SqlitePool>, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// Hashes a session or token secret for storage.
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 256 random bits from the OS, URL-safe.
    fn generate_secret() -> String {
        let mut raw = [0u8; 32];
        OsRng.fill_bytes(&mut raw);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub async fn create_user(&self, email: &str, password: &str) -> AuthResult<User> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(AuthError::UserExists(email.to_string())),
            Err(err) => Err(AuthError::Sqlx(err)),
        }
    }

    pub async fn user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&*self.db)
        .await?)
    }

    /// Verify credentials and open a session.
    ///
    /// Returns the user and the session secret to hand back as a cookie.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<(User, String)> {
        let user = self
            .user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed =
            PasswordHash::new(&user.password_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(AuthError::InvalidCredentials);
        }

        let secret = Self::generate_secret();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Self::hash_secret(&secret))
        .bind(user.id)
        .bind(now + self.session_ttl)
        .bind(now)
        .execute(&*self.db)
        .await?;

        Ok((user, secret))
    }

    /// Close a session. Unknown secrets are ignored.
    pub async fn logout(&self, secret: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(Self::hash_secret(secret))
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Issue an access token for `user_id` carrying `scopes`.
    pub async fn issue_token(&self, user_id: Uuid, scopes: &[&str]) -> AuthResult<String> {
        let secret = Self::generate_secret();
        sqlx::query(
            "INSERT INTO access_tokens (token_hash, user_id, scopes, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Self::hash_secret(&secret))
        .bind(user_id)
        .bind(scopes.join(" "))
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(secret)
    }

    async fn session_user(&self, secret: &str) -> AuthResult<Option<Uuid>> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
                .bind(Self::hash_secret(secret))
                .fetch_optional(&*self.db)
                .await?;
        Ok(row
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user_id, _)| user_id))
    }

    async fn token_user(&self, secret: &str) -> AuthResult<Option<(Uuid, Vec<String>)>> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT user_id, scopes FROM access_tokens WHERE token_hash = ?")
                .bind(Self::hash_secret(secret))
                .fetch_optional(&*self.db)
                .await?;
        Ok(row.map(|(user_id, scopes)| {
            (
                user_id,
                scopes.split_whitespace().map(str::to_string).collect(),
            )
        }))
    }

    /// Resolve the caller from a bearer token or a session secret.
    ///
    /// A valid bearer token wins; anything invalid or missing is anonymous.
    pub async fn resolve_identity(
        &self,
        session: Option<&str>,
        bearer: Option<&str>,
    ) -> AuthResult<Identity> {
        if let Some(token) = bearer {
            if let Some((id, scopes)) = self.token_user(token).await? {
                return Ok(Identity::User {
                    id,
                    credential: Credential::Token { scopes },
                });
            }
        }
        if let Some(secret) = session {
            if let Some(id) = self.session_user(secret).await? {
                return Ok(Identity::User {
                    id,
                    credential: Credential::Session,
                });
            }
        }
        Ok(Identity::Anonymous)
    }
}

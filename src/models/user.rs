//! Users and the identity resolved for a request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Scope an access token needs to change deposits.
pub const SCOPE_DEPOSIT_WRITE: &str = "deposit:write";

/// A registered account.
#[derive(Clone, FromRow, Debug, Serialize)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Argon2id PHC string, never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// How a caller proved who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Interactive login cookie.
    Session,
    /// `Authorization: Bearer` access token and its granted scopes.
    Token { scopes: Vec<String> },
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User { id: Uuid, credential: Credential },
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::User { id, .. } => Some(*id),
        }
    }

    /// Whether the credential allows mutating operations.
    ///
    /// Sessions always may; tokens need the write scope.
    pub fn can_write(&self) -> bool {
        match self {
            Identity::Anonymous => false,
            Identity::User {
                credential: Credential::Session,
                ..
            } => true,
            Identity::User {
                credential: Credential::Token { scopes },
                ..
            } => scopes.iter().any(|s| s == SCOPE_DEPOSIT_WRITE),
        }
    }
}

//! Services behind the HTTP handlers.
//!
//! - `storage_service`: content store for file payloads
//! - `deposit_service`: deposit resolution and persistence
//! - `auth_service`: users, sessions and access tokens

pub mod auth_service;
pub mod deposit_service;
pub mod storage_service;

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

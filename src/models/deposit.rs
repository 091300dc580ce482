//! Represents a draft record that files can be attached to before publication.

use crate::models::file_collection::FileCollection;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepositStatus {
    /// Editable, files can be attached and detached.
    #[default]
    Draft,
    /// Frozen by the publication workflow.
    Published,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Draft => "draft",
            DepositStatus::Published => "published",
        }
    }

    /// Unknown values yield `None`; they are never mistaken for a draft.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DepositStatus::Draft),
            "published" => Some(DepositStatus::Published),
            _ => None,
        }
    }
}

/// Row shape of the `deposits` table.
#[derive(Clone, FromRow, Debug)]
pub struct DepositRow {
    pub id: Uuid,
    pub pid: String,
    pub status: String,
    pub bucket_id: Uuid,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// In-memory deposit aggregate.
///
/// Mutations of `files` are local until the deposit is committed through
/// `DepositService::commit`.
#[derive(Debug, Clone)]
pub struct Deposit {
    /// Internal identifier.
    pub id: Uuid,

    /// External persistent identifier used in URLs.
    pub pid: String,

    pub status: DepositStatus,

    /// Bucket holding the payloads of `files`.
    pub bucket_id: Uuid,

    /// Users allowed to manage this deposit.
    pub owners: Vec<Uuid>,

    pub files: FileCollection,

    /// Row version the aggregate was loaded at; bumped by every commit.
    pub version: i64,

    pub created_at: DateTime<Utc>,
}

impl Deposit {
    pub fn from_row(
        row: DepositRow,
        status: DepositStatus,
        owners: Vec<Uuid>,
        files: FileCollection,
    ) -> Self {
        Self {
            id: row.id,
            pid: row.pid,
            status,
            bucket_id: row.bucket_id,
            owners,
            files,
            version: row.version,
            created_at: row.created_at,
        }
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owners.contains(&user_id)
    }

    pub fn is_draft(&self) -> bool {
        self.status == DepositStatus::Draft
    }
}

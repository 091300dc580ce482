//! Represents the storage container backing a deposit's file collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket owned by exactly one deposit.
///
/// Every stored file instance lives inside a bucket; the bucket's id is also
/// the top-level directory of its payloads on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket.
    pub id: Uuid,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}

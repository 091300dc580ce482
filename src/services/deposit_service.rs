//! DepositService resolves persistent identifiers to deposit aggregates and
//! persists the aggregate's file collection.
//!
//! A request loads a fresh `Deposit`, mutates its `files` in memory and calls
//! [`DepositService::commit`]; the commit rewrites the collection inside a
//! single transaction.

use crate::{
    models::{
        deposit::{Deposit, DepositRow, DepositStatus},
        file_collection::{CollectionError, FileCollection},
        file_entry::{FileEntry, FileInstance},
    },
    services::storage_service::{StorageError, StorageService},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("deposit `{0}` not found")]
    NotFound(String),
    #[error("bucket of deposit `{0}` not found")]
    BucketNotFound(String),
    #[error("deposit `{0}` was modified concurrently, retry the request")]
    Conflict(String),
    #[error("unknown deposit status `{0}`")]
    InvalidStatus(String),
    #[error("corrupt file collection: {0}")]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DepositResult<T> = Result<T, DepositError>;

/// Joined `file_entries` + `file_instances` row.
#[derive(FromRow)]
struct EntryRow {
    key: String,
    id: Uuid,
    bucket_id: Uuid,
    checksum: String,
    size: i64,
    uri: String,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for FileEntry {
    fn from(row: EntryRow) -> Self {
        FileEntry::new(
            row.key,
            FileInstance {
                id: row.id,
                bucket_id: row.bucket_id,
                checksum: row.checksum,
                size: row.size,
                uri: row.uri,
                created_at: row.created_at,
            },
        )
    }
}

#[derive(Clone)]
pub struct DepositService {
    db: Arc<SqlitePool>,
    storage: StorageService,
}

impl DepositService {
    pub fn new(db: Arc<SqlitePool>, storage: StorageService) -> Self {
        Self { db, storage }
    }

    /// Create an empty draft deposit owned by `owner`.
    ///
    /// pids are sequential decimal strings. The bucket, the deposit and its
    /// owner are written in one `BEGIN IMMEDIATE` transaction so concurrent
    /// creators serialize on the pid.
    pub async fn create(&self, owner: Uuid) -> DepositResult<Deposit> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let bucket = self.storage.create_bucket(&mut *tx).await?;
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(CAST(pid AS INTEGER)), 0) + 1 FROM deposits",
        )
        .fetch_one(&mut *tx)
        .await?;
        let pid = next.to_string();

        sqlx::query(
            "INSERT INTO deposits (id, pid, status, bucket_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(&pid)
        .bind(DepositStatus::Draft.as_str())
        .bind(bucket.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO deposit_owners (deposit_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("created deposit {} with bucket {}", pid, bucket.id);
        Ok(Deposit {
            id,
            pid,
            status: DepositStatus::Draft,
            bucket_id: bucket.id,
            owners: vec![owner],
            files: FileCollection::new(),
            version: 0,
            created_at: now,
        })
    }

    /// Load the deposit addressed by `pid` with its owners and files.
    ///
    /// Malformed and unknown pids are both NotFound.
    pub async fn resolve(&self, pid: &str) -> DepositResult<Deposit> {
        if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DepositError::NotFound(pid.to_string()));
        }

        let row = sqlx::query_as::<_, DepositRow>(
            "SELECT id, pid, status, bucket_id, version, created_at
             FROM deposits WHERE pid = ?",
        )
        .bind(pid)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| DepositError::NotFound(pid.to_string()))?;
        let status = DepositStatus::parse(&row.status)
            .ok_or_else(|| DepositError::InvalidStatus(row.status.clone()))?;

        match self.storage.fetch_bucket(row.bucket_id).await {
            Ok(_) => {}
            Err(StorageError::BucketNotFound(_)) => {
                return Err(DepositError::BucketNotFound(pid.to_string()));
            }
            Err(err) => return Err(err.into()),
        }

        let owners: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM deposit_owners WHERE deposit_id = ?")
                .bind(row.id)
                .fetch_all(&*self.db)
                .await?;

        let entries = sqlx::query_as::<_, EntryRow>(
            "SELECT e.key, f.id, f.bucket_id, f.checksum, f.size, f.uri, f.created_at
             FROM file_entries e
             JOIN file_instances f ON f.id = e.file_id
             WHERE e.bucket_id = ?
             ORDER BY e.position ASC",
        )
        .bind(row.bucket_id)
        .fetch_all(&*self.db)
        .await?;

        let files = FileCollection::from_entries(entries.into_iter().map(FileEntry::from).collect())?;
        Ok(Deposit::from_row(row, status, owners, files))
    }

    /// Persist the deposit's file collection as it currently stands.
    ///
    /// Fails with `Conflict` when the deposit was committed by someone else
    /// since it was loaded; nothing is written in that case.
    pub async fn commit(&self, deposit: &mut Deposit) -> DepositResult<()> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let updated = sqlx::query(
            "UPDATE deposits SET status = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(deposit.status.as_str())
        .bind(Utc::now())
        .bind(deposit.id)
        .bind(deposit.version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DepositError::Conflict(deposit.pid.clone()));
        }

        sqlx::query("DELETE FROM file_entries WHERE bucket_id = ?")
            .bind(deposit.bucket_id)
            .execute(&mut *tx)
            .await?;

        for (position, entry) in deposit.files.list().iter().enumerate() {
            sqlx::query(
                "INSERT INTO file_entries (bucket_id, key, file_id, position)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(deposit.bucket_id)
            .bind(&entry.key)
            .bind(entry.file.id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        deposit.version += 1;
        debug!(
            "committed deposit {} at version {} with {} file(s)",
            deposit.pid,
            deposit.version,
            deposit.files.len()
        );
        Ok(())
    }
}

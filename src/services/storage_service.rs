//! src/services/storage_service.rs
//!
//! StorageService is the content store: it streams file payloads to local
//! disk beneath `base_path/{bucket}/{shard}/{shard}/{file_id}`, computes the
//! MD5 checksum and size on the way through, and records each payload as a
//! row in `file_instances`. It knows nothing about keys or ordering; those
//! belong to the deposit's file collection.

use crate::models::{bucket::Bucket, file_entry::FileInstance};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Algorithm prefix used in stored checksums.
pub const CHECKSUM_ALGORITHM: &str = "md5";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(Uuid),
    #[error("file `{0}` not found")]
    FileNotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Content store backed by SQLite for instance metadata and local disk for
/// payloads.
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl StorageService {
    /// Create a new StorageService backed by the provided SQLite pool and
    /// using `base_path` as the root directory for payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    fn bucket_root(&self, bucket_id: Uuid) -> PathBuf {
        self.base_path.join(bucket_id.to_string())
    }

    /// Two-level shard directories for a payload, taken from the first two
    /// bytes of MD5(bucket/file). Keeps directory fan-out bounded.
    fn file_shards(bucket_id: Uuid, file_id: Uuid) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_id, file_id));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Payload location relative to `base_path`.
    fn relative_uri(bucket_id: Uuid, file_id: Uuid) -> String {
        let (shard_a, shard_b) = Self::file_shards(bucket_id, file_id);
        format!("{}/{}/{}/{}", bucket_id, shard_a, shard_b, file_id)
    }

    fn absolute_path(&self, uri: &str) -> PathBuf {
        self.base_path.join(uri)
    }

    /// Create an empty bucket and its directory.
    ///
    /// The row is written through `executor` so callers can make it part of
    /// a larger transaction.
    pub async fn create_bucket<'e, E>(&self, executor: E) -> StorageResult<Bucket>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let bucket = Bucket {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        fs::create_dir_all(self.bucket_root(bucket.id)).await?;

        sqlx::query("INSERT INTO buckets (id, created_at) VALUES (?, ?)")
            .bind(bucket.id)
            .bind(bucket.created_at)
            .execute(executor)
            .await?;

        debug!("created bucket {}", bucket.id);
        Ok(bucket)
    }

    /// Fetch bucket metadata. Returns BucketNotFound if missing.
    pub async fn fetch_bucket(&self, bucket_id: Uuid) -> StorageResult<Bucket> {
        sqlx::query_as::<_, Bucket>("SELECT id, created_at FROM buckets WHERE id = ?")
            .bind(bucket_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StorageError::BucketNotFound(bucket_id))
    }

    /// Stream a payload to disk and record it as a new file instance.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5 and size while streaming.
    /// - Renames into the final location after fsync.
    ///
    /// The temporary file is removed on any error.
    pub async fn store_stream<S, E>(&self, bucket_id: Uuid, stream: S) -> StorageResult<FileInstance>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let bucket = self.fetch_bucket(bucket_id).await?;
        let file_id = Uuid::new_v4();
        let uri = Self::relative_uri(bucket.id, file_id);
        let file_path = self.absolute_path(&uri);

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "file path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", file_id));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(io::Error::new(ErrorKind::Other, err)));
                }
            };
            size += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let instance = FileInstance {
            id: file_id,
            bucket_id: bucket.id,
            checksum: format!("{}:{:x}", CHECKSUM_ALGORITHM, digest.compute()),
            size,
            uri,
            created_at: Utc::now(),
        };

        let insert_result = sqlx::query(
            "INSERT INTO file_instances (id, bucket_id, checksum, size, uri, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(instance.id)
        .bind(instance.bucket_id)
        .bind(&instance.checksum)
        .bind(instance.size)
        .bind(&instance.uri)
        .bind(instance.created_at)
        .execute(&*self.db)
        .await;

        match insert_result {
            Ok(_) => {
                debug!("stored {} bytes at {}", size, file_path.display());
                Ok(instance)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Open a payload for streaming out.
    ///
    /// Returns FileNotFound if the metadata exists but the payload is gone.
    pub async fn open_file(&self, instance: &FileInstance) -> StorageResult<File> {
        File::open(self.absolute_path(&instance.uri))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StorageError::FileNotFound(instance.id)
                } else {
                    StorageError::Io(err)
                }
            })
    }

    /// Delete a file instance row and its payload, then prune empty shard
    /// directories up to the bucket root.
    pub async fn remove_file(&self, instance: &FileInstance) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM file_instances WHERE id = ?")
            .bind(instance.id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::FileNotFound(instance.id));
        }

        let file_path = self.absolute_path(&instance.uri);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(instance.bucket_id);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(())
    }

    /// Recursively remove empty directories up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

//! Represents a file attached to a deposit and the stored content it points at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored content as recorded by the content store.
///
/// The instance is immutable once written: renaming a file only touches the
/// owning [`FileEntry`], never the instance.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct FileInstance {
    /// Identifier assigned by the content store at upload time.
    pub id: Uuid,

    /// Bucket the payload was written into.
    pub bucket_id: Uuid,

    /// Content hash in the form `<algorithm>:<hex digest>`.
    pub checksum: String,

    /// Size in bytes.
    pub size: i64,

    /// Payload location relative to the storage root.
    pub uri: String,

    /// When the payload was written.
    pub created_at: DateTime<Utc>,
}

/// A named member of a deposit's file collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// User-visible filename, unique within the collection.
    pub key: String,

    /// The stored content this entry refers to.
    pub file: FileInstance,
}

impl FileEntry {
    pub fn new(key: impl Into<String>, file: FileInstance) -> Self {
        Self {
            key: key.into(),
            file,
        }
    }
}

/// JSON representation of a file returned by the file endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub filesize: i64,
    pub checksum: String,
}

impl From<&FileEntry> for FileResponse {
    fn from(entry: &FileEntry) -> Self {
        Self {
            id: entry.file.id.to_string(),
            filename: entry.key.clone(),
            filesize: entry.file.size,
            checksum: entry.file.checksum.clone(),
        }
    }
}

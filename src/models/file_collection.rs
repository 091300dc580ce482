//! Ordered, key-unique collection of the files attached to a deposit.
//!
//! Entries are kept in a `Vec` (the externally visible order) with an
//! auxiliary `key -> position` map for lookups. Every mutation either fully
//! applies or leaves the collection untouched.

use crate::models::file_entry::FileEntry;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionError {
    #[error("file `{0}` not found")]
    KeyNotFound(String),
    #[error("file `{0}` already exists")]
    KeyExists(String),
    #[error("file key must not be empty")]
    EmptyKey,
    #[error("invalid file order: {0}")]
    InvalidOrder(String),
}

pub type CollectionResult<T> = Result<T, CollectionError>;

#[derive(Debug, Clone, Default)]
pub struct FileCollection {
    entries: Vec<FileEntry>,
    index: HashMap<String, usize>,
}

impl FileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from entries already in their persisted order.
    pub fn from_entries(entries: Vec<FileEntry>) -> CollectionResult<Self> {
        let mut collection = Self::new();
        for entry in entries {
            collection.add(entry)?;
        }
        Ok(collection)
    }

    /// Entries in collection order.
    pub fn list(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> CollectionResult<&FileEntry> {
        self.index
            .get(key)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| CollectionError::KeyNotFound(key.to_string()))
    }

    /// Append a new entry at the end of the collection.
    pub fn add(&mut self, entry: FileEntry) -> CollectionResult<&FileEntry> {
        if entry.key.is_empty() {
            return Err(CollectionError::EmptyKey);
        }
        if self.contains(&entry.key) {
            return Err(CollectionError::KeyExists(entry.key));
        }
        let pos = self.entries.len();
        self.index.insert(entry.key.clone(), pos);
        self.entries.push(entry);
        Ok(&self.entries[pos])
    }

    /// Change an entry's key in place. The stored file is left as is.
    ///
    /// Renaming a key to itself is a no-op.
    pub fn rename(&mut self, key: &str, new_key: &str) -> CollectionResult<&FileEntry> {
        let pos = *self
            .index
            .get(key)
            .ok_or_else(|| CollectionError::KeyNotFound(key.to_string()))?;
        if new_key.is_empty() {
            return Err(CollectionError::EmptyKey);
        }
        if key != new_key {
            if self.contains(new_key) {
                return Err(CollectionError::KeyExists(new_key.to_string()));
            }
            self.index.remove(key);
            self.index.insert(new_key.to_string(), pos);
            self.entries[pos].key = new_key.to_string();
        }
        Ok(&self.entries[pos])
    }

    /// Replace the collection order with `keys`.
    ///
    /// `keys` must be a permutation of the current keys: unknown, duplicated
    /// or missing keys are rejected.
    pub fn reorder<S: AsRef<str>>(&mut self, keys: &[S]) -> CollectionResult<()> {
        if keys.len() != self.entries.len() {
            return Err(CollectionError::InvalidOrder(format!(
                "expected {} keys, got {}",
                self.entries.len(),
                keys.len()
            )));
        }

        let mut seen = HashSet::with_capacity(keys.len());
        let mut positions = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            let pos = *self
                .index
                .get(key)
                .ok_or_else(|| CollectionError::InvalidOrder(format!("unknown key `{key}`")))?;
            if !seen.insert(key) {
                return Err(CollectionError::InvalidOrder(format!(
                    "duplicate key `{key}`"
                )));
            }
            positions.push(pos);
        }

        let mut slots: Vec<Option<FileEntry>> = self.entries.drain(..).map(Some).collect();
        self.entries = positions
            .into_iter()
            .filter_map(|pos| slots[pos].take())
            .collect();
        self.rebuild_index();
        Ok(())
    }

    /// Remove and return the entry stored under `key`.
    pub fn remove(&mut self, key: &str) -> CollectionResult<FileEntry> {
        let pos = self
            .index
            .remove(key)
            .ok_or_else(|| CollectionError::KeyNotFound(key.to_string()))?;
        let entry = self.entries.remove(pos);
        self.rebuild_index();
        Ok(entry)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.key.clone(), pos))
            .collect();
    }
}

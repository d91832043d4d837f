// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Durable key-value storage for annotation blobs and the record index.
//!
//! This module provides a trait-based abstraction over the storage the
//! persistence layer writes to, so the same codec runs against the local
//! filesystem, an in-memory map in tests, or a platform store supplied by an
//! embedding application.
//!
//! # Storage Implementations
//!
//! - [`FileBlobStore`]: One file per key in a data directory
//! - [`MemoryBlobStore`]: In-memory map (no persistence)
//!
//! # Examples
//!
//! ```rust
//! use land_annotation::{BlobStore, MemoryBlobStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), land_annotation::StorageError> {
//! let storage = MemoryBlobStore::new();
//! storage.set("state", r#"{"events":[]}"#).await?;
//! assert_eq!(storage.get("state").await?.as_deref(), Some(r#"{"events":[]}"#));
//! storage.remove("state").await?;
//! assert_eq!(storage.get("state").await?, None);
//! # Ok(())
//! # }
//! ```

use crate::settings;
use log::debug;
use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

/// Error type for blob storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// Storage is not available (e.g., cannot determine data directory).
    NotAvailable(String),
    /// Failed to read a value from storage.
    ReadError(String),
    /// Failed to write a value to storage.
    WriteError(String),
    /// Failed to remove a value from storage.
    RemoveError(String),
    /// The key cannot be used by this storage backend.
    InvalidKey(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotAvailable(msg) => write!(f, "Blob storage not available: {}", msg),
            StorageError::ReadError(msg) => write!(f, "Failed to read blob: {}", msg),
            StorageError::WriteError(msg) => write!(f, "Failed to write blob: {}", msg),
            StorageError::RemoveError(msg) => write!(f, "Failed to remove blob: {}", msg),
            StorageError::InvalidKey(key) => write!(f, "Invalid storage key: {:?}", key),
        }
    }
}

impl std::error::Error for StorageError {}

/// Trait for durable key-value storage of string values.
///
/// Implementations must be thread-safe (`Send + Sync`) and return `Send`
/// futures so a store can be driven from any tokio task. Writes must be
/// idempotent: setting the same value twice is harmless.
pub trait BlobStore: Send + Sync {
    /// Load the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    fn get(&self, key: &str)
    -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: BlobStore> BlobStore for Arc<S> {
    fn get(&self, key: &str)
    -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).remove(key)
    }
}

/// File-based blob storage.
///
/// Stores each value in its own file named after the key. By default the
/// files live in the platform data directory
/// (e.g., `~/.local/share/land-annotation` on Linux). Writes go through a
/// temporary file and a rename, so a crash never leaves a half-written blob.
///
/// # Examples
///
/// ```rust,no_run
/// use land_annotation::FileBlobStore;
/// use std::path::PathBuf;
///
/// // Use default directory
/// let storage = FileBlobStore::new().unwrap();
///
/// // Use custom directory
/// let storage = FileBlobStore::with_path(PathBuf::from("/custom/path"));
/// ```
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    /// Create a new `FileBlobStore` using the default platform data
    /// directory.
    pub fn new() -> Result<Self, StorageError> {
        let path = settings::default_data_dir().ok_or_else(|| {
            StorageError::NotAvailable("Could not determine user data directory".to_string())
        })?;

        debug!("FileBlobStore using default path: {:?}", path);
        Ok(Self { path })
    }

    /// Create a new `FileBlobStore` rooted at a custom directory.
    pub fn with_path(path: PathBuf) -> Self {
        debug!("FileBlobStore using custom path: {:?}", path);
        Self { path }
    }

    /// Returns the directory the blobs are stored in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\', '\0', ':']);
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.path.join(key))
    }
}

impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file = self.file(key)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(value) => {
                debug!("Loaded {} bytes from {:?}", value.len(), file);
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No blob found at {:?}", file);
                Ok(None)
            }
            Err(e) => Err(StorageError::ReadError(format!(
                "Failed to read {:?}: {}",
                file, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let file = self.file(key)?;
        tokio::fs::create_dir_all(&self.path).await.map_err(|e| {
            StorageError::WriteError(format!(
                "Failed to create directory {:?}: {}",
                self.path, e
            ))
        })?;

        let tmp = self.path.join(format!(".{}.tmp", key));
        tokio::fs::write(&tmp, value).await.map_err(|e| {
            StorageError::WriteError(format!("Failed to write {:?}: {}", tmp, e))
        })?;
        tokio::fs::rename(&tmp, &file).await.map_err(|e| {
            StorageError::WriteError(format!("Failed to move {:?} to {:?}: {}", tmp, file, e))
        })?;

        debug!("Stored {} bytes to {:?}", value.len(), file);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let file = self.file(key)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {
                debug!("Removed {:?}", file);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveError(format!(
                "Failed to remove {:?}: {}",
                file, e
            ))),
        }
    }
}

/// In-memory blob storage (no persistence).
///
/// Values are lost when the store is dropped. Useful for tests and for
/// embedding applications that persist snapshots themselves.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStore {
    /// Create a new, empty `MemoryBlobStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .read()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .read()
            .map_err(|e| StorageError::ReadError(format!("Failed to acquire read lock: {}", e)))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.values.write().map_err(|e| {
            StorageError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.values.write().map_err(|e| {
            StorageError::RemoveError(format!("Failed to acquire write lock: {}", e))
        })?;
        guard.remove(key);
        Ok(())
    }
}

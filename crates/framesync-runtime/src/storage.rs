//! Local key/value storage backends.
//!
//! This module provides the [`LocalStore`] trait used by the settings store's
//! local backend and by the capability probe, plus the stock backends.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 SettingsBackend::Local                        │
//! │   - one fixed key holding the JSON settings string            │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       LocalStore                              │
//! │   - MemoryStorage: in-memory (testing, ephemeral)             │
//! │   - UnavailableStorage: always fails (disabled storage)       │
//! │   - FileStorage: JSON file (requires state-persistence)       │
//! │   - BrowserStorage: window.localStorage (framesync-web)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returned to caller |
//! | `StorageError::Serialization` | JSON encode/decode of the store file | Returned to caller |
//! | `StorageError::Corruption` | Invalid file format, poisoned lock | Returned to caller |
//! | `StorageError::Unavailable` | Storage disabled, quota, sandbox | Probe yields `false` |
//!
//! Values are opaque strings; the store never interprets them.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during local storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization of the backing file failed.
    #[cfg(feature = "state-persistence")]
    Serialization(String),
    /// Storage is corrupted or in an invalid state.
    Corruption(String),
    /// Backend refused the operation (disabled, quota exceeded, sandboxed).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(_) => None,
            StorageError::Corruption(_) => None,
            StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A string key/value store with `localStorage` semantics.
///
/// Any method may fail at any time (quota, disabled storage, sandboxing);
/// callers decide whether a failure is fatal.
pub trait LocalStore {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the value stored under `key`, `None` if absent.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage backend for testing and ephemeral sessions.
///
/// Values are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with items.
    #[must_use]
    pub fn with_items(items: HashMap<String, String>) -> Self {
        Self {
            data: RwLock::new(items),
        }
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|g| g.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("items", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unavailable Storage
// ─────────────────────────────────────────────────────────────────────────────

/// A backend whose every operation fails.
///
/// Stands in for disabled or sandboxed storage so the remote path is taken.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStorage {
    reason: String,
}

impl UnavailableStorage {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

impl LocalStore for UnavailableStorage {
    fn name(&self) -> &str {
        "UnavailableStorage"
    }

    fn get_item(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(self.err())
    }

    fn set_item(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(self.err())
    }

    fn remove_item(&self, _key: &str) -> StorageResult<()> {
        Err(self.err())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires state-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "state-persistence")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// On-disk layout.
    #[derive(Serialize, Deserialize)]
    struct StoreFile {
        /// Format version for future migrations.
        format_version: u32,
        items: HashMap<String, String>,
    }

    impl StoreFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                items: HashMap::new(),
            }
        }
    }

    /// File-backed `localStorage` equivalent for native hosts.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "items": {
    ///     "cms_cookie": "{\"structure\":true}"
    ///   }
    /// }
    /// ```
    ///
    /// # Atomic Writes
    ///
    /// Every mutation rewrites the whole file through `{path}.tmp` followed by
    /// a rename, so a crash never leaves a half-written store.
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it will be created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn load(&self) -> StorageResult<StoreFile> {
            if !self.path.exists() {
                return Ok(StoreFile::new());
            }

            let file = File::open(&self.path)?;
            let reader = BufReader::new(file);
            let store: StoreFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse storage file: {e}"))
            })?;

            if store.format_version != StoreFile::FORMAT_VERSION {
                return Err(StorageError::Corruption(format!(
                    "unsupported storage format version {} (expected {})",
                    store.format_version,
                    StoreFile::FORMAT_VERSION
                )));
            }
            Ok(store)
        }

        fn save(&self, store: &StoreFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer(&mut writer, store).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize storage: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::trace!(
                path = %self.path.display(),
                items = store.items.len(),
                "wrote storage file"
            );
            Ok(())
        }
    }

    impl LocalStore for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.load()?.items.remove(key))
        }

        fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
            let mut store = self.load()?;
            store.items.insert(key.to_owned(), value.to_owned());
            self.save(&store)
        }

        fn remove_item(&self, key: &str) -> StorageResult<()> {
            let mut store = self.load()?;
            if store.items.remove(key).is_some() {
                self.save(&store)?;
            }
            Ok(())
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

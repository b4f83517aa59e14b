//! Directory-backed key-value store implementation.

use crate::constants::{MAX_KEY_LEN, TEMP_FILE_EXTENSION, VALUE_FILE_EXTENSION};
use crate::{FilesError, FilesResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Key-value store persisted as one file per key in a single directory.
///
/// The store is stateless apart from its root path, so it is cheap to clone and safe to share
/// between tasks. Last writer wins for concurrent writes to the same key.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    root_directory: PathBuf,
}

impl KeyValueStore {
    /// Opens a store rooted at `root_directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the path exists but is not a directory
    /// - the directory cannot be created
    pub fn open(root_directory: impl AsRef<Path>) -> FilesResult<Self> {
        let root_directory = root_directory.as_ref();

        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory: root_directory.to_path_buf(),
        })
    }

    /// Returns the directory holding the value files.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored for the key.
    pub fn get(&self, key: &str) -> FilesResult<Option<String>> {
        let path = self.value_path(key)?;

        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| FilesError::InvalidEncoding(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FilesError::Io(e)),
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// The value is written to a temporary file in the same directory and renamed into place.
    pub fn set(&self, key: &str, value: &str) -> FilesResult<()> {
        let path = self.value_path(key)?;
        let temp_path = self.temp_path(&path);

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.flush()?;
            fs::rename(&temp_path, &path)
        })();

        if let Err(e) = write_result {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        "failed to remove temporary file {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
            }
            return Err(FilesError::Io(e));
        }

        Ok(())
    }

    /// Removes the value stored under `key`. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> FilesResult<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FilesError::Io(e)),
        }
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> FilesResult<bool> {
        Ok(self.value_path(key)?.is_file())
    }

    fn value_path(&self, key: &str) -> FilesResult<PathBuf> {
        validate_key(key)?;
        Ok(self
            .root_directory
            .join(format!("{}.{}", key_digest(key), VALUE_FILE_EXTENSION)))
    }

    fn temp_path(&self, value_path: &Path) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        value_path.with_extension(format!(
            "{}.{}.{}",
            std::process::id(),
            counter,
            TEMP_FILE_EXTENSION
        ))
    }
}

/// Hex SHA-256 digest of a key; used as its file stem.
fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn validate_key(key: &str) -> FilesResult<()> {
    if key.is_empty() {
        return Err(FilesError::InvalidKey("key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(FilesError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LEN
        )));
    }

    if key.chars().any(char::is_control) {
        return Err(FilesError::InvalidKey(
            "key cannot contain control characters".into(),
        ));
    }

    Ok(())
}

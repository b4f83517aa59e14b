//! Local key-value persistence.
//!
//! This crate provides the on-disk stand-in for the browser's local storage: a flat directory
//! where each key maps to one file holding its value.
//!
//! ## Layout
//!
//! ```text
//! <cache_dir>/
//! ├── 3f1c…9a.json    # sha256("alice_grouped_diagnoses")
//! ├── 8b07…e2.json    # sha256("alice_grouped_diagnoses_fallback")
//! └── d41e…07.json    # sha256("lastComputingId")
//! ```
//!
//! File names are the hex SHA-256 digest of the key, so user-supplied identifiers inside keys
//! can never escape the directory. Writes go to a temporary file first and are renamed into
//! place, so a reader never observes a half-written value.
//!
//! ## Example Usage
//!
//! ```no_run
//! use dxg_files::KeyValueStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = KeyValueStore::open(".dxg-cache")?;
//! store.set("lastComputingId", "abc1de")?;
//! assert_eq!(store.get("lastComputingId")?.as_deref(), Some("abc1de"));
//! # Ok(())
//! # }
//! ```

mod constants;
mod store;

pub use constants::{MAX_KEY_LEN, VALUE_FILE_EXTENSION};
pub use store::KeyValueStore;

/// Errors that can occur during key-value operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Store directory could not be used
    #[error("Invalid store directory: {0}")]
    InvalidRootDirectory(String),

    /// Key rejected before touching the filesystem
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Stored value is not valid UTF-8
    #[error("Value for key {0} is not valid UTF-8")]
    InvalidEncoding(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for key-value operations.
pub type FilesResult<T> = Result<T, FilesError>;

//! Identifier utilities.
//!
//! Two kinds of identifier flow through the grouping tree:
//!
//! - **Group ids** are allocated when a user creates a group or subgroup. Freshly allocated ids
//!   use a *canonical* representation: **32 lowercase hexadecimal characters** (no hyphens), the
//!   simple form of a version 4 UUID. Ids read back from persisted sessions are accepted in any
//!   non-empty form, since earlier sessions may carry ids produced by other tools.
//! - **Diagnosis ids** are normally supplied clinical codes. When a catalog entry has no code, a
//!   deterministic fallback is derived from the suggestion-group id, the normalised name and the
//!   position of the entry, so reloading the same catalog always yields the same ids.
//!
//! ## Canonical group id form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! ## Fallback diagnosis id form
//! `gen-<group>-<slug>-<index>`, for example `gen-g7-type-2-diabetes-3`.

mod service;

// Re-export public types
pub use service::{fallback_diagnosis_id, slugify, GroupId};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;

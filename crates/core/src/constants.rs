//! Constants used throughout the grouping core.
//!
//! Storage key suffixes are shared with the browser front-end, so they must not change.

/// Default number of snapshots kept by the undo stack.
pub const DEFAULT_UNDO_CAPACITY: usize = 10;

/// Default quiet period before a scheduled save is flushed, in milliseconds.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1_000;

/// Default directory for the local cache when no explicit directory is configured.
pub const DEFAULT_CACHE_DIR: &str = ".dxg-cache";

/// Suffix of the primary local cache key: `{user_id}_grouped_diagnoses`.
pub const PRIMARY_CACHE_SUFFIX: &str = "_grouped_diagnoses";

/// Suffix of the fallback local cache key: `{user_id}_grouped_diagnoses_fallback`.
pub const FALLBACK_CACHE_SUFFIX: &str = "_grouped_diagnoses_fallback";

/// Local key remembering the last identifier a user signed in with.
pub const LAST_USER_ID_KEY: &str = "lastComputingId";

/// Suffix of the remote object name: `{user_id}_grouped_diagnoses.json`.
pub const REMOTE_FILENAME_SUFFIX: &str = "_grouped_diagnoses.json";

/// Broker endpoint that hands out presigned URLs.
pub const PRESIGN_ENDPOINT: &str = "get-presigned-url";

/// Timeout applied to every broker and storage request, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 15;

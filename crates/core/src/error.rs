//! Error types for the grouping core.
//!
//! [`GroupingError`] covers everything a user action can be refused for. [`StoreError`] covers
//! persistence failures; the session store recovers from all of them locally, so they only
//! reach callers that talk to a [`crate::session_store::BlobStore`] or
//! [`crate::session_store::LocalCache`] directly.

#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a group named '{0}' already exists")]
    DuplicateName(String),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("diagnosis not found: {0}")]
    DiagnosisNotFound(String),
    #[error("all suggestions have been processed")]
    NoCurrentSuggestion,

    #[error("failed to read catalog: {0}")]
    CatalogRead(std::io::Error),
    #[error("failed to parse catalog: {0}")]
    CatalogParse(serde_json::Error),
    #[error("failed to fetch catalog: {0}")]
    CatalogFetch(String),
}

pub type GroupingResult<T> = std::result::Result<T, GroupingError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Broker or storage unreachable, or a non-success status.
    #[error("network error: {0}")]
    Network(String),
    /// No session has been stored remotely for this user yet.
    #[error("no stored session")]
    NotFound,
    #[error("failed to parse stored session: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("local storage error: {0}")]
    Local(#[from] dxg_files::FilesError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

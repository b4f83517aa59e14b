//! # DXG Core
//!
//! Core logic of the diagnosis grouping workspace.
//!
//! This crate contains the session model and every operation on it:
//! - the grouping tree engine (pure, persistent tree operations)
//! - suggestion reconciliation against the diagnosis catalog
//! - bounded undo history
//! - session persistence through a presigned-URL broker with a local fallback cache
//! - a debounced save queue per open session
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and
//! `dxg-cli`. Library code never reads environment variables; binaries resolve a
//! [`CoreConfig`] at startup and pass it in.

pub mod broker;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod save_queue;
pub mod session_store;
pub mod suggestions;
pub mod tree;
pub mod undo;
pub mod validation;
pub mod workspace;

pub use config::CoreConfig;
pub use error::{GroupingError, GroupingResult, StoreError, StoreResult};
pub use model::{Diagnosis, Forest, Group, SessionState, SuggestionGroup};
pub use save_queue::{SaveHandle, SaveQueue};
pub use session_store::{DefaultSessionStore, LoadOutcome, LoadSource, SaveOutcome, SessionStore};
pub use workspace::{SaveHint, Workspace, WorkspaceSummary};

pub use dxg_types::NonEmptyText;
pub use dxg_uuid::GroupId;

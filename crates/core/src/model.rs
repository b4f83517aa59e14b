//! Data model of a grouping session.
//!
//! The wire format is shared with the browser front-end and uses camelCase field names:
//!
//! ```json
//! {
//!   "confirmedGroups": [
//!     {"id": "…", "name": "Eye", "diagnoses": [{"id": "H40", "name": "Glaucoma", "description": ""}],
//!      "subgroups": [], "collapsed": false}
//!   ],
//!   "unsortedDiagnoses": []
//! }
//! ```
//!
//! Sessions written by early versions of the tool are a bare array of groups; see
//! [`SessionState::from_json`].

use crate::GroupId;
use dxg_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered list of group nodes.
///
/// Nodes are reference counted so that successive versions of a tree, and the snapshots held by
/// the undo stack, share every subtree that did not change.
pub type Forest = Vec<Arc<Group>>;

/// A single clinical diagnosis. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Diagnosis {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }
}

/// A node of the confirmed grouping tree.
///
/// `subgroups` order encodes causal progression and is preserved by every operation;
/// `diagnoses` order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    pub subgroups: Forest,
    #[serde(default)]
    pub collapsed: bool,
}

impl Group {
    /// Creates an empty, expanded group with a freshly allocated id.
    pub fn new(name: &NonEmptyText) -> Self {
        Self::with_diagnoses(name, Vec::new())
    }

    /// Creates an expanded group with a freshly allocated id holding `diagnoses`.
    pub fn with_diagnoses(name: &NonEmptyText, diagnoses: Vec<Diagnosis>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.as_str().to_string(),
            diagnoses,
            subgroups: Vec::new(),
            collapsed: false,
        }
    }

    /// Returns true if this node itself (not its descendants) holds `diagnosis_id`.
    pub fn holds(&self, diagnosis_id: &str) -> bool {
        self.diagnoses.iter().any(|d| d.id == diagnosis_id)
    }
}

/// A candidate cluster derived from the static catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionGroup {
    pub id: String,
    pub name: String,
    pub diagnoses: Vec<Diagnosis>,
}

impl SuggestionGroup {
    /// A suggestion is resolved once all of its diagnoses have been filed elsewhere.
    pub fn is_resolved(&self) -> bool {
        self.diagnoses.is_empty()
    }
}

/// One user's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub confirmed_groups: Forest,
    #[serde(default)]
    pub unsorted_diagnoses: Vec<Diagnosis>,
}

impl SessionState {
    /// Parses a stored session.
    ///
    /// Accepts both the current object shape and the legacy shape, a bare array of groups,
    /// which is read as `{confirmedGroups: <array>, unsortedDiagnoses: []}`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        if value.is_array() {
            let confirmed_groups: Forest = serde_json::from_value(value)?;
            return Ok(Self {
                confirmed_groups,
                unsorted_diagnoses: Vec::new(),
            });
        }

        serde_json::from_value(value)
    }

    /// Serialises the session in the current object shape.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed_groups.is_empty() && self.unsorted_diagnoses.is_empty()
    }
}

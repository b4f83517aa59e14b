//! Internal implementation of identifier services.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};
use ::uuid::Uuid;

/// Identifier of a group node in the grouping tree.
///
/// Newly allocated ids are always canonical (32 lowercase hex characters). Ids parsed from
/// persisted sessions only need to be non-empty; nodes keep whatever id they were created with
/// for their whole lifetime.
///
/// # Construction
/// - [`GroupId::new`] allocates a new canonical id.
/// - [`GroupId::parse`] wraps an externally supplied id (CLI/API input, stored session).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupId {
    /// Allocates a new group id in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an externally supplied group id.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is empty or whitespace only.
    pub fn parse(input: &str) -> UuidResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UuidError::InvalidInput(
                "group id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id is in canonical form.
    pub fn is_canonical(&self) -> bool {
        Self::is_canonical_str(&self.0)
    }

    /// Returns true if `input` is 32 lowercase hex characters.
    ///
    /// This is a purely syntactic check.
    pub fn is_canonical_str(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupId::parse(s)
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for GroupId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for GroupId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for GroupId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for GroupId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        GroupId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Normalises a diagnosis name for use inside an identifier.
///
/// Lowercases the name, collapses every run of non-alphanumeric characters into a single `-`
/// and trims leading and trailing separators.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Derives a stable diagnosis id for a catalog entry that has no clinical code.
///
/// The id only depends on its inputs, so the same catalog always produces the same ids.
///
/// # Arguments
///
/// * `group_id` - Key of the suggestion group in the catalog
/// * `name` - Diagnosis name as it appears in the catalog
/// * `index` - Zero-based position of the entry within its suggestion group
pub fn fallback_diagnosis_id(group_id: &str, name: &str, index: usize) -> String {
    format!("gen-{}-{}-{}", slugify(group_id), slugify(name), index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = GroupId::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.is_canonical());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(GroupId::new(), GroupId::new());
    }

    #[test]
    fn test_parse_accepts_legacy_ids() {
        let id = GroupId::parse("group-1699999999999").unwrap();
        assert_eq!(id.as_str(), "group-1699999999999");
        assert!(!id.is_canonical());
    }

    #[test]
    fn test_parse_trims_and_rejects_blank() {
        assert_eq!(GroupId::parse("  g1 ").unwrap().as_str(), "g1");
        match GroupId::parse("   ") {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("cannot be empty")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_is_canonical_str() {
        assert!(GroupId::is_canonical_str("550e8400e29b41d4a716446655440000"));
        assert!(!GroupId::is_canonical_str("550E8400E29B41D4A716446655440000"));
        assert!(!GroupId::is_canonical_str("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!GroupId::is_canonical_str(""));
    }

    #[test]
    fn test_serde_is_a_plain_string() {
        let id = GroupId::parse("g1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"g1\"");

        let back: GroupId = serde_json::from_str("\"g1\"").unwrap();
        assert_eq!(back, id);

        let empty: Result<GroupId, _> = serde_json::from_str("\"\"");
        assert!(empty.is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Type 2 Diabetes"), "type-2-diabetes");
        assert_eq!(slugify("  Heart failure, acute!  "), "heart-failure-acute");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("Ménière's disease"), "ménière-s-disease");
    }

    #[test]
    fn test_fallback_id_is_deterministic() {
        let first = fallback_diagnosis_id("g7", "Type 2 Diabetes", 3);
        let second = fallback_diagnosis_id("g7", "Type 2 Diabetes", 3);

        assert_eq!(first, "gen-g7-type-2-diabetes-3");
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_id_distinguishes_position_and_group() {
        let a = fallback_diagnosis_id("g1", "Cough", 0);
        let b = fallback_diagnosis_id("g1", "Cough", 1);
        let c = fallback_diagnosis_id("g2", "Cough", 0);

        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}

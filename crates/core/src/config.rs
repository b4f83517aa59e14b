//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Library code never reads process-wide environment variables;
//! binaries read them and hand the raw values to the `*_from_env_value` helpers below.

use crate::constants::{DEFAULT_CACHE_DIR, DEFAULT_SAVE_DEBOUNCE_MS, DEFAULT_UNDO_CAPACITY};
use crate::{GroupingError, GroupingResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    broker_url: Option<String>,
    cache_dir: PathBuf,
    catalog_source: Option<String>,
    save_debounce: Duration,
    undo_capacity: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `broker_url` of `None` runs the session store in local-only mode.
    pub fn new(
        broker_url: Option<String>,
        cache_dir: PathBuf,
        catalog_source: Option<String>,
        save_debounce: Duration,
        undo_capacity: usize,
    ) -> GroupingResult<Self> {
        if undo_capacity == 0 {
            return Err(GroupingError::InvalidInput(
                "undo capacity must be at least 1".into(),
            ));
        }

        Ok(Self {
            broker_url,
            cache_dir,
            catalog_source,
            save_debounce,
            undo_capacity,
        })
    }

    pub fn broker_url(&self) -> Option<&str> {
        self.broker_url.as_deref()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn catalog_source(&self) -> Option<&str> {
        self.catalog_source.as_deref()
    }

    pub fn save_debounce(&self) -> Duration {
        self.save_debounce
    }

    pub fn undo_capacity(&self) -> usize {
        self.undo_capacity
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the broker base URL.
///
/// Empty or missing values mean "no broker". A trailing `/` is dropped so endpoint paths can be
/// appended directly.
pub fn broker_url_from_env_value(value: Option<String>) -> GroupingResult<Option<String>> {
    let Some(url) = non_blank(value) else {
        return Ok(None);
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(GroupingError::InvalidInput(format!(
            "broker url must start with http:// or https://, got: '{}'",
            url
        )));
    }

    Ok(Some(url.trim_end_matches('/').to_string()))
}

/// Resolve the local cache directory, defaulting to [`DEFAULT_CACHE_DIR`].
pub fn cache_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

/// Resolve the catalog source (file path or URL). Missing means "no suggestions".
pub fn catalog_source_from_env_value(value: Option<String>) -> Option<String> {
    non_blank(value)
}

/// Parse the save quiet period in milliseconds.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_SAVE_DEBOUNCE_MS`].
pub fn save_debounce_from_env_value(value: Option<String>) -> GroupingResult<Duration> {
    let millis = match non_blank(value) {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            GroupingError::InvalidInput(format!("invalid save debounce '{}': {}", raw, e))
        })?,
        None => DEFAULT_SAVE_DEBOUNCE_MS,
    };

    Ok(Duration::from_millis(millis))
}

/// Parse the undo stack capacity.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_UNDO_CAPACITY`].
pub fn undo_capacity_from_env_value(value: Option<String>) -> GroupingResult<usize> {
    let capacity = match non_blank(value) {
        Some(raw) => raw.parse::<usize>().map_err(|e| {
            GroupingError::InvalidInput(format!("invalid undo capacity '{}': {}", raw, e))
        })?,
        None => DEFAULT_UNDO_CAPACITY,
    };

    if capacity == 0 {
        return Err(GroupingError::InvalidInput(
            "undo capacity must be at least 1".into(),
        ));
    }

    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_url_is_optional_and_normalised() {
        assert_eq!(broker_url_from_env_value(None).unwrap(), None);
        assert_eq!(broker_url_from_env_value(Some("  ".into())).unwrap(), None);
        assert_eq!(
            broker_url_from_env_value(Some("https://broker.example.org/".into())).unwrap(),
            Some("https://broker.example.org".to_string())
        );
    }

    #[test]
    fn test_broker_url_rejects_other_schemes() {
        let result = broker_url_from_env_value(Some("ftp://broker".into()));
        assert!(matches!(result, Err(GroupingError::InvalidInput(_))));
    }

    #[test]
    fn test_save_debounce_defaults_and_parses() {
        assert_eq!(
            save_debounce_from_env_value(None).unwrap(),
            Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS)
        );
        assert_eq!(
            save_debounce_from_env_value(Some("250".into())).unwrap(),
            Duration::from_millis(250)
        );
        assert!(save_debounce_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn test_undo_capacity_rejects_zero() {
        assert_eq!(undo_capacity_from_env_value(None).unwrap(), DEFAULT_UNDO_CAPACITY);
        assert_eq!(undo_capacity_from_env_value(Some("3".into())).unwrap(), 3);
        assert!(undo_capacity_from_env_value(Some("0".into())).is_err());
        assert!(CoreConfig::new(None, PathBuf::from("x"), None, Duration::ZERO, 0).is_err());
    }

    #[test]
    fn test_cache_dir_default() {
        assert_eq!(cache_dir_from_env_value(None), PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(
            cache_dir_from_env_value(Some("/tmp/dxg".into())),
            PathBuf::from("/tmp/dxg")
        );
    }
}

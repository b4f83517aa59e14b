//! Input validation utilities.
//!
//! This module contains functions for validating user inputs before they are embedded in
//! storage keys or remote object names.

use crate::{GroupingError, GroupingResult};

/// Validates a user-supplied session identifier (the "computing ID").
///
/// The identifier becomes part of local cache keys and the remote object name, so it is held to
/// a conservative character set:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to avoid pathological inputs
/// - Allows only ASCII alphanumerics, `.`, `-` and `_`
///
/// Returns the trimmed identifier.
///
/// # Errors
///
/// Returns a `GroupingError::InvalidInput` if the identifier is invalid.
pub fn validate_user_id(user_id: &str) -> GroupingResult<&str> {
    const MAX_USER_ID_LEN: usize = 64;

    let user_id = user_id.trim();

    if user_id.is_empty() {
        return Err(GroupingError::InvalidInput("user id cannot be empty".into()));
    }

    if user_id.len() > MAX_USER_ID_LEN {
        return Err(GroupingError::InvalidInput(format!(
            "user id exceeds maximum length of {} characters",
            MAX_USER_ID_LEN
        )));
    }

    let ok = user_id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(GroupingError::InvalidInput(
            "user id contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(user_id)
}

//! Key validation and path conversion
//!
//! A stored path is a slash-delimited sequence of tokens with a leading and a
//! trailing `/` (`/users/alice/name/`). Object field names are stored as-is
//! after validation. Array positions are stored as `[` followed by the
//! sortable encoding of the index, so lexical order of array tokens equals
//! numeric order.
//!
//! ## Contract
//!
//! - Keys must not be empty
//! - Keys must not contain `. % $ # [ ] /`
//! - Keys must not contain ASCII control characters (0-31, 127)
//! - Keys must not exceed [`MAX_KEY_BYTES`]
//!
//! Validation happens before any SQL is issued.

use crate::encoding::{decode_index, encode_index};
use crate::error::{Error, Result};
use thiserror::Error;

/// Maximum length of a single path token in bytes
pub const MAX_KEY_BYTES: usize = 768;

/// Characters that may not appear in a key
pub const FORBIDDEN_CHARS: [char; 7] = ['.', '%', '$', '#', '[', ']', '/'];

/// Prefix marking a stored token as an array position
pub const ARRAY_TOKEN_PREFIX: char = '[';

/// Path separator
pub const SEPARATOR: char = '/';

/// Validate a single key (object field name or caller path segment)
///
/// # Examples
///
/// ```
/// use jsondb_core::key::validate_key;
///
/// assert!(validate_key("name").is_ok());
/// assert!(validate_key("user:123").is_ok());
///
/// assert!(validate_key("").is_err());
/// assert!(validate_key("a.b").is_err());
/// assert!(validate_key("tab\there").is_err());
/// ```
pub fn validate_key(key: &str) -> std::result::Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(KeyError::TooLong {
            actual: key.len(),
            max: MAX_KEY_BYTES,
        });
    }

    for c in key.chars() {
        if FORBIDDEN_CHARS.contains(&c) {
            return Err(KeyError::ForbiddenChar(c));
        }
        if (c as u32) < 32 || c as u32 == 127 {
            return Err(KeyError::ControlChar(c as u32));
        }
    }

    Ok(())
}

/// Key validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key is empty (length 0)
    #[error("Key cannot be empty")]
    Empty,

    /// Key contains one of the reserved characters
    #[error("Key cannot contain '{0}'")]
    ForbiddenChar(char),

    /// Key contains an ASCII control character
    #[error("Key cannot contain control character 0x{0:02x}")]
    ControlChar(u32),

    /// Key exceeds maximum length
    #[error("Key too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Actual key length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}

/// Stored token for an array position
pub fn array_token(index: u64) -> String {
    let mut token = String::with_capacity(4);
    token.push(ARRAY_TOKEN_PREFIX);
    token.push_str(&encode_index(index));
    token
}

/// Whether a stored token addresses an array position
pub fn is_array_token(token: &str) -> bool {
    token.starts_with(ARRAY_TOKEN_PREFIX)
}

/// Decode an array token back to its index
pub fn parse_array_token(token: &str) -> Result<u64> {
    match token.strip_prefix(ARRAY_TOKEN_PREFIX) {
        Some(encoded) => decode_index(encoded),
        None => Err(Error::corruption(format!(
            "'{}' is not an array position",
            token
        ))),
    }
}

/// Caller segments of a path, empty segments skipped
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Whether a caller segment is all digits, and so may name an array position
pub fn is_position_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Validate every segment of a caller path without converting it
pub fn validate_path(path: &str) -> Result<()> {
    for segment in segments(path) {
        validate_key(segment)?;
    }
    Ok(())
}

/// Stored token of one caller key, trailing `/` included
///
/// An all-digit key becomes an array token when `as_position` is set and
/// stays a literal field name otherwise. Any other key is validated and kept
/// as-is.
///
/// ```
/// use jsondb_core::key::{array_token, child_token};
///
/// assert_eq!(child_token("k", true).unwrap(), "k/");
/// assert_eq!(child_token("0", false).unwrap(), "0/");
/// assert_eq!(child_token("0", true).unwrap(), format!("{}/", array_token(0)));
/// assert!(child_token("a/b", false).is_err());
/// ```
pub fn child_token(key: &str, as_position: bool) -> Result<String> {
    validate_key(key)?;
    let mut token = if as_position && is_position_segment(key) {
        let index: u64 = key.parse().map_err(|_| {
            Error::invalid_input(format!("array index '{}' is out of range", key))
        })?;
        array_token(index)
    } else {
        key.to_string()
    };
    token.push(SEPARATOR);
    Ok(token)
}

/// Convert a caller path into its stored form, without looking at stored data
///
/// Empty segments are ignored, all-digit segments become array tokens and
/// every other segment is validated as a key. The result always starts and
/// ends with `/`; the root is `/`. The store itself resolves all-digit
/// segments against the container already stored at that point, so an
/// object field named `"0"` stays reachable.
///
/// ```
/// use jsondb_core::key::to_db_path;
///
/// assert_eq!(to_db_path("/a/c/").unwrap(), "/a/c/");
/// assert_eq!(to_db_path("a/c").unwrap(), "/a/c/");
/// assert_eq!(to_db_path("").unwrap(), "/");
/// assert!(to_db_path("/a/c/0/").unwrap().starts_with("/a/c/["));
/// ```
pub fn to_db_path(path: &str) -> Result<String> {
    let mut out = String::with_capacity(path.len() + 2);
    out.push(SEPARATOR);
    for segment in segments(path) {
        out.push_str(&child_token(segment, true)?);
    }
    Ok(out)
}

/// Iterate the tokens of a stored path
pub fn tokens(db_path: &str) -> impl Iterator<Item = &str> {
    segments(db_path)
}

/// Render a stored token the way callers address it
pub fn token_to_user(token: &str) -> Result<String> {
    if is_array_token(token) {
        Ok(parse_array_token(token)?.to_string())
    } else {
        Ok(token.to_string())
    }
}

/// Render a stored path the way callers address it (`/a/c/0`)
pub fn to_user_path(db_path: &str) -> Result<String> {
    let mut out = String::with_capacity(db_path.len());
    for token in tokens(db_path) {
        out.push(SEPARATOR);
        out.push_str(&token_to_user(token)?);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    Ok(out)
}

/// Strict ancestors of a stored path, root first
///
/// `/a/b/c/` yields `/`, `/a/`, `/a/b/`. The root has no ancestors.
pub fn ancestors(db_path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let trimmed = db_path.trim_end_matches(SEPARATOR);
    for (i, c) in trimmed.char_indices() {
        if c == SEPARATOR {
            result.push(trimmed[..=i].to_string());
        }
    }
    result
}

/// Append a validated key to a stored path
pub fn child_path(db_path: &str, key: &str) -> Result<String> {
    validate_key(key)?;
    let mut out = String::with_capacity(db_path.len() + key.len() + 1);
    out.push_str(db_path);
    out.push_str(key);
    out.push(SEPARATOR);
    Ok(out)
}

/// Smallest string greater than every string prefixed by `s`, approximately:
/// the last character is incremented.
///
/// Boundary tokens end with `/`, so `successor("k/")` is `"k0"`.
pub fn successor(s: &str) -> String {
    let mut out = s.to_string();
    match out.pop() {
        Some(last) => {
            let next = match last as u32 {
                0xD7FF => Some('\u{E000}'),
                code => char::from_u32(code + 1),
            };
            match next {
                Some(c) => out.push(c),
                None => {
                    out.push(last);
                    out.push('\u{0}');
                }
            }
        }
        None => out.push('\u{0}'),
    }
    out
}

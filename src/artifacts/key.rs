//! Series key normalization

use crate::error::{ForecastError, Result};

/// Longest accepted series key
pub const MAX_KEY_LEN: usize = 32;

/// Trim and upper-case a series key, then check it is safe to use as a
/// directory name: 1 to 32 characters of `[A-Z0-9._^-]`, not a dot-only name.
pub fn normalize_key(raw: &str) -> Result<String> {
    let key = raw.trim().to_uppercase();

    let invalid = |reason: &str| ForecastError::InvalidParameter {
        key: key.clone(),
        name: "key".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(invalid("must be at most 32 characters"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '^' | '-'))
    {
        return Err(invalid("may only contain A-Z, 0-9, '.', '_', '^' and '-'"));
    }
    if key.chars().all(|c| c == '.') {
        return Err(invalid("must not consist of dots only"));
    }

    Ok(key)
}

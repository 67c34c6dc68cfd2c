//! Group and songbook name validation.

use crate::error::CoreError;

/// Maximum group name length.
pub const MAX_GROUP_NAME_LENGTH: usize = 64;

/// Maximum songbook name length.
pub const MAX_SONGBOOK_NAME_LENGTH: usize = 50;

/// Revision a songbook starts at; every entry change bumps it.
pub const INITIAL_SONGBOOK_REVISION: i32 = 1;

fn validate_name(kind: &str, name: &str, max: usize) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{kind} name must not be empty")));
    }
    if trimmed.len() != name.len() {
        return Err(CoreError::Validation(format!(
            "{kind} name must not have leading or trailing whitespace"
        )));
    }
    if name.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "{kind} name must not exceed {max} characters"
        )));
    }
    Ok(())
}

/// Validate a group name: non-empty, trimmed, at most 64 characters.
pub fn validate_group_name(name: &str) -> Result<(), CoreError> {
    validate_name("Group", name, MAX_GROUP_NAME_LENGTH)
}

/// Validate a songbook name: non-empty, trimmed, at most 50 characters.
pub fn validate_songbook_name(name: &str) -> Result<(), CoreError> {
    validate_name("Songbook", name, MAX_SONGBOOK_NAME_LENGTH)
}

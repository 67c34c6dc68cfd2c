//! Group role names and the moderation permission check.
//!
//! These must match the `role` check constraint on `memberships`.

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_DEFAULT: &str = "default";

/// All valid membership roles.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_MODERATOR, ROLE_DEFAULT];

/// Validate that a role string is one of the known roles.
pub fn validate_role(role: &str) -> Result<(), CoreError> {
    if VALID_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid role '{role}'. Must be one of: {}",
            VALID_ROLES.join(", ")
        )))
    }
}

/// Returns `true` if members with this role may approve or reject edits.
pub fn can_moderate(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_MODERATOR
}

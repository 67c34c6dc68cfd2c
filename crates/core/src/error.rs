use crate::types::DbId;

/// Domain error shared by every crate in the workspace.
///
/// Each variant has a fixed retry contract: `Validation`, `NotFound`,
/// `InvalidState` and `Forbidden` are caller mistakes and are never retried.
/// `Conflict` means the text moved underneath an edit; the caller may
/// resubmit against the new current version. Nothing retries internally.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

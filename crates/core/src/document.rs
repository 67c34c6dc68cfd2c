//! Song documents, their immutable versions, and input validation.
//!
//! Titles and artists are limited to 100 characters, arrangement names to 50,
//! bodies to 10 000.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::types::{DbId, Revision, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum song title length in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum artist name length in characters.
pub const MAX_ARTIST_LENGTH: usize = 100;

/// Maximum arrangement name length in characters.
pub const MAX_ARRANGEMENT_LENGTH: usize = 50;

/// Arrangement name used when none is given.
pub const DEFAULT_ARRANGEMENT: &str = "Default";

/// Maximum song body length in characters.
pub const MAX_BODY_LENGTH: usize = 10_000;

/// Revision number of the text a document is created with.
pub const INITIAL_REVISION: Revision = 1;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A versioned song body owned by a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: DbId,
    pub group_id: DbId,
    pub title: String,
    pub artist: Option<String>,
    /// Name of this arrangement of the song, e.g. "Default" or "Capo 2".
    pub arrangement: String,
    pub author_id: DbId,
    pub current_version_id: DbId,
    pub created_at: Timestamp,
}

/// An immutable snapshot of a document's text at one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub id: DbId,
    pub document_id: DbId,
    pub revision: Revision,
    pub text: String,
    pub text_hash: String,
    pub author_id: DbId,
    pub created_at: Timestamp,
}

/// Input for creating a document together with its revision-1 version.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDocument {
    pub group_id: DbId,
    #[validate(
        length(max = 100, message = "Title must be at most 100 characters"),
        custom(function = "not_blank", message = "Title must not be empty")
    )]
    pub title: String,
    #[validate(length(max = 100, message = "Artist must be at most 100 characters"))]
    pub artist: Option<String>,
    #[validate(
        length(max = 50, message = "Arrangement name must be at most 50 characters"),
        custom(function = "not_blank", message = "Arrangement name must not be empty")
    )]
    pub arrangement: Option<String>,
    pub author_id: DbId,
    #[validate(
        length(max = 10000, message = "Song body must be at most 10000 characters"),
        custom(function = "not_blank", message = "Song body must not be empty")
    )]
    pub initial_text: String,
}

impl NewDocument {
    /// Run all field checks, converting failures into [`CoreError::Validation`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(CoreError::from)
    }

    /// The arrangement name to store, falling back to [`DEFAULT_ARRANGEMENT`].
    pub fn arrangement_name(&self) -> &str {
        self.arrangement.as_deref().unwrap_or(DEFAULT_ARRANGEMENT)
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a song body produced by an edit (non-blank, <= 10 000 chars).
pub fn validate_body(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation("Song body must not be empty".into()));
    }
    let len = text.chars().count();
    if len > MAX_BODY_LENGTH {
        return Err(CoreError::Validation(format!(
            "Song body must be at most {MAX_BODY_LENGTH} characters, got {len}"
        )));
    }
    Ok(())
}

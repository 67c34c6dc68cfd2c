//! Proposed edits and the moderation state machine.
//!
//! An edit starts `pending` and moves exactly once to `approved` or
//! `rejected`; both are terminal. Resolved edits are kept as an audit trail.

use serde::{Deserialize, Serialize};

use crate::diff::{apply_diff, validate_payload, DiffPayload};
use crate::document::{validate_body, Version};
use crate::error::CoreError;
use crate::hashing::text_hash;
use crate::types::{DbId, Timestamp};

/// Maximum length of a rejection reason.
pub const MAX_REASON_LENGTH: usize = 1000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Moderation status. Discriminants match the `edit_statuses` seed rows.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    Pending = 1,
    Approved = 2,
    Rejected = 3,
}

impl EditStatus {
    /// Return the database status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Approved),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for EditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A diff submitted against a base version, awaiting or past moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedEdit {
    pub id: DbId,
    pub document_id: DbId,
    pub base_version_id: DbId,
    pub diff: DiffPayload,
    pub proposer_id: DbId,
    pub status: EditStatus,
    pub moderator_id: Option<DbId>,
    pub decided_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    /// The version this edit produced; set only once approved.
    pub result_version_id: Option<DbId>,
    pub submitted_at: Timestamp,
}

impl ProposedEdit {
    /// Transition to `approved`, recording the version it produced.
    pub fn mark_approved(
        &mut self,
        moderator_id: DbId,
        version_id: DbId,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        ensure_pending(self.id, self.status)?;
        self.status = EditStatus::Approved;
        self.moderator_id = Some(moderator_id);
        self.decided_at = Some(at);
        self.result_version_id = Some(version_id);
        Ok(())
    }

    /// Transition to `rejected`. No version is produced.
    pub fn mark_rejected(
        &mut self,
        moderator_id: DbId,
        reason: &str,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        ensure_pending(self.id, self.status)?;
        validate_rejection_reason(reason)?;
        self.status = EditStatus::Rejected;
        self.moderator_id = Some(moderator_id);
        self.decided_at = Some(at);
        self.rejection_reason = Some(reason.trim().to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Workflow checks
// ---------------------------------------------------------------------------

/// Fail with [`CoreError::InvalidState`] unless the edit is still pending.
pub fn ensure_pending(edit_id: DbId, status: EditStatus) -> Result<(), CoreError> {
    if status.is_terminal() {
        return Err(CoreError::InvalidState(format!(
            "edit {edit_id} is already {status}"
        )));
    }
    Ok(())
}

/// Validate a moderator's rejection reason (non-blank, <= 1000 chars).
pub fn validate_rejection_reason(reason: &str) -> Result<(), CoreError> {
    if reason.trim().is_empty() {
        return Err(CoreError::Validation(
            "Rejection reason must not be empty".into(),
        ));
    }
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(CoreError::Validation(format!(
            "Rejection reason must be at most {MAX_REASON_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Check a new proposal against the text of its claimed base version.
///
/// The diff must be well formed, change something, have been computed
/// against exactly `base_text`, and produce a body within bounds. Hunks that
/// do not line up with `base_text` make the payload malformed.
pub fn check_proposal(base_text: &str, diff: &DiffPayload) -> Result<(), CoreError> {
    validate_payload(diff)?;
    if diff.is_empty() {
        return Err(CoreError::Validation("Edit does not change the text".into()));
    }
    if diff.base_hash != text_hash(base_text) {
        return Err(CoreError::Validation(
            "Diff was not computed against the given base version".into(),
        ));
    }
    let result = apply_diff(base_text, diff).map_err(|err| match err {
        CoreError::Conflict(msg) => CoreError::Validation(msg),
        other => other,
    })?;
    validate_body(&result)
}

/// Apply a pending edit to the document's current version.
///
/// When the current version is not the edit's base this is a rebase; it
/// succeeds only if the current text hashes to the diff's base hash.
pub fn rebase_onto(edit: &ProposedEdit, current: &Version) -> Result<String, CoreError> {
    if current.id != edit.base_version_id {
        tracing::debug!(
            edit_id = edit.id,
            base_version_id = edit.base_version_id,
            current_version_id = current.id,
            current_revision = current.revision,
            "Rebasing edit onto newer current version",
        );
    }
    apply_diff(&current.text, &edit.diff)
}

//! Proposed edit model. Rows are never deleted; resolved edits form the
//! audit trail of every suggested change.

use serde::{Deserialize, Serialize};
use songbook_core::diff::DiffPayload;
use songbook_core::edit::{EditStatus, ProposedEdit};
use songbook_core::error::CoreError;
use songbook_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `song_edits` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SongEdit {
    pub id: DbId,
    pub song_id: DbId,
    pub base_version_id: DbId,
    pub diff: Json<DiffPayload>,
    pub proposer_id: DbId,
    pub status_id: i16,
    pub moderator_id: Option<DbId>,
    pub decided_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    pub result_version_id: Option<DbId>,
    pub submitted_at: Timestamp,
}

impl SongEdit {
    /// Decode the status lookup id.
    pub fn status(&self) -> Result<EditStatus, CoreError> {
        EditStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "edit {} has unknown status id {}",
                self.id, self.status_id
            ))
        })
    }
}

impl TryFrom<SongEdit> for ProposedEdit {
    type Error = CoreError;

    fn try_from(row: SongEdit) -> Result<Self, Self::Error> {
        let status = row.status()?;
        Ok(ProposedEdit {
            id: row.id,
            document_id: row.song_id,
            base_version_id: row.base_version_id,
            diff: row.diff.0,
            proposer_id: row.proposer_id,
            status,
            moderator_id: row.moderator_id,
            decided_at: row.decided_at,
            rejection_reason: row.rejection_reason,
            result_version_id: row.result_version_id,
            submitted_at: row.submitted_at,
        })
    }
}

/// DTO for proposing an edit.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSongEdit {
    pub song_id: DbId,
    pub base_version_id: DbId,
    pub diff: DiffPayload,
    pub proposer_id: DbId,
}


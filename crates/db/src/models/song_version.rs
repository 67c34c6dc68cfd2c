//! Song version model.
//!
//! Versions are immutable snapshots of a song body, created once when the
//! song is created and once per approved edit.

use serde::Serialize;
use songbook_core::document::Version;
use songbook_core::types::{DbId, Revision, Timestamp};
use sqlx::FromRow;

/// A row from the `song_versions` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SongVersion {
    pub id: DbId,
    pub song_id: DbId,
    pub revision: Revision,
    pub body: String,
    pub body_hash: String,
    pub author_id: DbId,
    pub created_at: Timestamp,
}

impl From<SongVersion> for Version {
    fn from(row: SongVersion) -> Self {
        Version {
            id: row.id,
            document_id: row.song_id,
            revision: row.revision,
            text: row.body,
            text_hash: row.body_hash,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

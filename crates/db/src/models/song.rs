//! Song model. A song is the versioned document; its text lives in
//! `song_versions` and `current_version_id` points at the latest revision.

use serde::Serialize;
use songbook_core::document::Document;
use songbook_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `songs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Song {
    pub id: DbId,
    pub group_id: DbId,
    pub title: String,
    pub artist: Option<String>,
    pub arrangement: String,
    pub author_id: DbId,
    pub current_version_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Song> for Document {
    fn from(song: Song) -> Self {
        Document {
            id: song.id,
            group_id: song.group_id,
            title: song.title,
            artist: song.artist,
            arrangement: song.arrangement,
            author_id: song.author_id,
            current_version_id: song.current_version_id,
            created_at: song.created_at,
        }
    }
}

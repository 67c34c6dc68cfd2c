//! Songbook and songbook entry models.

use serde::{Deserialize, Serialize};
use songbook_core::types::{DbId, Revision, Timestamp};
use sqlx::FromRow;

/// A row from the `songbooks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Songbook {
    pub id: DbId,
    pub group_id: DbId,
    pub name: String,
    pub revision: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `songbook_entries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SongbookEntry {
    pub id: DbId,
    pub songbook_id: DbId,
    pub song_id: DbId,
    pub position: i32,
    pub created_at: Timestamp,
}

/// DTO for creating a new songbook.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSongbook {
    pub group_id: DbId,
    pub name: String,
}

/// One song of a compiled songbook, at its current revision.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CompiledSong {
    pub position: i32,
    pub song_id: DbId,
    pub title: String,
    pub artist: Option<String>,
    pub arrangement: String,
    pub revision: Revision,
    pub body: String,
}

/// A songbook with the current text of every entry, in entry order.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledSongbook {
    pub songbook: Songbook,
    pub songs: Vec<CompiledSong>,
}

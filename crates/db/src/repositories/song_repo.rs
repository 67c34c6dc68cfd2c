//! Repository for the `songs` table.
//!
//! Creating a song also creates its revision-1 version in the same
//! transaction.

use songbook_core::document::{NewDocument, INITIAL_REVISION};
use songbook_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::error::DbError;
use crate::models::song::Song;
use crate::models::song_version::SongVersion;
use crate::repositories::group_repo::GroupRepo;
use crate::repositories::song_version_repo::SongVersionRepo;

/// Column list for songs queries.
const COLUMNS: &str = "id, group_id, title, artist, arrangement, author_id, \
    current_version_id, created_at, updated_at";

/// Provides CRUD operations for songs.
pub struct SongRepo;

impl SongRepo {
    /// Create a song and its first version.
    pub async fn create(pool: &PgPool, input: &NewDocument) -> Result<Song, DbError> {
        input.check()?;
        if GroupRepo::find_by_id(pool, input.group_id).await?.is_none() {
            return Err(DbError::not_found("Group", input.group_id));
        }

        let mut tx = pool.begin().await?;

        let (song_id,): (DbId,) = sqlx::query_as(
            "INSERT INTO songs (group_id, title, artist, arrangement, author_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(input.group_id)
        .bind(&input.title)
        .bind(&input.artist)
        .bind(input.arrangement_name())
        .bind(input.author_id)
        .fetch_one(&mut *tx)
        .await?;

        let version = SongVersionRepo::insert(
            &mut tx,
            song_id,
            INITIAL_REVISION,
            &input.initial_text,
            input.author_id,
        )
        .await?;

        let song = Self::set_current_version(&mut tx, song_id, version.id).await?;

        tx.commit().await?;
        tracing::info!(song_id, group_id = song.group_id, "Song created");
        Ok(song)
    }

    /// Point a song at a new current version. Callers hold the row lock.
    pub(crate) async fn set_current_version(
        conn: &mut PgConnection,
        song_id: DbId,
        version_id: DbId,
    ) -> Result<Song, sqlx::Error> {
        let query = format!(
            "UPDATE songs SET current_version_id = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Song>(&query)
            .bind(song_id)
            .bind(version_id)
            .fetch_one(conn)
            .await
    }

    /// Lock a song row for the rest of the transaction and return its
    /// current version id. `None` if the song does not exist.
    ///
    /// `FOR NO KEY UPDATE` still serializes moderators but does not block
    /// inserts that only reference the song, such as new proposals.
    pub(crate) async fn lock_for_update(
        conn: &mut PgConnection,
        song_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        let query = "SELECT current_version_id FROM songs WHERE id = $1 FOR NO KEY UPDATE";
        let row: Option<(DbId,)> = sqlx::query_as(query)
            .bind(song_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Find a song by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Song>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM songs WHERE id = $1");
        sqlx::query_as::<_, Song>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a song, failing with `NotFound` if it does not exist.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Song, DbError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))
    }

    /// List the songs of a group, alphabetically by title.
    pub async fn list_for_group(pool: &PgPool, group_id: DbId) -> Result<Vec<Song>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM songs
             WHERE group_id = $1
             ORDER BY title ASC, id ASC"
        );
        sqlx::query_as::<_, Song>(&query)
            .bind(group_id)
            .fetch_all(pool)
            .await
    }

    /// The version the song currently points at.
    pub async fn current_version(pool: &PgPool, song_id: DbId) -> Result<SongVersion, DbError> {
        let song = Self::get(pool, song_id).await?;
        SongVersionRepo::find_by_id(pool, song.current_version_id)
            .await?
            .ok_or_else(|| DbError::not_found("Version", song.current_version_id))
    }
}

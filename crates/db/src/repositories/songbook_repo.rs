//! Repository for the `songbooks` and `songbook_entries` tables.
//!
//! Entry changes lock the songbook row so positions stay dense and every
//! change bumps the revision exactly once.

use songbook_core::error::CoreError;
use songbook_core::songbook::validate_songbook_name;
use songbook_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::error::{classify_unique_violation, DbError};
use crate::models::songbook::{
    CompiledSong, CompiledSongbook, CreateSongbook, Songbook, SongbookEntry,
};
use crate::repositories::group_repo::GroupRepo;
use crate::repositories::song_repo::SongRepo;

/// Column list for songbooks queries.
const COLUMNS: &str = "id, group_id, name, revision, created_at, updated_at";

/// Column list for songbook_entries queries.
const ENTRY_COLUMNS: &str = "id, songbook_id, song_id, position, created_at";

/// Provides songbook CRUD, entry management and compilation.
pub struct SongbookRepo;

impl SongbookRepo {
    /// Create a songbook. Duplicate names within a group fail with `Conflict`.
    pub async fn create(pool: &PgPool, input: &CreateSongbook) -> Result<Songbook, DbError> {
        validate_songbook_name(&input.name)?;
        if GroupRepo::find_by_id(pool, input.group_id).await?.is_none() {
            return Err(DbError::not_found("Group", input.group_id));
        }
        let query = format!(
            "INSERT INTO songbooks (group_id, name)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        let songbook = sqlx::query_as::<_, Songbook>(&query)
            .bind(input.group_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
            .map_err(classify_unique_violation)?;
        tracing::info!(
            songbook_id = songbook.id,
            group_id = songbook.group_id,
            "Songbook created",
        );
        Ok(songbook)
    }

    /// Find a songbook by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Songbook>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM songbooks WHERE id = $1");
        sqlx::query_as::<_, Songbook>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a songbook, failing with `NotFound` if it does not exist.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Songbook, DbError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Songbook", id))
    }

    /// List the songbooks of a group by name.
    pub async fn list_for_group(
        pool: &PgPool,
        group_id: DbId,
    ) -> Result<Vec<Songbook>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM songbooks
             WHERE group_id = $1
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, Songbook>(&query)
            .bind(group_id)
            .fetch_all(pool)
            .await
    }

    /// Append a song at the end of a songbook.
    ///
    /// The song must belong to the songbook's group and may appear only once.
    pub async fn add_entry(
        pool: &PgPool,
        songbook_id: DbId,
        song_id: DbId,
    ) -> Result<SongbookEntry, DbError> {
        let song = SongRepo::get(pool, song_id).await?;

        let mut tx = pool.begin().await?;
        let group_id = Self::lock_for_update(&mut tx, songbook_id).await?;
        if song.group_id != group_id {
            return Err(CoreError::Validation(format!(
                "Song {song_id} does not belong to the songbook's group"
            ))
            .into());
        }

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM songbook_entries WHERE songbook_id = $1")
                .bind(songbook_id)
                .fetch_one(&mut *tx)
                .await?;
        let position = i32::try_from(count)
            .map_err(|_| CoreError::Internal(format!("songbook {songbook_id} is too large")))?;

        let query = format!(
            "INSERT INTO songbook_entries (songbook_id, song_id, position)
             VALUES ($1, $2, $3)
             RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, SongbookEntry>(&query)
            .bind(songbook_id)
            .bind(song_id)
            .bind(position)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_unique_violation)?;

        Self::bump_revision(&mut tx, songbook_id).await?;
        tx.commit().await?;
        tracing::info!(songbook_id, song_id, position, "Songbook entry added");
        Ok(entry)
    }

    /// Remove a song from a songbook and close the gap it leaves.
    pub async fn remove_entry(
        pool: &PgPool,
        songbook_id: DbId,
        song_id: DbId,
    ) -> Result<Songbook, DbError> {
        let mut tx = pool.begin().await?;
        Self::lock_for_update(&mut tx, songbook_id).await?;

        let removed: Option<(i32,)> = sqlx::query_as(
            "DELETE FROM songbook_entries
             WHERE songbook_id = $1 AND song_id = $2
             RETURNING position",
        )
        .bind(songbook_id)
        .bind(song_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (position,) = removed.ok_or_else(|| DbError::not_found("SongbookEntry", song_id))?;

        sqlx::query(
            "UPDATE songbook_entries SET position = position - 1
             WHERE songbook_id = $1 AND position > $2",
        )
        .bind(songbook_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        let songbook = Self::bump_revision(&mut tx, songbook_id).await?;
        tx.commit().await?;
        tracing::info!(songbook_id, song_id, position, "Songbook entry removed");
        Ok(songbook)
    }

    /// Entries of a songbook in position order.
    pub async fn list_entries(
        pool: &PgPool,
        songbook_id: DbId,
    ) -> Result<Vec<SongbookEntry>, DbError> {
        Self::get(pool, songbook_id).await?;
        let query = format!(
            "SELECT {ENTRY_COLUMNS} FROM songbook_entries
             WHERE songbook_id = $1
             ORDER BY position ASC"
        );
        Ok(sqlx::query_as::<_, SongbookEntry>(&query)
            .bind(songbook_id)
            .fetch_all(pool)
            .await?)
    }

    /// The songbook together with the current text of each song, in order.
    pub async fn compile(pool: &PgPool, songbook_id: DbId) -> Result<CompiledSongbook, DbError> {
        let songbook = Self::get(pool, songbook_id).await?;
        let songs = sqlx::query_as::<_, CompiledSong>(
            "SELECT e.position, s.id AS song_id, s.title, s.artist, s.arrangement,
                    v.revision, v.body
             FROM songbook_entries e
             JOIN songs s ON s.id = e.song_id
             JOIN song_versions v ON v.id = s.current_version_id
             WHERE e.songbook_id = $1
             ORDER BY e.position ASC",
        )
        .bind(songbook_id)
        .fetch_all(pool)
        .await?;
        tracing::debug!(songbook_id, songs = songs.len(), "Songbook compiled");
        Ok(CompiledSongbook { songbook, songs })
    }

    /// Lock a songbook row and return its group id.
    async fn lock_for_update(conn: &mut PgConnection, songbook_id: DbId) -> Result<DbId, DbError> {
        let row: Option<(DbId,)> =
            sqlx::query_as("SELECT group_id FROM songbooks WHERE id = $1 FOR NO KEY UPDATE")
                .bind(songbook_id)
                .fetch_optional(conn)
                .await?;
        row.map(|(group_id,)| group_id)
            .ok_or_else(|| DbError::not_found("Songbook", songbook_id))
    }

    async fn bump_revision(
        conn: &mut PgConnection,
        songbook_id: DbId,
    ) -> Result<Songbook, DbError> {
        let query = format!(
            "UPDATE songbooks SET revision = revision + 1
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Songbook>(&query)
            .bind(songbook_id)
            .fetch_one(conn)
            .await?)
    }
}

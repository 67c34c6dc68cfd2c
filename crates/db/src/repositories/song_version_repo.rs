//! Repository for the `song_versions` table.
//!
//! Versions are insert-only. New rows come from [`SongRepo::create`] and
//! [`SongEditRepo::approve`], both inside the transaction that also moves
//! the song's `current_version_id`.
//!
//! [`SongRepo::create`]: crate::repositories::SongRepo::create
//! [`SongEditRepo::approve`]: crate::repositories::SongEditRepo::approve

use songbook_core::diff::{compute_line_diff, DiffLine};
use songbook_core::hashing::text_hash;
use songbook_core::types::{DbId, Revision};
use sqlx::{PgConnection, PgPool};

use crate::error::DbError;
use crate::models::song_version::SongVersion;
use crate::repositories::song_repo::SongRepo;

/// Column list for song_versions queries.
const COLUMNS: &str = "id, song_id, revision, body, body_hash, author_id, created_at";

/// Provides read and insert operations for song versions.
pub struct SongVersionRepo;

impl SongVersionRepo {
    /// Insert a version snapshot. Callers hold the song row lock.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        song_id: DbId,
        revision: Revision,
        body: &str,
        author_id: DbId,
    ) -> Result<SongVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO song_versions (song_id, revision, body, body_hash, author_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SongVersion>(&query)
            .bind(song_id)
            .bind(revision)
            .bind(body)
            .bind(text_hash(body))
            .bind(author_id)
            .fetch_one(conn)
            .await
    }

    /// Find a version by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SongVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM song_versions WHERE id = $1");
        sqlx::query_as::<_, SongVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a version by ID on an existing connection (used under row locks).
    pub(crate) async fn find_by_id_on(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<SongVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM song_versions WHERE id = $1");
        sqlx::query_as::<_, SongVersion>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Find a specific revision of a song.
    pub async fn find_by_song_and_revision(
        pool: &PgPool,
        song_id: DbId,
        revision: Revision,
    ) -> Result<Option<SongVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM song_versions
             WHERE song_id = $1 AND revision = $2"
        );
        sqlx::query_as::<_, SongVersion>(&query)
            .bind(song_id)
            .bind(revision)
            .fetch_optional(pool)
            .await
    }

    /// List all versions of a song, oldest first.
    pub async fn list_by_song(
        pool: &PgPool,
        song_id: DbId,
    ) -> Result<Vec<SongVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM song_versions
             WHERE song_id = $1
             ORDER BY revision ASC"
        );
        sqlx::query_as::<_, SongVersion>(&query)
            .bind(song_id)
            .fetch_all(pool)
            .await
    }

    /// Full history of a song, oldest first. Fails if the song is unknown.
    pub async fn history(pool: &PgPool, song_id: DbId) -> Result<Vec<SongVersion>, DbError> {
        SongRepo::get(pool, song_id).await?;
        Ok(Self::list_by_song(pool, song_id).await?)
    }

    /// Fetch one revision, failing with `NotFound` if it does not exist.
    pub async fn get_revision(
        pool: &PgPool,
        song_id: DbId,
        revision: Revision,
    ) -> Result<SongVersion, DbError> {
        SongRepo::get(pool, song_id).await?;
        Self::find_by_song_and_revision(pool, song_id, revision)
            .await?
            .ok_or_else(|| DbError::not_found("Revision", DbId::from(revision)))
    }

    /// Line-by-line comparison of two revisions of a song.
    pub async fn compare_revisions(
        pool: &PgPool,
        song_id: DbId,
        from: Revision,
        to: Revision,
    ) -> Result<Vec<DiffLine>, DbError> {
        let old = Self::get_revision(pool, song_id, from).await?;
        let new = Self::get_revision(pool, song_id, to).await?;
        Ok(compute_line_diff(&old.body, &new.body))
    }
}

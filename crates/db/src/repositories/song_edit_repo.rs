//! Repository for the `song_edits` table: the edit queue and the approval
//! workflow.
//!
//! Proposals are plain inserts and take no lock. Approval and rejection run
//! in one transaction that first locks the song row (`FOR NO KEY UPDATE`), then
//! re-reads the edit under that lock, so two moderators can never both see
//! the same current version and each append a revision. If anything fails,
//! the transaction is dropped and rolled back: no version without a moved
//! pointer, no resolved edit without its version.

use chrono::Utc;
use songbook_core::diff::compute_diff;
use songbook_core::edit::{self, EditStatus, ProposedEdit};
use songbook_core::error::CoreError;
use songbook_core::types::{DbId, Revision};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::error::DbError;
use crate::models::song_edit::{CreateSongEdit, SongEdit};
use crate::models::song_version::SongVersion;
use crate::repositories::song_repo::SongRepo;
use crate::repositories::song_version_repo::SongVersionRepo;

/// Column list for song_edits queries.
const COLUMNS: &str = "id, song_id, base_version_id, diff, proposer_id, status_id, \
    moderator_id, decided_at, rejection_reason, result_version_id, submitted_at";

/// Provides the edit queue and moderation operations.
pub struct SongEditRepo;

impl SongEditRepo {
    // -----------------------------------------------------------------------
    // Edit queue
    // -----------------------------------------------------------------------

    /// Record a pending edit against `base_version_id`.
    ///
    /// Fails with `NotFound` if the song or base version is unknown (a
    /// version of another song counts as unknown) and with `Validation` if
    /// the diff was not computed against that version's text.
    pub async fn propose(pool: &PgPool, input: &CreateSongEdit) -> Result<SongEdit, DbError> {
        SongRepo::get(pool, input.song_id).await?;
        let base = SongVersionRepo::find_by_id(pool, input.base_version_id)
            .await?
            .filter(|v| v.song_id == input.song_id)
            .ok_or_else(|| DbError::not_found("Version", input.base_version_id))?;

        edit::check_proposal(&base.body, &input.diff)?;

        let query = format!(
            "INSERT INTO song_edits (song_id, base_version_id, diff, proposer_id, status_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SongEdit>(&query)
            .bind(input.song_id)
            .bind(input.base_version_id)
            .bind(Json(&input.diff))
            .bind(input.proposer_id)
            .bind(EditStatus::Pending.id())
            .fetch_one(pool)
            .await?;

        let summary = input.diff.summary();
        tracing::info!(
            edit_id = row.id,
            song_id = row.song_id,
            base_version_id = row.base_version_id,
            proposer_id = row.proposer_id,
            lines_added = summary.lines_added,
            lines_removed = summary.lines_removed,
            "Edit proposed",
        );
        Ok(row)
    }

    /// Queue an edit that restores the body of an earlier revision.
    pub async fn propose_revert(
        pool: &PgPool,
        song_id: DbId,
        target_revision: Revision,
        proposer_id: DbId,
    ) -> Result<SongEdit, DbError> {
        let current = SongRepo::current_version(pool, song_id).await?;
        let target = SongVersionRepo::get_revision(pool, song_id, target_revision).await?;
        if current.body_hash == target.body_hash {
            return Err(CoreError::Validation(format!(
                "Revision {target_revision} already matches the current text"
            ))
            .into());
        }
        let input = CreateSongEdit {
            song_id,
            base_version_id: current.id,
            diff: compute_diff(&current.body, &target.body),
            proposer_id,
        };
        Self::propose(pool, &input).await
    }

    /// Find an edit by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SongEdit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM song_edits WHERE id = $1");
        sqlx::query_as::<_, SongEdit>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch an edit, failing with `NotFound` if it does not exist.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<SongEdit, DbError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("ProposedEdit", id))
    }

    /// Pending edits for a song, oldest submission first.
    pub async fn list_pending(pool: &PgPool, song_id: DbId) -> Result<Vec<SongEdit>, DbError> {
        SongRepo::get(pool, song_id).await?;
        let query = format!(
            "SELECT {COLUMNS} FROM song_edits
             WHERE song_id = $1 AND status_id = $2
             ORDER BY submitted_at ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, SongEdit>(&query)
            .bind(song_id)
            .bind(EditStatus::Pending.id())
            .fetch_all(pool)
            .await?)
    }

    /// Every edit ever proposed for a song, oldest submission first.
    pub async fn list_edits(pool: &PgPool, song_id: DbId) -> Result<Vec<SongEdit>, DbError> {
        SongRepo::get(pool, song_id).await?;
        let query = format!(
            "SELECT {COLUMNS} FROM song_edits
             WHERE song_id = $1
             ORDER BY submitted_at ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, SongEdit>(&query)
            .bind(song_id)
            .fetch_all(pool)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Approval workflow
    // -----------------------------------------------------------------------

    /// Approve a pending edit, creating the song's next revision.
    ///
    /// If the song moved past the edit's base, the diff is applied to the
    /// current body instead; a content-hash mismatch fails with `Conflict`
    /// and leaves the edit pending.
    pub async fn approve(
        pool: &PgPool,
        edit_id: DbId,
        moderator_id: DbId,
    ) -> Result<SongVersion, DbError> {
        let song_id = Self::get(pool, edit_id).await?.song_id;

        let mut tx = pool.begin().await?;
        let current_version_id = SongRepo::lock_for_update(&mut tx, song_id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", song_id))?;
        let proposal = Self::lock_pending(&mut tx, edit_id).await?;

        let current = SongVersionRepo::find_by_id_on(&mut tx, current_version_id)
            .await?
            .ok_or_else(|| DbError::not_found("Version", current_version_id))?;
        let body = edit::rebase_onto(&proposal, &current.clone().into()).inspect_err(|err| {
            tracing::warn!(edit_id, song_id, error = %err, "Edit approval failed");
        })?;

        let version = SongVersionRepo::insert(
            &mut tx,
            song_id,
            current.revision + 1,
            &body,
            proposal.proposer_id,
        )
        .await?;

        let query = "UPDATE song_edits SET
                status_id = $2,
                moderator_id = $3,
                decided_at = $4,
                result_version_id = $5
             WHERE id = $1";
        sqlx::query(query)
            .bind(edit_id)
            .bind(EditStatus::Approved.id())
            .bind(moderator_id)
            .bind(version.created_at)
            .bind(version.id)
            .execute(&mut *tx)
            .await?;

        SongRepo::set_current_version(&mut tx, song_id, version.id).await?;

        tx.commit().await?;
        tracing::info!(
            edit_id,
            song_id,
            moderator_id,
            revision = version.revision,
            "Edit approved",
        );
        Ok(version)
    }

    /// Reject a pending edit. No version is created.
    pub async fn reject(
        pool: &PgPool,
        edit_id: DbId,
        moderator_id: DbId,
        reason: &str,
    ) -> Result<SongEdit, DbError> {
        let song_id = Self::get(pool, edit_id).await?.song_id;

        let mut tx = pool.begin().await?;
        SongRepo::lock_for_update(&mut tx, song_id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", song_id))?;
        Self::lock_pending(&mut tx, edit_id).await?;
        edit::validate_rejection_reason(reason)?;

        let query = format!(
            "UPDATE song_edits SET
                status_id = $2,
                moderator_id = $3,
                decided_at = $4,
                rejection_reason = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SongEdit>(&query)
            .bind(edit_id)
            .bind(EditStatus::Rejected.id())
            .bind(moderator_id)
            .bind(Utc::now())
            .bind(reason.trim())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(edit_id, song_id, moderator_id, "Edit rejected");
        Ok(row)
    }

    /// Lock an edit row and ensure it is still pending.
    async fn lock_pending(conn: &mut PgConnection, edit_id: DbId) -> Result<ProposedEdit, DbError> {
        let query = format!("SELECT {COLUMNS} FROM song_edits WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, SongEdit>(&query)
            .bind(edit_id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| DbError::not_found("ProposedEdit", edit_id))?;
        let proposal = ProposedEdit::try_from(row)?;
        edit::ensure_pending(edit_id, proposal.status)?;
        Ok(proposal)
    }
}

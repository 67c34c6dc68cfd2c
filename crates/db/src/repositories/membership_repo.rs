//! Repository for the `memberships` table.
//!
//! Also serves as the role lookup used to authorize moderators before they
//! approve or reject edits.

use songbook_core::error::CoreError;
use songbook_core::roles::{can_moderate, validate_role, ROLE_DEFAULT};
use songbook_core::types::DbId;
use sqlx::PgPool;

use crate::error::{classify_unique_violation, DbError};
use crate::models::membership::{CreateMembership, Membership};
use crate::repositories::group_repo::GroupRepo;

/// Column list for memberships queries.
const COLUMNS: &str = "id, user_id, group_id, role, created_at, updated_at";

/// Provides membership management and role lookups.
pub struct MembershipRepo;

impl MembershipRepo {
    /// Add a user to a group. A second membership for the same pair fails
    /// with `Conflict`, an unknown group with `NotFound`.
    pub async fn add(pool: &PgPool, input: &CreateMembership) -> Result<Membership, DbError> {
        let role = input.role.as_deref().unwrap_or(ROLE_DEFAULT);
        validate_role(role)?;
        if GroupRepo::find_by_id(pool, input.group_id).await?.is_none() {
            return Err(DbError::not_found("Group", input.group_id));
        }
        let query = format!(
            "INSERT INTO memberships (user_id, group_id, role)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Membership>(&query)
            .bind(input.user_id)
            .bind(input.group_id)
            .bind(role)
            .fetch_one(pool)
            .await
            .map_err(classify_unique_violation)
    }

    /// Change a member's role. Returns `None` if the user is not a member.
    pub async fn set_role(
        pool: &PgPool,
        user_id: DbId,
        group_id: DbId,
        role: &str,
    ) -> Result<Option<Membership>, DbError> {
        validate_role(role)?;
        let query = format!(
            "UPDATE memberships SET role = $3
             WHERE user_id = $1 AND group_id = $2
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Membership>(&query)
            .bind(user_id)
            .bind(group_id)
            .bind(role)
            .fetch_optional(pool)
            .await?)
    }

    /// Remove a user from a group. Returns `true` if a row was deleted.
    pub async fn remove(pool: &PgPool, user_id: DbId, group_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memberships WHERE user_id = $1 AND group_id = $2")
            .bind(user_id)
            .bind(group_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the members of a group, oldest membership first.
    pub async fn list_for_group(
        pool: &PgPool,
        group_id: DbId,
    ) -> Result<Vec<Membership>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM memberships
             WHERE group_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Membership>(&query)
            .bind(group_id)
            .fetch_all(pool)
            .await
    }

    /// The user's role in a group, or `None` if they are not a member.
    pub async fn role_of(
        pool: &PgPool,
        user_id: DbId,
        group_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT role FROM memberships WHERE user_id = $1 AND group_id = $2")
                .bind(user_id)
                .bind(group_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(role,)| role))
    }

    /// Fail with `Forbidden` unless the user may moderate edits in the group.
    pub async fn require_moderator(
        pool: &PgPool,
        user_id: DbId,
        group_id: DbId,
    ) -> Result<(), DbError> {
        match Self::role_of(pool, user_id, group_id).await? {
            Some(role) if can_moderate(&role) => Ok(()),
            Some(role) => Err(CoreError::Forbidden(format!(
                "user {user_id} has role '{role}' in group {group_id} and cannot moderate"
            ))
            .into()),
            None => Err(CoreError::Forbidden(format!(
                "user {user_id} is not a member of group {group_id}"
            ))
            .into()),
        }
    }
}

//! Repository for the `groups` table.

use songbook_core::songbook::validate_group_name;
use songbook_core::types::DbId;
use sqlx::PgPool;

use crate::error::{classify_unique_violation, DbError};
use crate::models::group::{CreateGroup, Group};

/// Column list for groups queries.
const COLUMNS: &str = "id, name, created_at, updated_at";

/// Provides CRUD operations for groups.
pub struct GroupRepo;

impl GroupRepo {
    /// Create a group. Duplicate names fail with `Conflict`.
    pub async fn create(pool: &PgPool, input: &CreateGroup) -> Result<Group, DbError> {
        validate_group_name(&input.name)?;
        let query = format!("INSERT INTO groups (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Group>(&query)
            .bind(&input.name)
            .fetch_one(pool)
            .await
            .map_err(classify_unique_violation)
    }

    /// Find a group by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Group>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM groups WHERE id = $1");
        sqlx::query_as::<_, Group>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a group by its unique name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Group>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM groups WHERE name = $1");
        sqlx::query_as::<_, Group>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// List all groups, ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Group>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM groups ORDER BY name ASC");
        sqlx::query_as::<_, Group>(&query).fetch_all(pool).await
    }
}

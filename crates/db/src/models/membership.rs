//! Group membership model (who belongs to a group, and with which role).

use serde::{Deserialize, Serialize};
use songbook_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `memberships` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Membership {
    pub id: DbId,
    pub user_id: DbId,
    pub group_id: DbId,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for adding a user to a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMembership {
    pub user_id: DbId,
    pub group_id: DbId,
    /// Defaults to `default` if `None`.
    pub role: Option<String>,
}

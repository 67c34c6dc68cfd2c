//! Group model. Groups own songs, songbooks and memberships.

use serde::{Deserialize, Serialize};
use songbook_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub name: String,
}

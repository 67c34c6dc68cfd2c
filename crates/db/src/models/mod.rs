//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the `Deserialize` input DTOs used for inserts.

pub mod group;
pub mod membership;
pub mod song;
pub mod song_edit;
pub mod song_version;
pub mod songbook;

/// Surrogate keys for every stored record (PostgreSQL `BIGSERIAL`).
pub type DbId = i64;

/// Per-document revision counter. Revision 1 is the text a song was created with.
pub type Revision = i32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

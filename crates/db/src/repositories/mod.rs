//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods that take a
//! `&PgPool`. Operations that must be atomic open their own transaction and
//! share helpers taking `&mut PgConnection`.

pub mod group_repo;
pub mod membership_repo;
pub mod song_edit_repo;
pub mod song_repo;
pub mod song_version_repo;
pub mod songbook_repo;

pub use group_repo::GroupRepo;
pub use membership_repo::MembershipRepo;
pub use song_edit_repo::SongEditRepo;
pub use song_repo::SongRepo;
pub use song_version_repo::SongVersionRepo;
pub use songbook_repo::SongbookRepo;

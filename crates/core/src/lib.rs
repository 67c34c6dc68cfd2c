//! Domain logic for the songbook revision store.
//!
//! Everything here is free of I/O: the diff/merge engine, validation, the
//! moderation state machine, and [`store::MemoryStore`], an in-process
//! implementation of the full document/edit workflow. The `songbook-db`
//! crate persists the same workflow in PostgreSQL on top of these functions.

pub mod diff;
pub mod document;
pub mod edit;
pub mod error;
pub mod hashing;
pub mod roles;
pub mod songbook;
pub mod store;
pub mod types;

//! # murmur-store
//!
//! SQLite persistence for the Murmur whisper board.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus the matching engine's candidate query and sampling stage.
//! Counter updates (`points`, `report_count`, `reply_count`) are single
//! increment-in-place statements, never read-modify-write.

pub mod database;
pub mod identities;
pub mod matching;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod replies;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use matching::pick_from_pool;
pub use models::*;

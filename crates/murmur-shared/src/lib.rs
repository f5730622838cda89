//! # murmur-shared
//!
//! Vocabulary types and pure policies shared across the Murmur workspace:
//! access keys, rooms, statuses, the moderation denylist, and the
//! light-point reward table. Everything here is storage- and
//! transport-agnostic.

pub mod access_key;
pub mod constants;
pub mod error;
pub mod moderation;
pub mod rewards;
pub mod types;

pub use access_key::AccessKey;
pub use error::{KeyError, LabelError};
pub use types::{PostId, PostStatus, ReplyId, ReplyStatus, Room};

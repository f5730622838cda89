//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the API layer; the server is responsible for stripping
//! identity fields before anything reaches a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use murmur_shared::{AccessKey, PostId, PostStatus, ReplyId, ReplyStatus, Room};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An anonymous identity, keyed by its opaque access key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// The canonical access key. Immutable once created.
    pub key: AccessKey,
    /// Light points earned by participating. Monotone non-decreasing.
    pub points: i64,
    /// One-way ban flag. A banned identity still resolves; mutating
    /// endpoints shadow it instead.
    pub banned: bool,
    /// When this identity was first seen.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post (whisper)
// ---------------------------------------------------------------------------

/// A whisper: a short anonymous text entry with a mood and a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    /// Short free-form mood label ("tired", "hopeful", ...).
    pub mood: String,
    pub body: String,
    /// Always a validated room; unknown input was coerced at the edge.
    pub room: Room,
    /// The author's access key. A reference, not an ownership edge.
    pub author_key: AccessKey,
    pub status: PostStatus,
    pub report_count: i64,
    /// Count of replies ever created against this post. Not decremented
    /// when a reply is hidden or deleted; it only throttles matching.
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Build a fresh, active whisper with a new id and the current time.
    pub fn new(mood: String, body: String, room: Room, author_key: AccessKey) -> Self {
        Self {
            id: PostId::new(),
            mood,
            body,
            room,
            author_key,
            status: PostStatus::Active,
            report_count: 0,
            reply_count: 0,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A reply to a whisper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub id: ReplyId,
    pub post_id: PostId,
    pub body: String,
    pub responder_key: AccessKey,
    /// True iff the responder is the parent post's author. Computed at
    /// creation time and never recomputed.
    pub is_author_reply: bool,
    pub status: ReplyStatus,
    pub report_count: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Store stats (admin dashboard)
// ---------------------------------------------------------------------------

/// Aggregate counters surfaced on the admin status endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub identities: i64,
    pub posts: i64,
    pub replies: i64,
    pub hidden_posts: i64,
}

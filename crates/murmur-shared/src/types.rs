use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LabelError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReplyId(pub Uuid);

impl ReplyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReplyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReplyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of rooms a whisper can be posted into.
///
/// Any label outside this set silently maps to [`Room::General`]; posting
/// never fails on an unknown room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    General,
    Love,
    Work,
    Family,
    School,
    Money,
}

impl Room {
    pub const ALL: [Room; 6] = [
        Room::General,
        Room::Love,
        Room::Work,
        Room::Family,
        Room::School,
        Room::Money,
    ];

    /// Map a raw label to a room, coercing anything unrecognized to
    /// [`Room::General`]. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "love" => Room::Love,
            "work" => Room::Work,
            "family" => Room::Family,
            "school" => Room::School,
            "money" => Room::Money,
            _ => Room::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Room::General => "general",
            Room::Love => "love",
            Room::Work => "work",
            Room::Family => "family",
            Room::School => "school",
            Room::Money => "money",
        }
    }
}

impl Default for Room {
    fn default() -> Self {
        Room::General
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a whisper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Hidden,
    Deleted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Hidden => "hidden",
            PostStatus::Deleted => "deleted",
        }
    }

    pub fn from_label(label: &str) -> Result<Self, LabelError> {
        match label {
            "active" => Ok(PostStatus::Active),
            "hidden" => Ok(PostStatus::Hidden),
            "deleted" => Ok(PostStatus::Deleted),
            other => Err(LabelError::Unknown(other.to_string())),
        }
    }
}

/// Lifecycle state of a reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Visible,
    Hidden,
    Deleted,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Visible => "visible",
            ReplyStatus::Hidden => "hidden",
            ReplyStatus::Deleted => "deleted",
        }
    }

    pub fn from_label(label: &str) -> Result<Self, LabelError> {
        match label {
            "visible" => Ok(ReplyStatus::Visible),
            "hidden" => Ok(ReplyStatus::Hidden),
            "deleted" => Ok(ReplyStatus::Deleted),
            other => Err(LabelError::Unknown(other.to_string())),
        }
    }
}

/// Application name
pub const APP_NAME: &str = "Murmur";

/// Size of the matching pool: candidates are ordered loneliest-first and the
/// top slice of this size is sampled uniformly. Fixed, not configurable.
pub const MATCH_POOL_SIZE: usize = 50;

/// Number of reports at which an entity is hidden.
pub const REPORT_HIDE_THRESHOLD: i64 = 3;

/// Maximum length of a mood label in characters
pub const MAX_MOOD_LEN: usize = 24;

/// Maximum length of a whisper body in characters
pub const MAX_BODY_LEN: usize = 500;

/// Maximum length of a reply body in characters
pub const MAX_REPLY_LEN: usize = 500;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `identities`, `posts`, and `replies`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Identities
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS identities (
    key        TEXT PRIMARY KEY NOT NULL,   -- canonical access key (WSP-XXXX-XXXX-XXXX)
    points     INTEGER NOT NULL DEFAULT 0,  -- light points, monotone non-decreasing
    banned     INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1, one-way 0 -> 1
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Posts (whispers)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id           TEXT PRIMARY KEY NOT NULL, -- UUID v4
    mood         TEXT NOT NULL,             -- short free-form label
    body         TEXT NOT NULL,
    room         TEXT NOT NULL,             -- validated room label
    author_key   TEXT NOT NULL,             -- FK -> identities(key)
    status       TEXT NOT NULL DEFAULT 'active',   -- active | hidden | deleted
    report_count INTEGER NOT NULL DEFAULT 0,
    reply_count  INTEGER NOT NULL DEFAULT 0,       -- replies ever created, never decremented
    created_at   TEXT NOT NULL,

    FOREIGN KEY (author_key) REFERENCES identities(key)
);

-- Covers the matching query: status + room filter, ordered by reply_count.
CREATE INDEX IF NOT EXISTS idx_posts_match
    ON posts(status, room, reply_count);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_key);

-- ----------------------------------------------------------------
-- Replies
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS replies (
    id              TEXT PRIMARY KEY NOT NULL, -- UUID v4
    post_id         TEXT NOT NULL,             -- FK -> posts(id)
    body            TEXT NOT NULL,
    responder_key   TEXT NOT NULL,             -- FK -> identities(key)
    is_author_reply INTEGER NOT NULL DEFAULT 0,  -- responder == post author, fixed at creation
    status          TEXT NOT NULL DEFAULT 'visible', -- visible | hidden | deleted
    report_count    INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (responder_key) REFERENCES identities(key)
);

CREATE INDEX IF NOT EXISTS idx_replies_post
    ON replies(post_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

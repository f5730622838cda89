//! CRUD and moderation operations for [`Post`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use murmur_shared::constants::REPORT_HIDE_THRESHOLD;
use murmur_shared::rewards::{point_value, PointAction};
use murmur_shared::{AccessKey, PostId, PostStatus, Room};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Post, StoreStats};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new whisper and award the author's creation points in the
    /// same transaction, so a failed insert awards nothing.
    pub fn create_post(&mut self, post: &Post) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO posts
                 (id, mood, body, room, author_key, status, report_count, reply_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                post.id.to_string(),
                post.mood,
                post.body,
                post.room.as_str(),
                post.author_key.as_str(),
                post.status.as_str(),
                post.report_count,
                post.reply_count,
                post.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE identities SET points = points + ?1 WHERE key = ?2",
            params![
                point_value(PointAction::PostCreated),
                post.author_key.as_str()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single whisper by id.
    pub fn get_post(&self, id: PostId) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id.to_string()],
                row_to_post,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List an author's own whispers, newest first. Soft-deleted posts are
    /// excluded; hidden ones remain visible to their author.
    pub fn list_posts_by_author(&self, author: &AccessKey) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE author_key = ?1 AND status != 'deleted'
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![author.as_str()], row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// List whispers with at least one report, most-reported first.
    /// Admin dashboard read.
    pub fn list_reported_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE report_count >= 1
             ORDER BY report_count DESC, created_at DESC
             LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit as i64], row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Aggregate counters for the admin status endpoint.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();
        let identities: i64 =
            conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        let posts: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        let replies: i64 = conn.query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))?;
        let hidden_posts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE status = 'hidden'",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            identities,
            posts,
            replies,
            hidden_posts,
        })
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    /// Count a report against a whisper.
    ///
    /// The increment and the threshold check run in one statement so the
    /// check always sees the post-increment value: the moment the counter
    /// reaches the hide threshold, an active post flips to hidden. Past the
    /// threshold the counter keeps rising with no further visible effect,
    /// and a deleted post stays deleted.
    pub fn report_post(&self, id: PostId) -> Result<(i64, PostStatus)> {
        self.conn()
            .query_row(
                "UPDATE posts
                 SET report_count = report_count + 1,
                     status = CASE
                         WHEN report_count + 1 >= ?2 AND status = 'active' THEN 'hidden'
                         ELSE status
                     END
                 WHERE id = ?1
                 RETURNING report_count, status",
                params![id.to_string(), REPORT_HIDE_THRESHOLD],
                |row| {
                    let count: i64 = row.get(0)?;
                    let status_str: String = row.get(1)?;
                    let status = PostStatus::from_label(&status_str).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok((count, status))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Soft-delete a whisper. Returns `true` if a row changed state.
    pub fn mark_post_deleted(&self, id: PostId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE posts SET status = 'deleted' WHERE id = ?1 AND status != 'deleted'",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

/// Column list shared by every post SELECT.
pub(crate) const POST_COLUMNS: &str =
    "id, mood, body, room, author_key, status, report_count, reply_count, created_at";

/// Map a `rusqlite::Row` (in [`POST_COLUMNS`] order) to a [`Post`].
pub(crate) fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id_str: String = row.get(0)?;
    let mood: String = row.get(1)?;
    let body: String = row.get(2)?;
    let room_str: String = row.get(3)?;
    let author_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let report_count: i64 = row.get(6)?;
    let reply_count: i64 = row.get(7)?;
    let created_str: String = row.get(8)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let author_key = AccessKey::parse(&author_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status = PostStatus::from_label(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Post {
        id: murmur_shared::PostId(id),
        mood,
        body,
        // Stored labels were validated on the way in; coercion is a no-op
        // for well-formed rows.
        room: Room::from_label(&room_str),
        author_key,
        status,
        report_count,
        reply_count,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn new_author(db: &Database) -> AccessKey {
        let key = AccessKey::generate();
        db.resolve(&key).unwrap();
        key
    }

    #[test]
    fn create_and_get_round_trip() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);

        let post = Post::new(
            "tired".into(),
            "long week".into(),
            Room::Work,
            author.clone(),
        );
        db.create_post(&post).unwrap();

        let fetched = db.get_post(post.id).unwrap();
        assert_eq!(fetched.body, "long week");
        assert_eq!(fetched.room, Room::Work);
        assert_eq!(fetched.status, PostStatus::Active);
        assert_eq!(fetched.author_key, author);
    }

    #[test]
    fn unknown_room_is_stored_as_general() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);

        let post = Post::new(
            "lost".into(),
            "where am I".into(),
            Room::from_label("nonexistent"),
            author,
        );
        db.create_post(&post).unwrap();

        assert_eq!(db.get_post(post.id).unwrap().room, Room::General);
    }

    #[test]
    fn creating_a_post_awards_one_point() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);

        let post = Post::new("ok".into(), "hello".into(), Room::General, author.clone());
        db.create_post(&post).unwrap();

        assert_eq!(db.get_identity(&author).unwrap().points, 1);
    }

    #[test]
    fn third_report_hides_the_post() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);
        let post = Post::new("sad".into(), "whisper".into(), Room::Love, author);
        db.create_post(&post).unwrap();

        let (count, status) = db.report_post(post.id).unwrap();
        assert_eq!((count, status), (1, PostStatus::Active));

        let (count, status) = db.report_post(post.id).unwrap();
        assert_eq!((count, status), (2, PostStatus::Active));

        let (count, status) = db.report_post(post.id).unwrap();
        assert_eq!((count, status), (3, PostStatus::Hidden));

        // Past the threshold the counter keeps rising, status is unchanged.
        let (count, status) = db.report_post(post.id).unwrap();
        assert_eq!((count, status), (4, PostStatus::Hidden));
    }

    #[test]
    fn thresholds_are_tracked_per_entity() {
        // Interleaved reports against two posts each trip their own
        // threshold on their own third report.
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);
        let left = Post::new("a".into(), "left".into(), Room::General, author.clone());
        let right = Post::new("b".into(), "right".into(), Room::General, author);
        db.create_post(&left).unwrap();
        db.create_post(&right).unwrap();

        db.report_post(left.id).unwrap();
        db.report_post(right.id).unwrap();
        db.report_post(left.id).unwrap();
        db.report_post(right.id).unwrap();

        let (count, status) = db.report_post(left.id).unwrap();
        assert_eq!((count, status), (3, PostStatus::Hidden));
        assert_eq!(db.get_post(right.id).unwrap().status, PostStatus::Active);

        let (count, status) = db.report_post(right.id).unwrap();
        assert_eq!((count, status), (3, PostStatus::Hidden));
    }

    #[test]
    fn reporting_a_deleted_post_keeps_it_deleted() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);
        let post = Post::new("x".into(), "y".into(), Room::General, author);
        db.create_post(&post).unwrap();
        assert!(db.mark_post_deleted(post.id).unwrap());

        for expected in 1..=4 {
            let (count, status) = db.report_post(post.id).unwrap();
            assert_eq!((count, status), (expected, PostStatus::Deleted));
        }
    }

    #[test]
    fn reporting_unknown_post_is_not_found() {
        let (_dir, db) = open_test_db();
        assert!(matches!(
            db.report_post(PostId::new()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn author_listing_skips_deleted_posts() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);

        let keep = Post::new("a".into(), "keep".into(), Room::General, author.clone());
        let gone = Post::new("b".into(), "gone".into(), Room::General, author.clone());
        db.create_post(&keep).unwrap();
        db.create_post(&gone).unwrap();
        db.mark_post_deleted(gone.id).unwrap();

        let posts = db.list_posts_by_author(&author).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, keep.id);
    }

    #[test]
    fn reported_listing_orders_by_count() {
        let (_dir, mut db) = open_test_db();
        let author = new_author(&db);

        let once = Post::new("a".into(), "one".into(), Room::General, author.clone());
        let twice = Post::new("b".into(), "two".into(), Room::General, author.clone());
        let clean = Post::new("c".into(), "none".into(), Room::General, author);
        for post in [&once, &twice, &clean] {
            db.create_post(post).unwrap();
        }
        db.report_post(once.id).unwrap();
        db.report_post(twice.id).unwrap();
        db.report_post(twice.id).unwrap();

        let reported = db.list_reported_posts(10).unwrap();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].id, twice.id);
        assert_eq!(reported[1].id, once.id);
    }
}

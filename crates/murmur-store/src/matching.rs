//! The whisper matching engine.
//!
//! Given a requesting identity and an optional room filter, pick one
//! eligible whisper for them to reply to. A whisper is eligible when it is
//! active, under the report threshold, not the requester's own, and in the
//! filtered room (if any).
//!
//! Selection runs in two stages:
//!
//! 1. [`Database::candidate_pool`]: a bounded ordered query. Eligible
//!    whispers sorted by `reply_count` ascending (loneliest first), ties
//!    broken by `created_at` descending (newest first), truncated to
//!    [`MATCH_POOL_SIZE`].
//! 2. [`pick_from_pool`]: one uniform random pick from that in-memory
//!    slice.
//!
//! Least-replies-first alone would herd every concurrent requester onto the
//! same whisper; uniform sampling over everything would bury never-replied
//! whispers under heavy traffic. Sampling the top of the lonely-ordered
//! pool spreads requesters across ~50 candidates while still favoring fresh
//! and unanswered whispers. Reply creation bumps `reply_count`, which
//! deprioritizes a whisper in later pools, so the policy balances itself
//! with no scheduler behind it.

use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::params;

use murmur_shared::constants::{MATCH_POOL_SIZE, REPORT_HIDE_THRESHOLD};
use murmur_shared::AccessKey;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Post;
use crate::posts::{row_to_post, POST_COLUMNS};

impl Database {
    /// Stage 1: the bounded, ordered candidate query.
    ///
    /// `room_filter` of `None` or `"all"` means no filter. Any other string
    /// is matched verbatim against the stored room label, so an unknown
    /// label simply matches nothing: a legitimate empty pool rather than an
    /// error.
    pub fn candidate_pool(
        &self,
        requester: &AccessKey,
        room_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let filter = room_filter
            .map(str::trim)
            .filter(|r| !r.eq_ignore_ascii_case("all"));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE status = 'active'
               AND report_count < ?2
               AND author_key != ?1
               AND (?3 IS NULL OR room = ?3)
             ORDER BY reply_count ASC, created_at DESC
             LIMIT ?4"
        ))?;

        let rows = stmt.query_map(
            params![
                requester.as_str(),
                REPORT_HIDE_THRESHOLD,
                filter,
                limit as i64
            ],
            row_to_post,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Select one whisper for the requester, or `None` when nothing is
    /// eligible. The empty result is a normal terminal state, not a
    /// failure. Read-only: selection itself changes nothing.
    pub fn select_post<R: Rng + ?Sized>(
        &self,
        requester: &AccessKey,
        room_filter: Option<&str>,
        rng: &mut R,
    ) -> Result<Option<Post>> {
        let pool = self.candidate_pool(requester, room_filter, MATCH_POOL_SIZE)?;
        Ok(pick_from_pool(&pool, rng).cloned())
    }
}

/// Stage 2: one uniform pick from a finite in-memory pool.
///
/// Kept separate from the query so the sampling stage is unit-testable
/// without a live database.
pub fn pick_from_pool<'a, R: Rng + ?Sized>(pool: &'a [Post], rng: &mut R) -> Option<&'a Post> {
    pool.choose(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;
    use chrono::{TimeZone, Utc};
    use murmur_shared::{PostStatus, Room};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn identity(db: &Database) -> AccessKey {
        let key = AccessKey::generate();
        db.resolve(&key).unwrap();
        key
    }

    /// A post with explicit ordering fields, inserted as-is.
    fn seeded_post(
        db: &mut Database,
        author: &AccessKey,
        room: Room,
        reply_count: i64,
        minute: u32,
    ) -> Post {
        let mut post = Post::new("mood".into(), "body".into(), room, author.clone());
        post.reply_count = reply_count;
        post.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap();
        db.create_post(&post).unwrap();
        post
    }

    #[test]
    fn own_posts_are_never_selected() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);

        seeded_post(&mut db, &me, Room::Love, 0, 0);
        seeded_post(&mut db, &me, Room::General, 0, 1);
        let theirs = seeded_post(&mut db, &other, Room::Love, 0, 2);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let picked = db.select_post(&me, None, &mut rng).unwrap().unwrap();
            assert_eq!(picked.id, theirs.id);
        }
        // Same with a room filter covering my posts.
        for _ in 0..50 {
            let picked = db.select_post(&me, Some("love"), &mut rng).unwrap().unwrap();
            assert_eq!(picked.id, theirs.id);
        }
    }

    #[test]
    fn sole_author_room_yields_no_content() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        seeded_post(&mut db, &me, Room::School, 0, 0);

        let mut rng = StdRng::seed_from_u64(2);
        // Empty eligible set is Ok(None), not an error.
        assert!(db.select_post(&me, Some("school"), &mut rng).unwrap().is_none());
        assert!(db.select_post(&me, None, &mut rng).unwrap().is_none());
    }

    #[test]
    fn unknown_room_filter_matches_nothing() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);
        seeded_post(&mut db, &other, Room::General, 0, 0);

        let mut rng = StdRng::seed_from_u64(3);
        assert!(db
            .select_post(&me, Some("nonexistent"), &mut rng)
            .unwrap()
            .is_none());
    }

    #[test]
    fn all_filter_behaves_like_no_filter() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);
        let post = seeded_post(&mut db, &other, Room::Money, 0, 0);

        let mut rng = StdRng::seed_from_u64(4);
        let picked = db.select_post(&me, Some("all"), &mut rng).unwrap().unwrap();
        assert_eq!(picked.id, post.id);
    }

    #[test]
    fn hidden_reported_and_deleted_posts_are_ineligible() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);

        let reported = seeded_post(&mut db, &other, Room::General, 0, 0);
        for _ in 0..3 {
            db.report_post(reported.id).unwrap();
        }
        let deleted = seeded_post(&mut db, &other, Room::General, 0, 1);
        db.mark_post_deleted(deleted.id).unwrap();
        let live = seeded_post(&mut db, &other, Room::General, 5, 2);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let picked = db.select_post(&me, None, &mut rng).unwrap().unwrap();
            assert_eq!(picked.id, live.id);
        }
    }

    #[test]
    fn pool_is_least_replied_with_newest_tiebreak() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);

        // Two lonely posts, one busy one; among the lonely, newer first.
        let lonely_old = seeded_post(&mut db, &other, Room::General, 0, 0);
        let lonely_new = seeded_post(&mut db, &other, Room::General, 0, 30);
        let busy = seeded_post(&mut db, &other, Room::General, 9, 15);

        let pool = db.candidate_pool(&me, None, 50).unwrap();
        let ids: Vec<_> = pool.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![lonely_new.id, lonely_old.id, busy.id]);
    }

    #[test]
    fn pool_is_bounded_at_the_limit() {
        // M = 1, 49, 50, 200 eligible posts; the pool is min(M, 50) and
        // always the least-replied slice.
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);

        let mut rng = StdRng::seed_from_u64(6);
        let mut created = 0u32;
        for m in [1usize, 49, 50, 200] {
            // Top up to m eligible posts, reply counts 0..m.
            while (created as usize) < m {
                seeded_post(&mut db, &other, Room::General, created as i64, created % 60);
                created += 1;
            }

            let pool = db.candidate_pool(&me, None, 50).unwrap();
            assert_eq!(pool.len(), m.min(50));

            // The pool must be exactly the m.min(50) lowest reply counts.
            let max_in_pool = pool.iter().map(|p| p.reply_count).max().unwrap();
            assert!(max_in_pool < m.min(50) as i64);

            // And the sampled post always comes from that pool.
            for _ in 0..10 {
                let picked = db.select_post(&me, None, &mut rng).unwrap().unwrap();
                assert!(pool.iter().any(|p| p.id == picked.id));
            }
        }
    }

    #[test]
    fn pick_is_uniform_over_the_pool() {
        let (_dir, mut db) = open_test_db();
        let other = identity(&db);
        let posts: Vec<Post> = (0..5)
            .map(|i| seeded_post(&mut db, &other, Room::General, 0, i))
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = std::collections::HashMap::new();
        for _ in 0..500 {
            let picked = pick_from_pool(&posts, &mut rng).unwrap();
            *hits.entry(picked.id).or_insert(0usize) += 1;
        }

        // Every pool member is reachable; with 500 draws over 5 posts a
        // missing member means the sampler is not uniform.
        assert_eq!(hits.len(), posts.len());
    }

    #[test]
    fn pick_from_empty_pool_is_none() {
        let mut rng = StdRng::seed_from_u64(8);
        assert!(pick_from_pool(&[], &mut rng).is_none());
    }

    #[test]
    fn selection_is_read_only() {
        let (_dir, mut db) = open_test_db();
        let me = identity(&db);
        let other = identity(&db);
        let post = seeded_post(&mut db, &other, Room::General, 0, 0);

        let mut rng = StdRng::seed_from_u64(9);
        db.select_post(&me, None, &mut rng).unwrap();

        let after = db.get_post(post.id).unwrap();
        assert_eq!(after.reply_count, 0);
        assert_eq!(after.status, PostStatus::Active);
    }
}

//! CRUD and moderation operations for [`Reply`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use murmur_shared::constants::REPORT_HIDE_THRESHOLD;
use murmur_shared::rewards::{point_value, PointAction};
use murmur_shared::{AccessKey, PostId, ReplyId, ReplyStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Reply;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a reply against an active whisper.
    ///
    /// Runs as one transaction: parent lookup, insert, in-place
    /// `reply_count` bump, and the responder's point award all commit
    /// together or not at all. `is_author_reply` is fixed here by comparing
    /// the responder to the parent's author.
    ///
    /// A hidden or deleted parent is reported as [`StoreError::NotFound`]:
    /// to a responder, a non-active whisper is indistinguishable from an
    /// absent one.
    pub fn create_reply(
        &mut self,
        post_id: PostId,
        responder: &AccessKey,
        body: String,
    ) -> Result<Reply> {
        let tx = self.conn_mut().transaction()?;

        let (author_key, status): (String, String) = tx
            .query_row(
                "SELECT author_key, status FROM posts WHERE id = ?1",
                params![post_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if status != "active" {
            return Err(StoreError::NotFound);
        }

        let reply = Reply {
            id: ReplyId::new(),
            post_id,
            body,
            responder_key: responder.clone(),
            is_author_reply: author_key == responder.as_str(),
            status: ReplyStatus::Visible,
            report_count: 0,
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO replies
                 (id, post_id, body, responder_key, is_author_reply, status, report_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                reply.id.to_string(),
                reply.post_id.to_string(),
                reply.body,
                reply.responder_key.as_str(),
                reply.is_author_reply,
                reply.status.as_str(),
                reply.report_count,
                reply.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE posts SET reply_count = reply_count + 1 WHERE id = ?1",
            params![post_id.to_string()],
        )?;

        tx.execute(
            "UPDATE identities SET points = points + ?1 WHERE key = ?2",
            params![point_value(PointAction::ReplyCreated), responder.as_str()],
        )?;

        tx.commit()?;
        Ok(reply)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single reply by id.
    pub fn get_reply(&self, id: ReplyId) -> Result<Reply> {
        self.conn()
            .query_row(
                &format!("SELECT {REPLY_COLUMNS} FROM replies WHERE id = ?1"),
                params![id.to_string()],
                row_to_reply,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List the visible replies for a whisper, oldest first.
    pub fn list_replies_for_post(&self, post_id: PostId) -> Result<Vec<Reply>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REPLY_COLUMNS} FROM replies
             WHERE post_id = ?1 AND status = 'visible'
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(params![post_id.to_string()], row_to_reply)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    /// Count a report against a reply. Same single-statement increment and
    /// threshold check as [`Database::report_post`].
    pub fn report_reply(&self, id: ReplyId) -> Result<(i64, ReplyStatus)> {
        self.conn()
            .query_row(
                "UPDATE replies
                 SET report_count = report_count + 1,
                     status = CASE
                         WHEN report_count + 1 >= ?2 AND status = 'visible' THEN 'hidden'
                         ELSE status
                     END
                 WHERE id = ?1
                 RETURNING report_count, status",
                params![id.to_string(), REPORT_HIDE_THRESHOLD],
                |row| {
                    let count: i64 = row.get(0)?;
                    let status_str: String = row.get(1)?;
                    let status = ReplyStatus::from_label(&status_str).map_err(|e| {
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
}

/// Column list shared by every reply SELECT.
const REPLY_COLUMNS: &str =
    "id, post_id, body, responder_key, is_author_reply, status, report_count, created_at";

/// Map a `rusqlite::Row` (in [`REPLY_COLUMNS`] order) to a [`Reply`].
fn row_to_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reply> {
    let id_str: String = row.get(0)?;
    let post_id_str: String = row.get(1)?;
    let body: String = row.get(2)?;
    let responder_str: String = row.get(3)?;
    let is_author_reply: bool = row.get(4)?;
    let status_str: String = row.get(5)?;
    let report_count: i64 = row.get(6)?;
    let created_str: String = row.get(7)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let post_id = uuid::Uuid::parse_str(&post_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let responder_key = AccessKey::parse(&responder_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status = ReplyStatus::from_label(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Reply {
        id: murmur_shared::ReplyId(id),
        post_id: murmur_shared::PostId(post_id),
        body,
        responder_key,
        is_author_reply,
        status,
        report_count,
        created_at,
    })
}

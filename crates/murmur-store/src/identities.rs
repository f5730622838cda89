//! CRUD operations for [`Identity`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use murmur_shared::AccessKey;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Identity;

impl Database {
    /// Resolve an access key to its identity, creating a zero-point,
    /// non-banned record on first sight.
    ///
    /// The key has already passed [`AccessKey::parse`], so a malformed key
    /// can never reach this point. Resolution succeeds for banned
    /// identities; degrading their responses is the API layer's job.
    pub fn resolve(&self, key: &AccessKey) -> Result<Identity> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO identities (key, points, banned, created_at)
             VALUES (?1, 0, 0, ?2)",
            params![key.as_str(), Utc::now().to_rfc3339()],
        )?;

        if inserted > 0 {
            tracing::debug!(key = %key, "created identity on first sight");
        }

        self.get_identity(key)
    }

    /// Fetch an identity without creating it.
    pub fn get_identity(&self, key: &AccessKey) -> Result<Identity> {
        self.conn()
            .query_row(
                "SELECT key, points, banned, created_at
                 FROM identities WHERE key = ?1",
                params![key.as_str()],
                row_to_identity,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Whether an identity already exists for this key.
    pub fn identity_exists(&self, key: &AccessKey) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM identities WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Ban an identity. One-way: there is no unban.
    ///
    /// Returns `true` if a row was updated.
    pub fn ban_identity(&self, key: &AccessKey) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE identities SET banned = 1 WHERE key = ?1",
            params![key.as_str()],
        )?;
        Ok(affected > 0)
    }
}

/// Map a `rusqlite::Row` to an [`Identity`].
pub(crate) fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    let key_str: String = row.get(0)?;
    let points: i64 = row.get(1)?;
    let banned: bool = row.get(2)?;
    let created_str: String = row.get(3)?;

    let key = AccessKey::parse(&key_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Identity {
        key,
        points,
        banned,
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

    #[test]
    fn resolve_creates_on_first_sight() {
        let (_dir, db) = open_test_db();
        let key = AccessKey::generate();

        assert!(!db.identity_exists(&key).unwrap());

        let identity = db.resolve(&key).unwrap();
        assert_eq!(identity.key, key);
        assert_eq!(identity.points, 0);
        assert!(!identity.banned);

        assert!(db.identity_exists(&key).unwrap());
    }

    #[test]
    fn resolve_is_idempotent() {
        let (_dir, db) = open_test_db();
        let key = AccessKey::generate();

        let first = db.resolve(&key).unwrap();
        let second = db.resolve(&key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn get_identity_does_not_create() {
        let (_dir, db) = open_test_db();
        let key = AccessKey::generate();

        assert!(matches!(
            db.get_identity(&key),
            Err(StoreError::NotFound)
        ));
        assert!(!db.identity_exists(&key).unwrap());
    }

    #[test]
    fn ban_is_one_way_and_still_resolves() {
        let (_dir, db) = open_test_db();
        let key = AccessKey::generate();
        db.resolve(&key).unwrap();

        assert!(db.ban_identity(&key).unwrap());

        // A banned identity keeps resolving; only the flag changes.
        let identity = db.resolve(&key).unwrap();
        assert!(identity.banned);
    }

    #[test]
    fn ban_unknown_key_updates_nothing() {
        let (_dir, db) = open_test_db();
        assert!(!db.ban_identity(&AccessKey::generate()).unwrap());
    }
}

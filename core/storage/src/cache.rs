//! Durable cache of remote files fetched to local disk.
//!
//! Tracks, per remote file, where its cached copy lives and the last known
//! modification times on both sides.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use vaultsync_common::{BackendKind, Error, FileDescriptor, Result};

/// Cache record for one remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Remote file id.
    pub uid: String,
    /// Cached copy on local disk.
    pub local_path: PathBuf,
    /// Path on the remote backend.
    pub remote_path: String,
    /// When the cached copy was last written.
    pub local_modified_at: DateTime<Utc>,
    /// Remote modification time as of the last download or upload.
    pub remote_modified_at: DateTime<Utc>,
    /// Cached copy holds edits not yet uploaded.
    pub is_dirty: bool,
}

impl RemoteFile {
    /// Descriptor of the cached copy, as seen by vault load/save logic.
    pub fn to_file_descriptor(&self) -> FileDescriptor {
        FileDescriptor::file(
            self.uid.clone(),
            self.remote_path.clone(),
            self.local_modified_at,
            BackendKind::Remote,
        )
    }
}

/// Storage for [`RemoteFile`] records.
pub trait RemoteFileCache: Send + Sync {
    fn get_by_uid(&self, uid: &str) -> Result<Option<RemoteFile>>;

    fn get_by_remote_path(&self, remote_path: &str) -> Result<Option<RemoteFile>>;

    /// Records whose cached copy has unflushed edits.
    fn locally_modified_files(&self) -> Result<Vec<RemoteFile>>;

    /// Insert or replace the record keyed by `file.uid`.
    fn upsert(&self, file: &RemoteFile) -> Result<()>;

    fn delete_by_uid(&self, uid: &str) -> Result<()>;

    fn all(&self) -> Result<Vec<RemoteFile>>;
}

const SELECT_COLUMNS: &str =
    "SELECT uid, local_path, remote_path, local_modified_at, remote_modified_at, is_dirty \
     FROM remote_files";

/// SQLite-backed remote file cache.
pub struct SqliteFileCache {
    conn: Mutex<Connection>,
}

impl SqliteFileCache {
    /// Create or open a cache database.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(db_error)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS remote_files (
                uid TEXT PRIMARY KEY,
                local_path TEXT NOT NULL,
                remote_path TEXT NOT NULL,
                local_modified_at TEXT NOT NULL,
                remote_modified_at TEXT NOT NULL,
                is_dirty INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_remote_path ON remote_files(remote_path);
            "#,
        )
        .map_err(db_error)?;

        info!("Remote file cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory cache (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query(&self, sql: &str, param: Option<&str>) -> Result<Vec<RemoteFile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(db_error)?;
        let rows = match param {
            Some(p) => stmt.query_map([p], read_row),
            None => stmt.query_map([], read_row),
        }
        .map_err(db_error)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_error)
    }
}

impl RemoteFileCache for SqliteFileCache {
    fn get_by_uid(&self, uid: &str) -> Result<Option<RemoteFile>> {
        let conn = self.conn();
        conn.query_row(&format!("{} WHERE uid = ?1", SELECT_COLUMNS), [uid], read_row)
            .optional()
            .map_err(db_error)
    }

    fn get_by_remote_path(&self, remote_path: &str) -> Result<Option<RemoteFile>> {
        let conn = self.conn();
        conn.query_row(
            &format!("{} WHERE remote_path = ?1", SELECT_COLUMNS),
            [remote_path],
            read_row,
        )
        .optional()
        .map_err(db_error)
    }

    fn locally_modified_files(&self) -> Result<Vec<RemoteFile>> {
        self.query(&format!("{} WHERE is_dirty = 1", SELECT_COLUMNS), None)
    }

    fn upsert(&self, file: &RemoteFile) -> Result<()> {
        debug!(
            "Upserting cache entry {} ({}), dirty={}",
            file.uid, file.remote_path, file.is_dirty
        );
        self.conn()
            .execute(
                r#"
                INSERT OR REPLACE INTO remote_files
                (uid, local_path, remote_path, local_modified_at, remote_modified_at, is_dirty)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    file.uid,
                    file.local_path.to_string_lossy(),
                    file.remote_path,
                    file.local_modified_at,
                    file.remote_modified_at,
                    file.is_dirty,
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    fn delete_by_uid(&self, uid: &str) -> Result<()> {
        debug!("Deleting cache entry {}", uid);
        self.conn()
            .execute("DELETE FROM remote_files WHERE uid = ?1", params![uid])
            .map_err(db_error)?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<RemoteFile>> {
        self.query(SELECT_COLUMNS, None)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RemoteFile> {
    Ok(RemoteFile {
        uid: row.get(0)?,
        local_path: PathBuf::from(row.get::<_, String>(1)?),
        remote_path: row.get(2)?,
        local_modified_at: row.get(3)?,
        remote_modified_at: row.get(4)?,
        is_dirty: row.get(5)?,
    })
}

fn db_error(err: rusqlite::Error) -> Error {
    Error::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(uid: &str, dirty: bool) -> RemoteFile {
        RemoteFile {
            uid: uid.to_string(),
            local_path: PathBuf::from(format!("/cache/{}", uid)),
            remote_path: format!("/vaults/{}.kdbx", uid),
            local_modified_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            remote_modified_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            is_dirty: dirty,
        }
    }

    #[test]
    fn test_cache_operations() {
        let cache = SqliteFileCache::in_memory().unwrap();
        let entry = record("abc", false);

        cache.upsert(&entry).unwrap();
        assert_eq!(cache.get_by_uid("abc").unwrap(), Some(entry.clone()));
        assert_eq!(
            cache.get_by_remote_path("/vaults/abc.kdbx").unwrap(),
            Some(entry)
        );

        cache.delete_by_uid("abc").unwrap();
        assert!(cache.get_by_uid("abc").unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let cache = SqliteFileCache::in_memory().unwrap();
        let mut entry = record("abc", false);
        cache.upsert(&entry).unwrap();

        entry.is_dirty = true;
        entry.local_modified_at = Utc::now();
        cache.upsert(&entry).unwrap();

        assert_eq!(cache.all().unwrap().len(), 1);
        assert_eq!(cache.get_by_uid("abc").unwrap(), Some(entry));
    }

    #[test]
    fn test_locally_modified_files() {
        let cache = SqliteFileCache::in_memory().unwrap();
        cache.upsert(&record("clean", false)).unwrap();
        cache.upsert(&record("dirty", true)).unwrap();

        let modified = cache.locally_modified_files().unwrap();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].uid, "dirty");
    }

    #[test]
    fn test_cache_persists_across_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let db = temp.path().join("cache.db");

        SqliteFileCache::open(&db)
            .unwrap()
            .upsert(&record("abc", true))
            .unwrap();

        let reopened = SqliteFileCache::open(&db).unwrap();
        assert!(reopened.get_by_uid("abc").unwrap().unwrap().is_dirty);
    }

    #[test]
    fn test_descriptor_uses_local_time() {
        let entry = record("abc", true);
        let fd = entry.to_file_descriptor();
        assert_eq!(fd.uid, "abc");
        assert_eq!(fd.path, "/vaults/abc.kdbx");
        assert_eq!(fd.name, "abc.kdbx");
        assert_eq!(fd.modified_at, entry.local_modified_at);
        assert_eq!(fd.backend, BackendKind::Remote);
    }
}

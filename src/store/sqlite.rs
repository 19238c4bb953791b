//! SQLite storage backend.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{Store, Transaction};
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// How long to wait for another handle holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store.
///
/// Thread-safe via internal Mutex (SQLite Connection is not Sync). Write
/// transactions start with `BEGIN IMMEDIATE`, so read-modify-write sequences
/// cannot interleave even across processes.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE buckets (name TEXT PRIMARY KEY);
/// CREATE TABLE kv (
///     bucket TEXT NOT NULL,
///     key TEXT NOT NULL,
///     value BLOB NOT NULL,
///     PRIMARY KEY (bucket, key)
/// );
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a file-based store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS buckets (name TEXT PRIMARY KEY);
             CREATE TABLE IF NOT EXISTS kv (
                 bucket TEXT NOT NULL,
                 key TEXT NOT NULL,
                 value BLOB NOT NULL,
                 PRIMARY KEY (bucket, key)
             );",
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StorePoisoned)
    }
}

impl Store for SqliteStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let mut tx = SqliteTransaction(conn.transaction_with_behavior(TransactionBehavior::Deferred)?);
        // Dropping the transaction rolls it back
        f(&mut tx)
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let mut tx =
            SqliteTransaction(conn.transaction_with_behavior(TransactionBehavior::Immediate)?);
        let value = f(&mut tx)?;
        tx.0.commit()?;
        Ok(value)
    }
}

struct SqliteTransaction<'conn>(rusqlite::Transaction<'conn>);

impl SqliteTransaction<'_> {
    fn require_bucket(&self, bucket: &str) -> Result<()> {
        let exists = self
            .0
            .query_row("SELECT 1 FROM buckets WHERE name = ?1", [bucket], |_| Ok(()))
            .optional()?;
        exists.ok_or_else(|| Error::BucketMissing(bucket.to_string()))
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_bucket_if_not_exists(&mut self, bucket: &str) -> Result<()> {
        self.0
            .execute("INSERT OR IGNORE INTO buckets (name) VALUES (?1)", [bucket])?;
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.require_bucket(bucket)?;
        let value = self
            .0
            .query_row(
                "SELECT value FROM kv WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.require_bucket(bucket)?;
        self.0.execute(
            "INSERT INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value",
            params![bucket, key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &str) -> Result<()> {
        self.require_bucket(bucket)?;
        self.0.execute(
            "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
        )?;
        Ok(())
    }

    fn entries(&self, bucket: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.require_bucket(bucket)?;
        let mut stmt = self
            .0
            .prepare("SELECT key, value FROM kv WHERE bucket = ?1 ORDER BY key")?;
        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map([bucket], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

//! Transactional key-value storage.
//!
//! Records live in named buckets. All reads and writes happen inside a
//! transaction: [`Store::update`] commits when its closure returns `Ok` and
//! rolls back otherwise, [`Store::view`] never commits.
//!
//! # Implementations
//!
//! - [`SqliteStore`] -- durable, file backed
//! - [`MemoryStore`] -- process lifetime only (tests, demos)

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Operations available inside one transaction.
pub trait Transaction {
    fn create_bucket_if_not_exists(&mut self, bucket: &str) -> Result<()>;

    /// Fails with [`Error::BucketMissing`] if the bucket was never created.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    fn delete(&mut self, bucket: &str, key: &str) -> Result<()>;

    /// Every key/value pair of the bucket, in ascending key byte order.
    fn entries(&self, bucket: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// A key-value store with serializable transactions.
pub trait Store: Send + Sync {
    /// Run `f` in a read-only transaction.
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>;

    /// Run `f` in a read-write transaction, committing iff it returns `Ok`.
    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>;
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behavior every backend must share.

    use super::*;

    pub fn buckets_must_exist<S: Store>(store: &S) {
        let err = store.view(|tx| tx.get("missing", "1")).unwrap_err();
        assert_eq!(err, Error::BucketMissing("missing".into()));

        let err = store
            .update(|tx| tx.put("missing", "1", b"x"))
            .unwrap_err();
        assert_eq!(err, Error::BucketMissing("missing".into()));
    }

    pub fn put_get_delete<S: Store>(store: &S) {
        store
            .update(|tx| {
                tx.create_bucket_if_not_exists("b")?;
                tx.create_bucket_if_not_exists("b")?;
                tx.put("b", "2", b"two")?;
                tx.put("b", "1", b"one")?;
                tx.put("b", "10", b"ten")
            })
            .unwrap();

        let value = store.view(|tx| tx.get("b", "1")).unwrap();
        assert_eq!(value.as_deref(), Some(&b"one"[..]));

        let keys: Vec<String> = store
            .view(|tx| tx.entries("b"))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["1", "10", "2"]);

        store.update(|tx| tx.delete("b", "10")).unwrap();
        assert_eq!(store.view(|tx| tx.get("b", "10")).unwrap(), None);
    }

    pub fn failed_update_rolls_back<S: Store>(store: &S) {
        store
            .update(|tx| tx.create_bucket_if_not_exists("b"))
            .unwrap();

        let result: Result<()> = store.update(|tx| {
            tx.put("b", "1", b"one")?;
            Err(Error::DuplicateName("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.view(|tx| tx.get("b", "1")).unwrap(), None);
    }
}

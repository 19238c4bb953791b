//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Store, Transaction};
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// A store that lives as long as the process.
///
/// Each transaction works on a copy of the data which replaces the original
/// on commit. The lock is held for the whole transaction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>> {
        self.buckets.lock().map_err(|_| Error::StorePoisoned)
    }
}

impl Store for MemoryStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let guard = self.lock()?;
        let mut tx = MemoryTransaction(guard.clone());
        f(&mut tx)
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut guard = self.lock()?;
        let mut tx = MemoryTransaction(guard.clone());
        let value = f(&mut tx)?;
        *guard = tx.0;
        Ok(value)
    }
}

struct MemoryTransaction(Buckets);

impl MemoryTransaction {
    fn bucket(&self, name: &str) -> Result<&BTreeMap<String, Vec<u8>>> {
        self.0
            .get(name)
            .ok_or_else(|| Error::BucketMissing(name.to_string()))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut BTreeMap<String, Vec<u8>>> {
        self.0
            .get_mut(name)
            .ok_or_else(|| Error::BucketMissing(name.to_string()))
    }
}

impl Transaction for MemoryTransaction {
    fn create_bucket_if_not_exists(&mut self, bucket: &str) -> Result<()> {
        self.0.entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.bucket(bucket)?.get(key).cloned())
    }

    fn put(&mut self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.bucket_mut(bucket)?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &str) -> Result<()> {
        self.bucket_mut(bucket)?.remove(key);
        Ok(())
    }

    fn entries(&self, bucket: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .bucket(bucket)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

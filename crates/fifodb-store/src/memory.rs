//! Ordered in-memory store backend.
//!
//! A `BTreeMap` under a `parking_lot::RwLock`. Every mutation takes the
//! write lock, so single-key writes and batches are atomic with respect to
//! reads and to each other. Iterators snapshot the map at creation time
//! and are unaffected by later writes; the queue engine re-creates its
//! iterator whenever it needs a fresh view.
//!
//! The sync flag is accepted and ignored: memory-resident data is as
//! durable as it will ever get.

use std::collections::BTreeMap;

use fifodb_error::Result;
use parking_lot::RwLock;

use crate::{BatchOp, Store, StoreIterator, WriteBatch, WriteOptions};

/// Ordered in-memory [`Store`] used by tests, benchmarks, and as the
/// reference semantics for the contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Store for MemoryStore {
    type Iter<'a> = MemoryIterator
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8], _opts: WriteOptions) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8], _opts: WriteOptions) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn write(&self, batch: WriteBatch, _opts: WriteOptions) -> Result<()> {
        let mut map = self.map.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter(&self) -> Result<Self::Iter<'_>> {
        let entries = self
            .map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(MemoryIterator { entries, pos: 0 })
    }
}

/// Snapshot cursor over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl StoreIterator for MemoryIterator {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.pos = self
            .entries
            .partition_point(|(k, _)| k.as_slice() < key);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> WriteOptions {
        WriteOptions::default()
    }

    #[test]
    fn get_absent_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"k", b"v", opts()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        store.put(b"k", b"v2", opts()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));
        store.delete(b"k", opts()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        // Deleting again is fine.
        store.delete(b"k", opts()).unwrap();
    }

    #[test]
    fn iteration_is_key_ordered() {
        let store = MemoryStore::new();
        for key in [&b"b"[..], b"a", b"d", b"c"] {
            store.put(key, b"x", opts()).unwrap();
        }
        let mut iter = store.iter().unwrap();
        iter.seek(b"").unwrap();
        let mut seen = Vec::new();
        while iter.valid() {
            seen.push(iter.key().to_vec());
            iter.next().unwrap();
        }
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn seek_positions_at_first_key_not_below() {
        let store = MemoryStore::new();
        store.put(&[1u8, 0], b"x", opts()).unwrap();
        store.put(&[1u8, 5], b"y", opts()).unwrap();
        let mut iter = store.iter().unwrap();
        iter.seek(&[1u8, 1]).unwrap();
        assert!(iter.valid());
        assert_eq!(iter.key(), &[1u8, 5]);
        iter.seek(&[2u8, 0]).unwrap();
        assert!(!iter.valid());
    }

    #[test]
    fn iterator_is_a_snapshot() {
        let store = MemoryStore::new();
        store.put(b"a", b"1", opts()).unwrap();
        let mut iter = store.iter().unwrap();
        store.put(b"b", b"2", opts()).unwrap();
        iter.seek(b"").unwrap();
        assert!(iter.valid());
        iter.next().unwrap();
        assert!(!iter.valid(), "entry written after snapshot must be invisible");
    }

    #[test]
    fn batch_applies_in_order() {
        let store = MemoryStore::new();
        store.put(b"old", b"1", opts()).unwrap();
        let mut batch = WriteBatch::new();
        batch.delete(b"old");
        batch.put(b"new", b"2");
        batch.put(b"new", b"3");
        store.write(batch, WriteOptions::synced()).unwrap();
        assert_eq!(store.get(b"old").unwrap(), None);
        assert_eq!(store.get(b"new").unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.len(), 1);
    }
}

//! An in-memory reference backend, grounded on the same
//! `Arc<Mutex<HashMap<..>>>` shape used for content-addressed node
//! storage elsewhere in the ecosystem (e.g. a trie's node map). Meant
//! as the default backend for tests and single-process hosts; a
//! production deployment would swap this for a persistent backend
//! behind the same trait.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use avm_core::Hash256;

use crate::error::StoreError;
use crate::store::{CheckpointStore, CheckpointTx};

pub type NodeTable = Arc<Mutex<FxHashMap<Hash256, Vec<u8>>>>;
type NameTable = Arc<Mutex<FxHashMap<String, Hash256>>>;

#[derive(Default, Clone)]
pub struct InMemoryStore {
    nodes: NodeTable,
    names: NameTable,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.nodes.lock().map_err(|_| StoreError::LockPoisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl CheckpointStore for InMemoryStore {
    fn begin(&self) -> Box<dyn CheckpointTx + '_> {
        Box::new(InMemoryTx { table: self.nodes.clone(), pending: FxHashMap::default() })
    }

    fn map_name_to_key(&self, name: &str, key: Hash256) -> Result<(), StoreError> {
        let mut names = self.names.lock().map_err(|_| StoreError::LockPoisoned)?;
        names.insert(name.to_string(), key);
        Ok(())
    }

    fn resolve_name(&self, name: &str) -> Result<Option<Hash256>, StoreError> {
        let names = self.names.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(names.get(name).copied())
    }
}

struct InMemoryTx {
    table: NodeTable,
    pending: FxHashMap<Hash256, Vec<u8>>,
}

impl CheckpointTx for InMemoryTx {
    fn get(&self, key: Hash256) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(v) = self.pending.get(&key) {
            return Ok(Some(v.clone()));
        }
        let table = self.table.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(table.get(&key).cloned())
    }

    fn put_if_absent(&mut self, key: Hash256, value: Vec<u8>) -> Result<(), StoreError> {
        if self.pending.contains_key(&key) {
            return Ok(());
        }
        let table = self.table.lock().map_err(|_| StoreError::LockPoisoned)?;
        if table.contains_key(&key) {
            return Ok(());
        }
        drop(table);
        self.pending.insert(key, value);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut table = self.table.lock().map_err(|_| StoreError::LockPoisoned)?;
        table.extend(self.pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_through_the_same_transaction() {
        let store = InMemoryStore::new();
        let mut tx = store.begin();
        let key = Hash256::from(1u64);
        tx.put_if_absent(key, vec![1, 2, 3]).unwrap();
        assert_eq!(tx.get(key).unwrap(), Some(vec![1, 2, 3]));
        tx.commit().unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn existing_entries_are_not_overwritten() {
        let store = InMemoryStore::new();
        let key = Hash256::from(1u64);
        {
            let mut tx = store.begin();
            tx.put_if_absent(key, vec![1]).unwrap();
            tx.commit().unwrap();
        }
        {
            let mut tx = store.begin();
            tx.put_if_absent(key, vec![9]).unwrap();
            tx.commit().unwrap();
        }
        let tx = store.begin();
        assert_eq!(tx.get(key).unwrap(), Some(vec![1]));
    }

    #[test]
    fn uncommitted_writes_are_invisible_to_other_transactions() {
        let store = InMemoryStore::new();
        let key = Hash256::from(1u64);
        let mut tx = store.begin();
        tx.put_if_absent(key, vec![1]).unwrap();
        let other = store.begin();
        assert_eq!(other.get(key).unwrap(), None);
    }

    #[test]
    fn named_anchors_resolve_to_their_key() {
        let store = InMemoryStore::new();
        assert_eq!(store.resolve_name("latest").unwrap(), None);
        store.map_name_to_key("latest", Hash256::from(42u64)).unwrap();
        assert_eq!(store.resolve_name("latest").unwrap(), Some(Hash256::from(42u64)));
        store.map_name_to_key("latest", Hash256::from(99u64)).unwrap();
        assert_eq!(store.resolve_name("latest").unwrap(), Some(Hash256::from(99u64)));
    }
}

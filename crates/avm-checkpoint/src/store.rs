//! A thin, minimal content-addressed storage interface (spec §4.7).
//!
//! Mirrors the read/write-transaction split of a conventional storage
//! backend: `begin` opens a transaction that batches every write until
//! `commit`, so a checkpoint that fails partway through never leaves a
//! store holding a subset of its nodes.

use avm_core::Hash256;

use crate::error::StoreError;

/// A content-addressed key-value store keyed by node hash.
pub trait CheckpointStore: Send + Sync {
    fn begin(&self) -> Box<dyn CheckpointTx + '_>;

    /// Associates a human-readable name with a content-addressed key, so
    /// a host can anchor "the latest checkpoint" or "block 12345"
    /// without tracking the raw hash itself. Carried over from the
    /// original implementation's checkpoint manager, whose one working
    /// idea (name -> key) survives even though the manager around it did
    /// not (see `avm-checkpoint`'s crate docs).
    fn map_name_to_key(&self, name: &str, key: Hash256) -> Result<(), StoreError>;

    /// Resolves a name previously registered with `map_name_to_key`.
    fn resolve_name(&self, name: &str) -> Result<Option<Hash256>, StoreError>;
}

/// A single checkpoint transaction. Reads observe this transaction's
/// own not-yet-committed writes as well as the store's existing
/// contents, so a checkpoint can write a node and immediately
/// reference it without a round trip through `commit`.
pub trait CheckpointTx {
    fn get(&self, key: Hash256) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key` if absent. Content-addressed nodes
    /// are immutable once written, so an existing entry for `key` is
    /// left untouched rather than overwritten.
    fn put_if_absent(&mut self, key: Hash256, value: Vec<u8>) -> Result<(), StoreError>;

    fn contains(&self, key: Hash256) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Commits every write made through this transaction. Consumes the
    /// transaction since a store must never be written through twice.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

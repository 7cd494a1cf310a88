//! Error boundaries for the checkpoint layer. [`StoreError`] is a
//! backend failure (a lock poisoned, an I/O error in a real backend);
//! [`CheckpointError`] is the checkpoint protocol's own failure mode.

use thiserror::Error;

use avm_core::{Hash256, LoadError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to acquire the store lock")]
    LockPoisoned,
    #[error("backend I/O error: {0}")]
    Io(String),
}

/// Spec §9 leaves checkpoint retry behavior as an open question; this
/// port treats a failed checkpoint as terminal rather than retrying
/// internally, since a partial write makes the store's state for this
/// root ambiguous and a caller is better placed to decide whether to
/// retry against a fresh transaction.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint store backend failed: {0}")]
    Store(#[from] StoreError),
    #[error("checkpoint is missing node for hash {0:#x}")]
    MissingNode(Hash256),
    #[error("stored node for hash {0:#x} is malformed: {1}")]
    Corrupt(Hash256, LoadError),
    #[error("checkpoint transaction aborted after a failed write")]
    Aborted,
}

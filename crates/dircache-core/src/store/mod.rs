//! Key-value store abstraction.

mod sled_store;

pub use sled_store::SledStore;

use crate::error::Error;

/// Reserved key holding the durable replication cursor.
pub const CHANGENUMBER_KEY: &str = "changenumber";

/// Reserved presence-only key marking a cache that has not caught up yet.
pub const VIRGIN_KEY: &str = "virgin";

/// One queued store mutation.
///
/// Batches are built by the write cache one change entry at a time and
/// applied through [`KvStore::apply_batch`] as a single atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write a plain value.
    Set {
        /// Cache key.
        key: String,
        /// Value to store.
        value: String,
    },
    /// Remove a plain value.
    Delete {
        /// Cache key.
        key: String,
    },
    /// Add a member to a set key.
    AddMember {
        /// Set key.
        key: String,
        /// Member to add.
        member: String,
    },
    /// Remove a member from a set key.
    RemoveMember {
        /// Set key.
        key: String,
        /// Member to remove.
        member: String,
    },
}

/// Persistent key-value store the cache is replicated into.
///
/// `apply_batch` must be all-or-nothing: a failed batch leaves every key
/// untouched. The replicator is the sole writer of the reserved
/// [`CHANGENUMBER_KEY`] and [`VIRGIN_KEY`] keys; health-check readers may
/// share the store handle.
pub trait KvStore: Send + Sync {
    /// Read a plain value.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a plain value.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a plain value.
    fn delete(&self, key: &str) -> Result<(), Error>;

    /// Members of a set key, reflecting committed state only.
    fn members(&self, key: &str) -> Result<Vec<String>, Error>;

    /// Apply the queued operations as one atomic unit.
    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), Error>;
}

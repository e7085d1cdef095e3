//! Batched write-through cache overlay.
//!
//! A [`WriteCache`] stages the store mutations for exactly one change
//! entry. Writes go into an in-memory overlay and the batch queue; reads
//! are served from the overlay first so a change's own staged writes are
//! visible to later reads in the same transform invocation without extra
//! store round trips. Nothing touches committed state until
//! [`WriteCache::commit`] applies the whole queue atomically.

use std::collections::HashMap;

use crate::error::Error;
use crate::store::{BatchOp, KvStore};

/// Capability set a transform gets for building one change's mutations.
pub trait TxnView {
    /// Read a key: the transaction's own staged value if present, the
    /// committed store value otherwise.
    fn get(&mut self, key: &str) -> Result<Option<String>, Error>;

    /// Queue a write, visible to later `get` calls in this transaction.
    fn set(&mut self, key: &str, value: &str);

    /// Queue a deletion.
    fn delete(&mut self, key: &str);

    /// Committed members of a set key; never reflects the pending batch.
    fn members(&self, key: &str) -> Result<Vec<String>, Error>;

    /// Queue adding a member to a set key.
    fn add_member(&mut self, key: &str, member: &str);

    /// Queue removing a member from a set key.
    fn remove_member(&mut self, key: &str, member: &str);
}

/// Staged mutations for one change entry.
///
/// The overlay maps keys to their most-recently-queued value and doubles as
/// a read cache for store fall-throughs. It has no existence beyond this
/// transaction: commit consumes the cache, and a failed commit leaves the
/// store untouched (the batch is all-or-nothing).
pub struct WriteCache<'a, S: KvStore> {
    store: &'a S,
    ops: Vec<BatchOp>,
    overlay: HashMap<String, String>,
}

impl<'a, S: KvStore> WriteCache<'a, S> {
    /// Open a transaction against the store.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            ops: Vec::new(),
            overlay: HashMap::new(),
        }
    }

    /// The queued operation set, in queue order.
    pub fn operations(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Whether any operations have been queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit every queued operation as one atomic store batch.
    pub fn commit(self) -> Result<(), Error> {
        self.store.apply_batch(&self.ops)
    }
}

impl<S: KvStore> TxnView for WriteCache<'_, S> {
    fn get(&mut self, key: &str) -> Result<Option<String>, Error> {
        if let Some(value) = self.overlay.get(key) {
            return Ok(Some(value.clone()));
        }
        let value = self.store.get(key)?;
        if let Some(value) = &value {
            self.overlay.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.overlay.insert(key.to_string(), value.to_string());
        self.ops.push(BatchOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn delete(&mut self, key: &str) {
        self.overlay.remove(key);
        self.ops.push(BatchOp::Delete {
            key: key.to_string(),
        });
    }

    fn members(&self, key: &str) -> Result<Vec<String>, Error> {
        self.store.members(key)
    }

    fn add_member(&mut self, key: &str, member: &str) {
        self.ops.push(BatchOp::AddMember {
            key: key.to_string(),
            member: member.to_string(),
        });
    }

    fn remove_member(&mut self, key: &str, member: &str) {
        self.ops.push(BatchOp::RemoveMember {
            key: key.to_string(),
            member: member.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper counting fall-through reads.
    struct CountingStore {
        inner: SledStore,
        gets: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            let db = sled::Config::new().temporary(true).open().unwrap();
            Self {
                inner: SledStore::from_db(db).unwrap(),
                gets: AtomicUsize::new(0),
            }
        }

        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    impl KvStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), Error> {
            self.inner.delete(key)
        }

        fn members(&self, key: &str) -> Result<Vec<String>, Error> {
            self.inner.members(key)
        }

        fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), Error> {
            self.inner.apply_batch(ops)
        }
    }

    #[test]
    fn test_read_your_writes_without_store_access() {
        let store = CountingStore::new();
        let mut txn = WriteCache::new(&store);

        txn.set("account:bob", "{}");
        assert_eq!(txn.get("account:bob").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.gets(), 0);
    }

    #[test]
    fn test_fallthrough_populates_overlay() {
        let store = CountingStore::new();
        store.set("account:amy", "{}").unwrap();

        let mut txn = WriteCache::new(&store);
        assert_eq!(txn.get("account:amy").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.gets(), 1);

        // Second read comes from the overlay.
        assert_eq!(txn.get("account:amy").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.gets(), 1);
    }

    #[test]
    fn test_absent_key_not_cached() {
        let store = CountingStore::new();
        let mut txn = WriteCache::new(&store);

        assert!(txn.get("missing").unwrap().is_none());
        assert!(txn.get("missing").unwrap().is_none());
        assert_eq!(store.gets(), 2);
    }

    #[test]
    fn test_members_bypass_overlay() {
        let store = CountingStore::new();
        store
            .apply_batch(&[BatchOp::AddMember {
                key: "group:ops".to_string(),
                member: "alice".to_string(),
            }])
            .unwrap();

        let mut txn = WriteCache::new(&store);
        txn.add_member("group:ops", "bob");

        // Only the committed member is visible before commit.
        assert_eq!(txn.members("group:ops").unwrap(), vec!["alice"]);

        txn.commit().unwrap();
        let mut members = store.members("group:ops").unwrap();
        members.sort();
        assert_eq!(members, vec!["alice", "bob"]);
    }

    #[test]
    fn test_delete_clears_overlay_entry() {
        let store = CountingStore::new();
        let mut txn = WriteCache::new(&store);

        txn.set("k", "v");
        txn.delete("k");

        // Falls through to the (empty) store rather than the stale overlay.
        assert!(txn.get("k").unwrap().is_none());
        assert_eq!(store.gets(), 1);
    }

    #[test]
    fn test_operations_recorded_in_queue_order() {
        let store = CountingStore::new();
        let mut txn = WriteCache::new(&store);

        txn.set("a", "1");
        txn.add_member("g", "m");
        txn.delete("b");

        assert_eq!(
            txn.operations(),
            &[
                BatchOp::Set {
                    key: "a".to_string(),
                    value: "1".to_string()
                },
                BatchOp::AddMember {
                    key: "g".to_string(),
                    member: "m".to_string()
                },
                BatchOp::Delete {
                    key: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_nothing_visible_before_commit() {
        let store = CountingStore::new();
        let mut txn = WriteCache::new(&store);

        txn.set("account:bob", "{}");
        assert!(store.inner.get("account:bob").unwrap().is_none());

        txn.commit().unwrap();
        assert_eq!(store.inner.get("account:bob").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_empty_commit() {
        let store = CountingStore::new();
        let txn = WriteCache::new(&store);
        assert!(txn.is_empty());
        txn.commit().unwrap();
    }
}

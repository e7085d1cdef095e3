//! Sled-backed cache store.

use sled::{Db, Tree};

use super::{BatchOp, KvStore};
use crate::error::Error;

/// Tree name for cache data.
const CACHE_TREE: &str = "cache";

/// Prefix for plain value keys.
const VALUE_PREFIX: &[u8] = b"v:";

/// Prefix for set-membership keys.
const MEMBER_PREFIX: &[u8] = b"s:";

/// Read-optimized cache store backed by sled.
///
/// Plain values live under `v:<key>`. Set members are presence keys under
/// `s:<key>\0<member>`, so listing a set is a prefix scan and every batch
/// stays within one tree, which keeps [`KvStore::apply_batch`] atomic via
/// `sled::Tree::apply_batch`.
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Wrap an already-open sled database.
    pub fn from_db(db: Db) -> Result<Self, Error> {
        let tree = db.open_tree(CACHE_TREE)?;
        Ok(Self { db, tree })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.tree.flush()?;
        Ok(())
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    fn value_key(key: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(VALUE_PREFIX.len() + key.len());
        bytes.extend_from_slice(VALUE_PREFIX);
        bytes.extend_from_slice(key.as_bytes());
        bytes
    }

    fn member_prefix(key: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MEMBER_PREFIX.len() + key.len() + 1);
        bytes.extend_from_slice(MEMBER_PREFIX);
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(0); // Null separator
        bytes
    }

    fn member_key(key: &str, member: &str) -> Vec<u8> {
        let mut bytes = Self::member_prefix(key);
        bytes.extend_from_slice(member.as_bytes());
        bytes
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<String, Error> {
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Encoding(key.to_string()))
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self.tree.get(Self::value_key(key))? {
            Some(bytes) => Ok(Some(Self::decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.tree.insert(Self::value_key(key), value.as_bytes())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.tree.remove(Self::value_key(key))?;
        Ok(())
    }

    fn members(&self, key: &str) -> Result<Vec<String>, Error> {
        let prefix = Self::member_prefix(key);
        let mut members = Vec::new();
        for result in self.tree.scan_prefix(&prefix) {
            let (member_key, _) = result?;
            members.push(Self::decode(key, &member_key[prefix.len()..])?);
        }
        Ok(members)
    }

    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), Error> {
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                BatchOp::Set { key, value } => {
                    batch.insert(Self::value_key(key), value.as_bytes());
                }
                BatchOp::Delete { key } => {
                    batch.remove(Self::value_key(key));
                }
                BatchOp::AddMember { key, member } => {
                    batch.insert(Self::member_key(key, member), &[]);
                }
                BatchOp::RemoveMember { key, member } => {
                    batch.remove(Self::member_key(key, member));
                }
            }
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}

//! Transform for feeds that ship pre-mapped cache mutations.

use serde::Deserialize;
use serde_json::Value;

use dircache_core::{ChangeEntry, Error, Transform, TxnView};

/// One pre-mapped cache mutation carried in a change entry.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum CacheOp {
    /// Write a value.
    Set { key: String, value: Value },
    /// Remove a value.
    Del { key: String },
    /// Add a member to a set key.
    Sadd { key: String, member: String },
    /// Remove a member from a set key.
    Srem { key: String, member: String },
}

/// Applies change payloads whose elements are already cache mutations.
///
/// The directory feed does the domain-specific mapping from raw directory
/// modifications to cache keys; this transform only stages the resulting
/// operations. String values are stored as-is, anything else as compact
/// JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectTransform;

impl Transform for DirectTransform {
    fn apply(
        &self,
        txn: &mut dyn TxnView,
        changes: &[Value],
        entry: &ChangeEntry,
    ) -> Result<(), Error> {
        for change in changes {
            let op: CacheOp = serde_json::from_value(change.clone()).map_err(|e| {
                Error::Transform(format!(
                    "changenumber {}: unrecognized change op: {e}",
                    entry.changenumber
                ))
            })?;
            match op {
                CacheOp::Set { key, value } => {
                    let encoded = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    txn.set(&key, &encoded);
                }
                CacheOp::Del { key } => txn.delete(&key),
                CacheOp::Sadd { key, member } => txn.add_member(&key, &member),
                CacheOp::Srem { key, member } => txn.remove_member(&key, &member),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dircache_core::{BatchOp, KvStore, SledStore, WriteCache};

    fn test_store() -> SledStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledStore::from_db(db).unwrap()
    }

    fn apply(changes: &str) -> Result<Vec<BatchOp>, Error> {
        let store = test_store();
        let mut txn = WriteCache::new(&store);
        let entry = ChangeEntry::new("1", changes);
        DirectTransform.apply(&mut txn, &entry.decode_changes()?, &entry)?;
        Ok(txn.operations().to_vec())
    }

    #[test]
    fn test_applies_all_op_kinds() {
        let ops = apply(
            r#"[
                {"op":"set","key":"account:bob","value":"{\"uuid\":\"b1\"}"},
                {"op":"del","key":"stale"},
                {"op":"sadd","key":"group:ops","member":"bob"},
                {"op":"srem","key":"group:ops","member":"amy"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![
                BatchOp::Set {
                    key: "account:bob".to_string(),
                    value: r#"{"uuid":"b1"}"#.to_string(),
                },
                BatchOp::Delete {
                    key: "stale".to_string(),
                },
                BatchOp::AddMember {
                    key: "group:ops".to_string(),
                    member: "bob".to_string(),
                },
                BatchOp::RemoveMember {
                    key: "group:ops".to_string(),
                    member: "amy".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_non_string_values_stored_as_json() {
        let ops = apply(r#"[{"op":"set","key":"k","value":{"uuid":"b1","approved":true}}]"#)
            .unwrap();
        assert_eq!(
            ops,
            vec![BatchOp::Set {
                key: "k".to_string(),
                value: r#"{"approved":true,"uuid":"b1"}"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_op_is_a_transform_error() {
        let err = apply(r#"[{"op":"rename","key":"a"}]"#).unwrap_err();
        assert!(matches!(err, Error::Transform(msg) if msg.contains("changenumber 1")));
    }

    #[test]
    fn test_staged_set_visible_to_reads() {
        let store = test_store();
        let mut txn = WriteCache::new(&store);
        let entry = ChangeEntry::new("2", r#"[{"op":"set","key":"account:amy","value":"{}"}]"#);

        DirectTransform
            .apply(&mut txn, &entry.decode_changes().unwrap(), &entry)
            .unwrap();

        assert_eq!(txn.get("account:amy").unwrap().as_deref(), Some("{}"));
        assert!(store.get("account:amy").unwrap().is_none());
    }
}

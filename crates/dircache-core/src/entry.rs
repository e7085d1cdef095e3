//! Change entry data model.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One record from the directory change log.
///
/// Entries are produced by a [`ChangeSource`](crate::ChangeSource) in
/// strictly increasing changenumber order and consumed exactly once. The
/// `changes` field carries a JSON-encoded list of change operations whose
/// shape is a contract between the feed and the configured transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Position in the directory change log, as a decimal string.
    pub changenumber: String,
    /// JSON-encoded list of change operations.
    pub changes: String,
}

impl ChangeEntry {
    /// Create a change entry.
    pub fn new(changenumber: impl Into<String>, changes: impl Into<String>) -> Self {
        Self {
            changenumber: changenumber.into(),
            changes: changes.into(),
        }
    }

    /// Parse the changenumber field as an integer sequence number.
    pub fn changenumber(&self) -> Result<u64, Error> {
        self.changenumber
            .parse()
            .map_err(|_| Error::Changenumber(self.changenumber.clone()))
    }

    /// Decode the changes payload into its list of change operations.
    pub fn decode_changes(&self) -> Result<Vec<serde_json::Value>, Error> {
        Ok(serde_json::from_str(&self.changes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changenumber_parses() {
        let entry = ChangeEntry::new("17", "[]");
        assert_eq!(entry.changenumber().unwrap(), 17);
    }

    #[test]
    fn test_changenumber_rejects_non_numeric() {
        let entry = ChangeEntry::new("seventeen", "[]");
        assert!(matches!(
            entry.changenumber(),
            Err(Error::Changenumber(raw)) if raw == "seventeen"
        ));
    }

    #[test]
    fn test_decode_changes() {
        let entry = ChangeEntry::new("1", r#"[{"op":"set","key":"a"},{"op":"del","key":"b"}]"#);
        let changes = entry.decode_changes().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["op"], "set");
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let entry = ChangeEntry::new("1", "not json");
        assert!(matches!(entry.decode_changes(), Err(Error::Changes(_))));
    }

    #[test]
    fn test_serde_field_names() {
        let json = r#"{"changenumber":"3","changes":"[]"}"#;
        let entry: ChangeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry, ChangeEntry::new("3", "[]"));
        let back = serde_json::to_string(&entry).unwrap();
        assert_eq!(back, json);
    }
}

//! Core error types.

use thiserror::Error;

/// Core replication errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Key-value store error.
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    /// Store backend error for non-sled implementations.
    #[error("store error: {0}")]
    Backend(String),

    /// Stored value is not valid UTF-8.
    #[error("invalid utf-8 in stored value for key {0:?}")]
    Encoding(String),

    /// A change entry's payload could not be decoded.
    #[error("malformed changes payload: {0}")]
    Changes(#[from] serde_json::Error),

    /// A change entry's changenumber is not a decimal integer.
    #[error("invalid changenumber {0:?}")]
    Changenumber(String),

    /// A transform rejected a change entry.
    #[error("transform error: {0}")]
    Transform(String),

    /// The change source will deliver no further entries.
    #[error("change source closed")]
    SourceClosed,

    /// Change feed I/O error.
    #[error("feed error: {0}")]
    Io(#[from] std::io::Error),

    /// Change feed protocol error.
    #[error("feed error: {0}")]
    Feed(String),
}

/// Terminal outcome of the replication loop.
///
/// `Fatal` means the infrastructure failed (store or source) and nothing
/// downstream is trustworthy; the embedding process should exit with a
/// non-zero status and leave the restart to its supervisor. `Halted` means
/// a single change could not be transformed or committed under the halt
/// policy: durable state is intact as of the last successful commit and the
/// loop has stopped pulling changes.
#[derive(Debug, Error)]
pub enum RunError {
    /// Infrastructure failure outside any change cycle.
    #[error("infrastructure failure: {0}")]
    Fatal(#[source] Error),

    /// A change entry could not be applied.
    #[error("replication halted at changenumber {changenumber}: {source}")]
    Halted {
        /// Changenumber of the entry that could not be applied.
        changenumber: String,
        /// The underlying transform, decode, or commit failure.
        #[source]
        source: Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halted_display_names_the_entry() {
        let err = RunError::Halted {
            changenumber: "42".to_string(),
            source: Error::Transform("boom".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("42"));
        assert!(rendered.contains("transform error"));
    }

    #[test]
    fn test_fatal_wraps_source() {
        let err = RunError::Fatal(Error::SourceClosed);
        assert!(err.to_string().contains("change source closed"));
    }
}

//! dircache core: replication of a sequential directory change stream into
//! a read-optimized key-value cache.
//!
//! The replicator pulls one change entry at a time from a [`ChangeSource`],
//! hands it to a [`Transform`] that stages cache mutations in a
//! [`WriteCache`] transaction, and commits the staged batch atomically
//! together with the durable changenumber cursor. A presence-only virgin
//! flag tells health-check readers when the cache has not yet replayed
//! enough of the change log to be safe to serve from.
//!
//! The crate is embeddable: the change source, the per-change transform,
//! and the key-value store are all trait seams. A sled-backed store
//! ([`SledStore`]) and a channel-backed source ([`QueueSource`]) ship here;
//! the long-running daemon lives in the `dircache-replicator` crate.

pub mod cache;
pub mod entry;
pub mod error;
pub mod replicator;
pub mod source;
pub mod store;
pub mod transform;

pub use cache::{TxnView, WriteCache};
pub use entry::ChangeEntry;
pub use error::{Error, RunError};
pub use replicator::{recover, ChangeErrorPolicy, RecoveredState, Replicator};
pub use source::{queue_source, ChangeSource, QueueHandle, QueueSource};
pub use store::{BatchOp, KvStore, SledStore, CHANGENUMBER_KEY, VIRGIN_KEY};
pub use transform::Transform;

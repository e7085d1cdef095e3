//! Replication orchestrator.
//!
//! Owns the bootstrap recovery, the changenumber cursor, and the serial
//! poll → transform → commit loop that moves directory changes into the
//! cache store.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::cache::{TxnView, WriteCache};
use crate::entry::ChangeEntry;
use crate::error::{Error, RunError};
use crate::source::ChangeSource;
use crate::store::{KvStore, CHANGENUMBER_KEY, VIRGIN_KEY};
use crate::transform::Transform;

/// Policy for change entries that fail to decode, transform, or commit.
///
/// The upstream system left retry/skip/fatal semantics for per-change
/// failures unresolved; halting is the observed behavior and the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeErrorPolicy {
    /// Stop pulling changes; durable state stays at the last good commit.
    #[default]
    Halt,
    /// Log the failure and continue with the next entry.
    Skip,
}

/// Replication state recovered from the store at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredState {
    /// Last durably applied changenumber, 0 for a fresh store.
    pub changenumber: u64,
    /// Whether the cache is not yet safe to serve from.
    pub virgin: bool,
}

/// Read the durable cursor and virgin flag, seeding both for a fresh store.
///
/// The two reads are independent and order-free. A store with no cursor is
/// virgin: the cursor starts at 0 and the virgin flag is persisted so
/// health-check readers know the cache is still populating. The flag is
/// never written when a cursor already exists. Any store error is fatal to
/// the caller.
pub fn recover<S: KvStore>(store: &S) -> Result<RecoveredState, Error> {
    let virgin_flag = store.get(VIRGIN_KEY)?;
    let cursor = store.get(CHANGENUMBER_KEY)?;

    let mut virgin = virgin_flag.is_some();
    if virgin {
        info!("virgin flag is set");
    }

    let changenumber = match cursor {
        Some(raw) => raw.parse().map_err(|_| Error::Changenumber(raw))?,
        None => {
            info!("no changenumber in store");
            virgin = true;
            store.set(VIRGIN_KEY, "true")?;
            0
        }
    };

    info!(changenumber, virgin, "recovered replication state");
    Ok(RecoveredState {
        changenumber,
        virgin,
    })
}

/// The replication orchestrator.
///
/// Strictly sequential: at most one outstanding change request, at most one
/// open transaction, entries applied in exactly the order the source
/// delivers them. The durable cursor only ever moves forward.
pub struct Replicator<S: KvStore, C: ChangeSource, T: Transform> {
    store: Arc<S>,
    source: C,
    transform: T,
    changenumber: u64,
    fresh: Option<oneshot::Receiver<()>>,
    policy: ChangeErrorPolicy,
}

impl<S: KvStore, C: ChangeSource, T: Transform> Replicator<S, C, T> {
    /// Wire up a replicator from recovered state.
    ///
    /// When the store is virgin the source's fresh signal is armed so the
    /// virgin flag gets cleared once the source reaches the live tail.
    pub fn new(
        store: Arc<S>,
        mut source: C,
        transform: T,
        state: RecoveredState,
        policy: ChangeErrorPolicy,
    ) -> Self {
        let fresh = if state.virgin {
            source.fresh_signal()
        } else {
            None
        };
        Self {
            store,
            source,
            transform,
            changenumber: state.changenumber,
            fresh,
            policy,
        }
    }

    /// Last applied changenumber held in memory.
    pub fn changenumber(&self) -> u64 {
        self.changenumber
    }

    /// Run the steady-state loop.
    ///
    /// Returns only on an infrastructure failure or, under the halt policy,
    /// on the first change entry that fails to apply.
    pub async fn run(&mut self) -> Result<(), RunError> {
        loop {
            let entry = self.next_change().await.map_err(RunError::Fatal)?;
            match self.apply_entry(entry) {
                Ok(()) => {}
                Err(halted) if self.policy == ChangeErrorPolicy::Skip => {
                    warn!(error = %halted, "skipping failed change entry");
                }
                Err(halted) => return Err(halted),
            }
        }
    }

    /// Wait for the next entry, racing the fresh signal while it is armed.
    ///
    /// The first fresh notification deletes the virgin flag exactly once; a
    /// store error during that deletion is fatal. A fresh sender dropped
    /// without firing just disarms the wait and leaves the flag for the
    /// next run.
    async fn next_change(&mut self) -> Result<ChangeEntry, Error> {
        if let Some(mut fresh) = self.fresh.take() {
            tokio::select! {
                notified = &mut fresh => {
                    if notified.is_ok() {
                        info!(
                            changenumber = self.changenumber,
                            "cache caught up, removing virgin flag"
                        );
                        self.store.delete(VIRGIN_KEY)?;
                    }
                }
                entry = self.source.next_change() => {
                    self.fresh = Some(fresh);
                    return entry;
                }
            }
        }
        self.source.next_change().await
    }

    /// Transform and commit one change entry.
    ///
    /// The changenumber write is queued into the same batch as the
    /// transform's mutations only when the entry strictly advances the
    /// cursor, so duplicates and replays never regress the durable value.
    /// The transform itself still runs for non-advancing entries.
    fn apply_entry(&mut self, entry: ChangeEntry) -> Result<(), RunError> {
        debug!(changenumber = %entry.changenumber, "got entry");

        let changes = match entry.decode_changes() {
            Ok(changes) => changes,
            Err(e) => {
                error!(error = %e, changenumber = %entry.changenumber, "undecodable changes payload");
                return Err(Self::halted(&entry, e));
            }
        };

        let mut txn = WriteCache::new(self.store.as_ref());

        if let Err(e) = self.transform.apply(&mut txn, &changes, &entry) {
            error!(error = %e, ops = ?txn.operations(), "transform error");
            return Err(Self::halted(&entry, e));
        }

        let changenumber = match entry.changenumber() {
            Ok(changenumber) => changenumber,
            Err(e) => return Err(Self::halted(&entry, e)),
        };

        if self.changenumber < changenumber {
            info!(changenumber, "updating changenumber");
            txn.set(CHANGENUMBER_KEY, &changenumber.to_string());
            self.changenumber = changenumber;
        } else {
            debug!(
                changenumber,
                cursor = self.changenumber,
                "no changenumber update"
            );
        }

        debug!(ops = ?txn.operations(), "executing batch");
        let ops = txn.operations().to_vec();
        if let Err(e) = txn.commit() {
            error!(error = %e, ops = ?ops, "error executing batch");
            return Err(Self::halted(&entry, e));
        }

        Ok(())
    }

    fn halted(entry: &ChangeEntry, source: Error) -> RunError {
        RunError::Halted {
            changenumber: entry.changenumber.clone(),
            source,
        }
    }
}

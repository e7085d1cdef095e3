//! Per-change transform contract.

use serde_json::Value;

use crate::cache::TxnView;
use crate::entry::ChangeEntry;
use crate::error::Error;

/// Maps one decoded directory change into cache mutations.
///
/// A transform queues zero or more operations into the transaction via the
/// [`TxnView`] write path; nothing becomes externally visible until the
/// replicator commits the batch. Reporting an error therefore never leaves
/// partially applied committed state behind.
pub trait Transform {
    /// Stage the mutations for one change entry.
    fn apply(
        &self,
        txn: &mut dyn TxnView,
        changes: &[Value],
        entry: &ChangeEntry,
    ) -> Result<(), Error>;
}

impl<F> Transform for F
where
    F: Fn(&mut dyn TxnView, &[Value], &ChangeEntry) -> Result<(), Error>,
{
    fn apply(
        &self,
        txn: &mut dyn TxnView,
        changes: &[Value],
        entry: &ChangeEntry,
    ) -> Result<(), Error> {
        self(txn, changes, entry)
    }
}

//! Change source contract and the channel-backed queue source.

use tokio::sync::{mpsc, oneshot};

use crate::entry::ChangeEntry;
use crate::error::Error;

/// Ordered producer of directory change entries.
///
/// Implementations deliver entries with monotonically increasing
/// changenumbers and fire the fresh signal at most once, when the source
/// has caught up to the live tail of the change log. The replicator keeps
/// at most one `next_change` call outstanding and may race it against the
/// fresh signal, so the returned future must be cancel-safe: dropping it
/// must not lose an entry.
#[allow(async_fn_in_trait)]
pub trait ChangeSource {
    /// Wait for the next change entry.
    async fn next_change(&mut self) -> Result<ChangeEntry, Error>;

    /// Take the one-shot receiver for the fresh notification.
    ///
    /// Returns `None` once the receiver has been taken.
    fn fresh_signal(&mut self) -> Option<oneshot::Receiver<()>>;
}

/// In-process change source fed through a bounded channel.
///
/// Used by embedders that drive their own feed connection, and by tests.
pub struct QueueSource {
    rx: mpsc::Receiver<ChangeEntry>,
    fresh: Option<oneshot::Receiver<()>>,
}

/// Producer half of a [`QueueSource`].
pub struct QueueHandle {
    tx: mpsc::Sender<ChangeEntry>,
    fresh: Option<oneshot::Sender<()>>,
}

/// Create a connected handle/source pair with the given queue capacity.
pub fn queue_source(capacity: usize) -> (QueueHandle, QueueSource) {
    let (tx, rx) = mpsc::channel(capacity);
    let (fresh_tx, fresh_rx) = oneshot::channel();
    (
        QueueHandle {
            tx,
            fresh: Some(fresh_tx),
        },
        QueueSource {
            rx,
            fresh: Some(fresh_rx),
        },
    )
}

impl ChangeSource for QueueSource {
    async fn next_change(&mut self) -> Result<ChangeEntry, Error> {
        self.rx.recv().await.ok_or(Error::SourceClosed)
    }

    fn fresh_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.fresh.take()
    }
}

impl QueueHandle {
    /// Deliver one entry, waiting for queue capacity.
    pub async fn push(&self, entry: ChangeEntry) -> Result<(), Error> {
        self.tx.send(entry).await.map_err(|_| Error::SourceClosed)
    }

    /// Signal that the source has caught up to the live tail. Idempotent.
    pub fn mark_fresh(&mut self) {
        if let Some(tx) = self.fresh.take() {
            let _ = tx.send(());
        }
    }
}

//! Directory feed poller.
//!
//! Streams change entries from the directory feed over a newline-delimited
//! JSON protocol. On connect the poller announces its cursor with
//! `SYNC <changenumber>`; the feed replies with `change` frames strictly
//! after that changenumber, in order, and a single `fresh` frame once the
//! stream has reached the live tail of the change log. Lost connections
//! are retried after the poll interval, resuming from the last delivered
//! changenumber.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use dircache_core::{ChangeEntry, ChangeSource, Error};

/// One frame of the feed protocol.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FeedFrame {
    /// A change entry.
    Change {
        changenumber: String,
        changes: String,
    },
    /// The feed has caught up to the live tail.
    Fresh,
}

/// Connection parameters for the directory feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed address (host:port).
    pub address: String,
    /// Connect timeout. None waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Delay between reconnect attempts.
    pub poll_interval: Duration,
}

/// Reconnecting change source over the directory feed.
pub struct FeedPoller {
    config: FeedConfig,
    changenumber: u64,
    lines: Option<Lines<BufReader<TcpStream>>>,
    fresh_tx: Option<oneshot::Sender<()>>,
    fresh_rx: Option<oneshot::Receiver<()>>,
}

impl FeedPoller {
    /// Create a poller resuming after the given changenumber.
    pub fn new(config: FeedConfig, changenumber: u64) -> Self {
        let (fresh_tx, fresh_rx) = oneshot::channel();
        Self {
            config,
            changenumber,
            lines: None,
            fresh_tx: Some(fresh_tx),
            fresh_rx: Some(fresh_rx),
        }
    }

    async fn connect(&mut self) -> Result<(), Error> {
        let connect = TcpStream::connect(&self.config.address);
        let mut stream = match self.config.connect_timeout {
            Some(limit) => timeout(limit, connect).await.map_err(|_| {
                Error::Feed(format!("connect to {} timed out", self.config.address))
            })??,
            None => connect.await?,
        };

        stream
            .write_all(format!("SYNC {}\n", self.changenumber).as_bytes())
            .await?;

        info!(
            address = %self.config.address,
            changenumber = self.changenumber,
            "connected to directory feed"
        );
        self.lines = Some(BufReader::new(stream).lines());
        Ok(())
    }

    fn reset(&mut self) {
        self.lines = None;
    }

    fn decode(line: &str) -> Result<FeedFrame, Error> {
        serde_json::from_str(line).map_err(|e| Error::Feed(format!("bad feed frame: {e}")))
    }
}

impl ChangeSource for FeedPoller {
    async fn next_change(&mut self) -> Result<ChangeEntry, Error> {
        loop {
            let lines = match self.lines.as_mut() {
                Some(lines) => lines,
                None => {
                    if let Err(e) = self.connect().await {
                        warn!(error = %e, "feed connect failed, retrying");
                        sleep(self.config.poll_interval).await;
                    }
                    continue;
                }
            };

            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Self::decode(&line)? {
                        FeedFrame::Change {
                            changenumber,
                            changes,
                        } => {
                            let entry = ChangeEntry::new(changenumber, changes);
                            if let Ok(number) = entry.changenumber() {
                                self.changenumber = number;
                            }
                            debug!(changenumber = %entry.changenumber, "feed delivered entry");
                            return Ok(entry);
                        }
                        FeedFrame::Fresh => {
                            info!("feed caught up to live tail");
                            if let Some(tx) = self.fresh_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                    }
                }
                Ok(None) => {
                    info!("feed connection closed, reconnecting");
                    self.reset();
                    sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "feed read error, reconnecting");
                    self.reset();
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    fn fresh_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.fresh_rx.take()
    }
}

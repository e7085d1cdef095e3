//! Replicator daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dircache_core::ChangeErrorPolicy;

/// Default directory feed address.
pub const DEFAULT_FEED_ADDRESS: &str = "127.0.0.1:3890";

/// Default feed connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default reconnect poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Replicator daemon configuration.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Path to the cache storage directory.
    pub data_path: PathBuf,

    /// Directory feed address (host:port).
    pub feed_address: String,

    /// Feed connect timeout. None disables the timeout.
    pub connect_timeout: Option<Duration>,

    /// Interval between feed reconnect attempts.
    pub poll_interval: Duration,

    /// What to do with change entries that fail to apply.
    pub on_change_error: ChangeErrorPolicy,
}

impl ReplicatorConfig {
    /// Create a configuration with the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            feed_address: DEFAULT_FEED_ADDRESS.to_string(),
            connect_timeout: Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            on_change_error: ChangeErrorPolicy::Halt,
        }
    }

    /// Set the feed address.
    pub fn with_feed_address(mut self, address: impl Into<String>) -> Self {
        self.feed_address = address.into();
        self
    }

    /// Set the feed connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disable the feed connect timeout.
    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Set the reconnect poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Skip failed change entries instead of halting.
    pub fn skip_failed_changes(mut self) -> Self {
        self.on_change_error = ChangeErrorPolicy::Skip;
        self
    }
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}

/// Command-line arguments for the replicator daemon.
#[derive(Parser, Debug)]
#[command(name = "dircache-replicator")]
#[command(version, about = "Directory change replicator", long_about = None)]
pub struct Args {
    /// Path to the cache storage directory.
    #[arg(short, long, default_value = "./data")]
    pub data_path: PathBuf,

    /// Directory feed address (host:port).
    #[arg(long, default_value = DEFAULT_FEED_ADDRESS)]
    pub feed: String,

    /// Feed connect timeout in seconds. Set to 0 to disable.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Feed reconnect poll interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval: u64,

    /// Skip change entries that fail to apply instead of halting.
    #[arg(long)]
    pub skip_failed: bool,
}

impl Args {
    /// Convert command-line arguments to a replicator configuration.
    pub fn into_config(self) -> ReplicatorConfig {
        let connect_timeout = if self.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout))
        };

        let on_change_error = if self.skip_failed {
            ChangeErrorPolicy::Skip
        } else {
            ChangeErrorPolicy::Halt
        };

        ReplicatorConfig {
            data_path: self.data_path,
            feed_address: self.feed,
            connect_timeout,
            poll_interval: Duration::from_millis(self.poll_interval),
            on_change_error,
        }
    }
}

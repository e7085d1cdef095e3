//! dircache replicator daemon library.
//!
//! Wires the core replicator to a concrete deployment: a TCP directory
//! feed, the pre-mapped mutation transform, and clap-driven configuration.

pub mod config;
pub mod feed;
pub mod transform;

pub use config::{Args, ReplicatorConfig};
pub use feed::{FeedConfig, FeedPoller};
pub use transform::DirectTransform;

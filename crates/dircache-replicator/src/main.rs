//! dircache replicator - directory change replication daemon.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dircache_core::{recover, Replicator, RunError, SledStore};
use dircache_replicator::{Args, DirectTransform, FeedConfig, FeedPoller};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dircache_replicator=info,dircache_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting dircache replicator"
    );

    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        data_path = %config.data_path.display(),
        feed = %config.feed_address,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "configuration loaded"
    );

    // Without a store connection nothing downstream is trustworthy; any
    // failure from here through recovery exits non-zero and leaves the
    // restart to the supervisor.
    let store = Arc::new(SledStore::open(&config.data_path)?);
    if store.was_recovered() {
        tracing::info!("store recovered from previous run");
    }

    let state = recover(store.as_ref())?;

    let poller = FeedPoller::new(
        FeedConfig {
            address: config.feed_address.clone(),
            connect_timeout: config.connect_timeout,
            poll_interval: config.poll_interval,
        },
        state.changenumber,
    );

    let mut replicator = Replicator::new(
        store.clone(),
        poller,
        DirectTransform,
        state,
        config.on_change_error,
    );

    tracing::info!(
        changenumber = state.changenumber,
        virgin = state.virgin,
        "replicator ready"
    );

    tokio::select! {
        res = replicator.run() => match res {
            Ok(()) => {}
            Err(RunError::Halted { changenumber, source }) => {
                // Durable state is intact as of the last successful commit.
                // Stay alive making no progress so the stalled cursor stays
                // observable to external monitoring.
                tracing::error!(
                    changenumber = %changenumber,
                    error = %source,
                    "replication halted"
                );
                tokio::signal::ctrl_c().await?;
            }
            Err(RunError::Fatal(e)) => {
                tracing::error!(error = %e, "fatal replication error");
                let _ = store.flush();
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    store.flush()?;
    tracing::info!("replicator shutdown complete");
    Ok(())
}

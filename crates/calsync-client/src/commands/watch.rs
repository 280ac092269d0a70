//! Watch command.

use std::sync::Arc;

use calsync_server::{Orchestrator, Trigger, Watcher, WatcherConfig};
use tracing::{info, warn};

use super::sync::describe;
use crate::error::ClientResult;

/// Runs an initial pass, then the watcher until Ctrl-C or until no watched
/// source remains.
///
/// A failed initial pass is reported and the watcher starts anyway; it
/// retries on its own schedule.
pub async fn run(orchestrator: Arc<Orchestrator>) -> ClientResult<()> {
    println!("{}", initial_pass(&orchestrator).await);

    let watcher = Watcher::new(orchestrator, WatcherConfig::default());
    let handle = watcher.handle();
    let mut task = tokio::spawn(watcher.run());

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            true
        }
        result = &mut task => {
            if let Err(e) = result {
                warn!(error = %e, "Watcher task failed");
            }
            false
        }
    };

    if interrupted {
        info!("Interrupted, stopping watcher");
        if handle.stop().await.is_err() {
            warn!("Watcher already stopped");
        }
        if let Err(e) = task.await {
            warn!(error = %e, "Watcher task failed");
        }
    } else {
        println!("No watched sources, exiting");
    }

    Ok(())
}

async fn initial_pass(orchestrator: &Orchestrator) -> String {
    match orchestrator.run_sync(Trigger::Manual).await {
        Ok(outcome) => describe(&outcome),
        Err(e) => format!("Initial sync failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_core::{Source, SyncSettings};
    use calsync_providers::{BoxFuture, FetchError, FetchResult, Fetcher};
    use calsync_server::{MemoryStore, ServerError, ServerResult, SettingsProvider};

    struct Unreadable;

    impl SettingsProvider for Unreadable {
        fn load(&self) -> ServerResult<SyncSettings> {
            Err(ServerError::config("expected a table"))
        }
    }

    struct Offline;

    impl Fetcher for Offline {
        fn fetch<'a>(&'a self, _source: &'a Source) -> BoxFuture<'a, FetchResult<String>> {
            Box::pin(async { Err(FetchError::network("offline")) })
        }
    }

    #[tokio::test]
    async fn failed_initial_pass_is_reported_not_returned() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(
            Arc::new(Unreadable),
            Arc::new(Offline),
            store.clone(),
            store,
        );

        insta::assert_snapshot!(
            initial_pass(&orchestrator).await,
            @"Initial sync failed: Configuration error: expected a table"
        );
    }
}

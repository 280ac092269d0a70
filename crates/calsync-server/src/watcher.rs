//! Background watcher for local file sources.
//!
//! The watcher re-runs the orchestrator at the shortest `watch_interval`
//! among the currently watched sources. Each cycle re-reads the settings,
//! so sources can be added, removed or retuned while it runs. When no
//! watched source remains the watcher stops on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::orchestrator::{Orchestrator, SyncOutcome, Trigger};

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Delay before the next cycle after a failed one.
    pub retry_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(30),
        }
    }
}

impl WatcherConfig {
    /// Builder: set retry interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// Commands that can be sent to the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherCommand {
    /// Stop after the current cycle.
    Stop,
}

/// Where the loop goes after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Run again after this delay.
    Next(Duration),
    /// Nothing is watched any more.
    Finished,
}

/// The background watcher loop.
pub struct Watcher {
    orchestrator: Arc<Orchestrator>,
    config: WatcherConfig,
    command_tx: mpsc::Sender<WatcherCommand>,
    command_rx: mpsc::Receiver<WatcherCommand>,
}

impl Watcher {
    /// Creates a watcher driving `orchestrator`.
    pub fn new(orchestrator: Arc<Orchestrator>, config: WatcherConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(4);
        Self {
            orchestrator,
            config,
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for stopping the watcher.
    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Computes the delay until the next cycle from the current settings.
    pub fn schedule(&self) -> Cycle {
        match self.orchestrator.settings().load() {
            Ok(settings) => match settings.min_watch_interval() {
                Some(interval) => Cycle::Next(interval),
                None => Cycle::Finished,
            },
            Err(e) => {
                warn!(error = %e, "Failed to load settings, retrying later");
                Cycle::Next(self.config.retry_interval)
            }
        }
    }

    /// Runs one cycle: a watch-triggered pass, then the next schedule.
    pub async fn run_cycle(&self) -> Cycle {
        if self.schedule() == Cycle::Finished {
            return Cycle::Finished;
        }

        match self.orchestrator.run_sync(Trigger::Watch).await {
            Ok(SyncOutcome::Completed(report)) => {
                debug!(summary = %report, "Watch cycle synced");
            }
            Ok(outcome) => debug!(?outcome, "Watch cycle idle"),
            Err(e) => {
                warn!(error = %e, "Watch cycle failed, retrying later");
                return Cycle::Next(self.config.retry_interval);
            }
        }

        // Settings may have changed during the pass.
        self.schedule()
    }

    /// Runs until stopped or until no watched source remains.
    ///
    /// The first cycle runs one interval after the call.
    pub async fn run(mut self) {
        let mut delay = match self.schedule() {
            Cycle::Next(delay) => delay,
            Cycle::Finished => {
                info!("No watched sources, watcher not started");
                return;
            }
        };
        info!(interval_secs = delay.as_secs(), "Watcher started");

        loop {
            debug!(delay_secs = delay.as_secs(), "Scheduling next watch cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(WatcherCommand::Stop) | None => {
                            info!("Watcher stopping");
                            break;
                        }
                    }
                }
            }

            match self.run_cycle().await {
                Cycle::Next(next) => delay = next,
                Cycle::Finished => {
                    info!("No watched sources left, watcher stopping");
                    break;
                }
            }
        }
    }
}

/// Handle for stopping a running watcher.
#[derive(Clone, Debug)]
pub struct WatcherHandle {
    command_tx: mpsc::Sender<WatcherCommand>,
}

impl WatcherHandle {
    /// Stops the watcher.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<WatcherCommand>> {
        self.command_tx.send(WatcherCommand::Stop).await
    }
}

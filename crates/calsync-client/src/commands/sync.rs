//! Sync command.

use std::time::Duration;

use calsync_server::{Orchestrator, SyncOutcome, Trigger};

use crate::error::ClientResult;

/// Runs one pass and prints what happened.
pub async fn run(orchestrator: &Orchestrator, force: bool) -> ClientResult<()> {
    let trigger = if force {
        Trigger::Forced
    } else {
        Trigger::Manual
    };
    let outcome = orchestrator.run_sync(trigger).await?;
    println!("{}", describe(&outcome));
    Ok(())
}

/// Renders a sync outcome for the terminal.
pub fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Completed(report) => {
            let mut text = report.summary();
            for failure in &report.failures {
                text.push_str(&format!(
                    "\n  {} ({}): {}",
                    failure.source, failure.kind, failure.message
                ));
            }
            text
        }
        SyncOutcome::UpToDate {
            cache_age: Some(age),
        } => format!("Up to date (synced {} ago)", format_age(*age)),
        SyncOutcome::UpToDate { cache_age: None } => "Up to date".to_string(),
        SyncOutcome::NoSources => "No calendar sources configured".to_string(),
        SyncOutcome::AlreadyRunning => "A sync is already running".to_string(),
    }
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

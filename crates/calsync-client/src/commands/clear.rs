//! Clear command.

use std::io::{self, BufRead, Write};

use calsync_server::{ClearOutcome, Orchestrator};

use crate::error::{ClientError, ClientResult};

const PROMPT: &str = "Remove all indexed calendar events and cache timestamps? [y/N] ";

/// Clears the index after confirmation.
pub async fn run(orchestrator: &Orchestrator, yes: bool) -> ClientResult<()> {
    let confirmed = yes || confirm(io::stdin().lock(), io::stderr())?;

    match orchestrator.clear_all(confirmed).await? {
        ClearOutcome::Cancelled => Err(ClientError::Cancelled),
        ClearOutcome::Cleared {
            events,
            watch_timestamps,
        } => {
            println!(
                "Removed {} events and {} watch timestamps",
                events, watch_timestamps
            );
            Ok(())
        }
        ClearOutcome::AlreadyRunning => {
            println!("A sync is running, nothing was cleared");
            Ok(())
        }
    }
}

/// Asks the user to confirm. Only `y` or `yes` counts as yes.
pub fn confirm(mut input: impl BufRead, mut output: impl Write) -> ClientResult<bool> {
    output.write_all(PROMPT.as_bytes())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

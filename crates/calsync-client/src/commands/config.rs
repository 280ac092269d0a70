//! Configuration commands.

use std::path::Path;

use calsync_core::SourceBatch;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
///
/// Malformed sources are reported but do not fail validation; the sync
/// engine skips them the same way.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let batch = config.source_batch()?;
    println!("{}", validation_report(&batch));
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration and data paths.
pub fn path(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    println!("data:   {}", config.data_dir().display());
    Ok(())
}

fn validation_report(batch: &SourceBatch) -> String {
    let mut lines = vec![format!(
        "{} source(s) accepted, {} rejected",
        batch.sources.len(),
        batch.rejected.len()
    )];
    for source in &batch.sources {
        let mode = if source.is_watched() {
            format!("watched every {}s", source.watch_interval.as_secs())
        } else {
            source.scheme().to_string()
        };
        lines.push(format!("  ok   {} ({})", source.label(), mode));
    }
    for rejected in &batch.rejected {
        lines.push(format!(
            "  skip sources[{}]: {}",
            rejected.index, rejected.reason
        ));
    }
    lines.join("\n")
}

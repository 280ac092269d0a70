//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// calsync - Keep a local index of your iCalendar feeds
#[derive(Debug, Parser)]
#[command(name = "calsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync calendar sources into the local index
    Sync {
        /// Ignore the cache and refetch every source
        #[arg(long, short)]
        force: bool,
    },

    /// Remove every indexed event and cache timestamp
    Clear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Sync, then keep re-syncing watched file sources until interrupted
    Watch {
        /// Log as newline-delimited JSON
        #[arg(long)]
        json_logs: bool,
    },

    /// List indexed events by start time
    List {
        /// Only show events from this source name
        #[arg(long, short)]
        source: Option<String>,

        /// Maximum number of events to display
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information
    Version,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_force() {
        let cli = Cli::try_parse_from(["calsync", "sync", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { force: true }));
        assert!(!cli.debug);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["calsync", "list", "--limit", "5", "--config", "/tmp/c.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Command::List {
                source: None,
                limit: Some(5)
            }
        ));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["calsync"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! CLI module for usersync.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - Running a pipeline against the configured server
//!
//! # Usage
//!
//! ```ignore
//! use usersync::cli::{parse_args, run_cli_command};
//!
//! run_cli_command(parse_args(std::env::args()))?;
//! ```

pub mod args;
pub mod run;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use run::{run_pipeline, with_suggestion};
pub use version::{version_line, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::SyncConfig;

/// Execute a parsed command.
///
/// Pipelines read their settings from the environment and run on a fresh
/// tokio runtime.
pub fn run_cli_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_line());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid(message) => Err(eyre!("{}\n\n{}", message, USAGE)),
        command => {
            let config = SyncConfig::from_env().map_err(with_suggestion)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_pipeline(command, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_command_is_an_error() {
        let result = run_cli_command(CliCommand::Invalid("missing input file".to_string()));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("missing input file"));
        assert!(message.contains("usage: usersync"));
    }

    #[test]
    fn test_version_and_help_succeed() {
        assert!(run_cli_command(CliCommand::Version).is_ok());
        assert!(run_cli_command(CliCommand::Help).is_ok());
    }
}

//! Command-line argument parsing for usersync.
//!
//! This module handles parsing command-line arguments and determining
//! which pipeline to run.

use std::path::PathBuf;

/// Batch size used when `--batch-size` is not given.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Create or update the users in a JSON file
    Upsert { file: PathBuf, batch_size: usize },
    /// Delete the users listed in a JSON file
    Delete { file: PathBuf },
    /// Rewrite passwords from a JSON file
    Passwords { file: PathBuf },
    /// Export every user, optionally writing the rows to a file
    Export { out: Option<PathBuf> },
    /// Arguments could not be parsed
    Invalid(String),
}

pub const USAGE: &str = "\
usage: usersync <command> [options]

commands:
  upsert <file.json> [--batch-size 1|2|5|10]   create or update users
  delete <file.json>                           disable, strip and delete users
  passwords <file.json>                        rewrite user passwords
  export [--out <file.json>]                   export all users

options:
  -V, --version                                print the version
  -h, --help                                   print this help

environment:
  USERSYNC_BASE_URL, USERSYNC_USERNAME, USERSYNC_PASSWORD,
  USERSYNC_MINIMAL_ROLE_ID, USERSYNC_PAGE_SIZE, RUST_LOG";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use usersync::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["usersync".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut args = args.skip(1);
    let Some(command) = args.next() else {
        return CliCommand::Help;
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "upsert" => parse_upsert(&rest),
        "delete" => match single_file(&rest) {
            Ok(file) => CliCommand::Delete { file },
            Err(msg) => CliCommand::Invalid(msg),
        },
        "passwords" => match single_file(&rest) {
            Ok(file) => CliCommand::Passwords { file },
            Err(msg) => CliCommand::Invalid(msg),
        },
        "export" => parse_export(&rest),
        other => CliCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

fn single_file(rest: &[String]) -> Result<PathBuf, String> {
    match rest {
        [file] => Ok(PathBuf::from(file)),
        [] => Err("missing input file".to_string()),
        _ => Err(format!("unexpected arguments: {}", rest[1..].join(" "))),
    }
}

fn parse_upsert(rest: &[String]) -> CliCommand {
    let mut file = None;
    let mut batch_size = DEFAULT_BATCH_SIZE;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--batch-size" | "-b" => match iter.next().map(|v| v.parse::<usize>()) {
                Some(Ok(size)) => batch_size = size,
                Some(Err(_)) => return CliCommand::Invalid("--batch-size expects a number".to_string()),
                None => return CliCommand::Invalid("--batch-size needs a value".to_string()),
            },
            path if file.is_none() => file = Some(PathBuf::from(path)),
            extra => return CliCommand::Invalid(format!("unexpected argument '{}'", extra)),
        }
    }
    match file {
        Some(file) => CliCommand::Upsert { file, batch_size },
        None => CliCommand::Invalid("missing input file".to_string()),
    }
}

fn parse_export(rest: &[String]) -> CliCommand {
    match rest {
        [] => CliCommand::Export { out: None },
        [flag, path] if flag == "--out" || flag == "-o" => CliCommand::Export {
            out: Some(PathBuf::from(path)),
        },
        _ => CliCommand::Invalid(format!("unexpected arguments: {}", rest.join(" "))),
    }
}

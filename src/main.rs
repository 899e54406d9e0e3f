use color_eyre::Result;
use tracing_subscriber::EnvFilter;
use usersync::cli::{parse_args, run_cli_command};

fn main() -> Result<()> {
    color_eyre::install()?;

    // Operator output goes to stdout through the event stream; diagnostics
    // go to stderr and stay quiet unless RUST_LOG asks for more.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("usersync=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run_cli_command(parse_args(std::env::args()))
}

use agoric_restarter::cli::Cli;
use agoric_restarter::journal::JournalctlReader;
use agoric_restarter::measure::Markers;
use agoric_restarter::report::Summary;
use agoric_restarter::runner::{check_root, RestartRunner, RunError};
use agoric_restarter::service::Systemctl;
use clap::Parser;
use std::process::exit;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(err) = run(cli) {
        error!("{err}");
        exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    check_root()?;

    let markers = Markers::new(cli.start_marker, cli.block_marker);
    let runner = RestartRunner::new(
        Systemctl::default(),
        JournalctlReader::default(),
        cli.unit,
        markers,
        cli.timeout,
    )
    .with_progress(!cli.no_progress);

    let outcomes = runner.run(cli.numbers)?;
    println!("{}", Summary::from_outcomes(&outcomes));
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(level))
        .init();
}

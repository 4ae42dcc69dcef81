//! Command line surface.

use std::time::Duration;

use clap::Parser;
use regex::Regex;

use crate::defaults;

/// Restarts the Agoric Cosmos daemon unit and measures, per restart, the
/// time between service start and the first block received from the
/// chain. Must run as root.
#[derive(Parser, Debug)]
#[command(name = "agoric-restarter", about, long_about = None)]
pub struct Cli {
    /// Number of restart cycles to perform
    #[arg(
        short = 'n',
        long = "numbers",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub numbers: u32,

    /// Systemd unit to restart and watch
    #[arg(long, default_value = defaults::SERVICE_NAME)]
    pub unit: String,

    /// How long to wait for both markers after each restart (e.g. 90s, 2m)
    #[arg(long, default_value = defaults::DEFAULT_SCAN_TIMEOUT, value_parser = parse_duration)]
    pub timeout: Duration,

    /// Pattern matching the service-started journal line
    #[arg(long, default_value = defaults::STARTED_MARKER)]
    pub start_marker: Regex,

    /// Pattern matching the first-received-block journal line
    #[arg(long, default_value = defaults::FIRST_BLOCK_MARKER)]
    pub block_marker: Regex,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    pub log_level: String,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    duration_str::parse(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_service_contract() {
        let cli = Cli::try_parse_from(["agoric-restarter"]).unwrap();
        assert_eq!(cli.numbers, 1);
        assert_eq!(cli.unit, defaults::SERVICE_NAME);
        assert_eq!(cli.timeout, Duration::from_secs(120));
        assert_eq!(cli.start_marker.as_str(), defaults::STARTED_MARKER);
        assert_eq!(cli.block_marker.as_str(), defaults::FIRST_BLOCK_MARKER);
        assert!(!cli.no_progress);
    }

    #[rstest]
    #[case::zero(&["agoric-restarter", "-n", "0"])]
    #[case::negative(&["agoric-restarter", "-n", "-2"])]
    #[case::not_a_number(&["agoric-restarter", "-n", "two"])]
    fn rejects_non_positive_counts(#[case] argv: &[&str]) {
        assert!(Cli::try_parse_from(argv.iter().copied()).is_err());
    }

    #[test]
    fn accepts_a_positive_count() {
        let cli = Cli::try_parse_from(["agoric-restarter", "-n", "3"]).unwrap();
        assert_eq!(cli.numbers, 3);
    }

    #[rstest]
    #[case::seconds("90s", Duration::from_secs(90))]
    #[case::minutes("2m", Duration::from_secs(120))]
    fn parses_human_timeouts(#[case] value: &str, #[case] expected: Duration) {
        let cli = Cli::try_parse_from(["agoric-restarter", "--timeout", value]).unwrap();
        assert_eq!(cli.timeout, expected);
    }

    #[test]
    fn rejects_an_invalid_timeout() {
        assert!(Cli::try_parse_from(["agoric-restarter", "--timeout", "later"]).is_err());
    }

    #[test]
    fn rejects_an_invalid_marker_pattern() {
        assert!(Cli::try_parse_from(["agoric-restarter", "--block-marker", "("]).is_err());
    }
}

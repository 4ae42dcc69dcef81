//! The restart-and-measure loop.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::journal::{JournalError, LogReader};
use crate::measure::{await_first_block, Markers, Outcome};
use crate::progress::Spinner;
use crate::report::format_duration;
use crate::service::{ServiceError, ServiceManager};

/// Errors that stop the whole run. Unmeasurable cycles are not among
/// them; they are reported inline and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("program must run as root")]
    Privilege,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Restarting a unit needs root; fail fast before touching the service.
pub fn check_root() -> Result<(), RunError> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(RunError::Privilege)
    }
}

/// Performs sequential restart-and-measure cycles against one unit.
pub struct RestartRunner<S, L> {
    service: S,
    logs: L,
    unit: String,
    markers: Markers,
    timeout: Duration,
    show_progress: bool,
}

impl<S: ServiceManager, L: LogReader> RestartRunner<S, L> {
    pub fn new(
        service: S,
        logs: L,
        unit: impl Into<String>,
        markers: Markers,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            logs,
            unit: unit.into(),
            markers,
            timeout,
            show_progress: false,
        }
    }

    pub fn with_progress(self, show_progress: bool) -> Self {
        Self {
            show_progress,
            ..self
        }
    }

    /// Runs `count` cycles, printing one `Restart #i: ...` line each.
    /// A restart or journal failure aborts the run; every later cycle
    /// would depend on the same broken path.
    pub fn run(&self, count: u32) -> Result<Vec<Outcome>, RunError> {
        let mut outcomes = Vec::with_capacity(count as usize);
        for attempt in 1..=count {
            let label = format!("Restart #{attempt}:");
            let spinner = self
                .show_progress
                .then(|| Spinner::start(label.clone()));

            match self.measure_once() {
                Ok(outcome) => {
                    let line = match &outcome {
                        Outcome::Measured(measurement) => format_duration(measurement.elapsed()),
                        Outcome::Unmeasurable(reason) => {
                            warn!(attempt, %reason, "cycle produced no measurement");
                            format!("unmeasurable: {reason}")
                        }
                    };
                    match spinner {
                        Some(spinner) => spinner.stop(&line),
                        None => println!("{label} {line}"),
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    if let Some(spinner) = spinner {
                        spinner.stop("failed");
                    }
                    return Err(err);
                }
            }
        }
        info!(count, "all restart cycles completed");
        Ok(outcomes)
    }

    fn measure_once(&self) -> Result<Outcome, RunError> {
        // Follow the journal before issuing the restart so marker lines
        // emitted while systemctl blocks cannot be missed.
        let mut stream = self.logs.follow(&self.unit)?;
        let issued_at = Utc::now();
        debug!(%issued_at, unit = %self.unit, "issuing restart");
        self.service.restart(&self.unit)?;
        Ok(
            match await_first_block(stream.as_mut(), &self.markers, self.timeout) {
                Ok(measurement) => Outcome::Measured(measurement),
                Err(reason) => Outcome::Unmeasurable(reason),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults;
    use crate::journal::testing::ScriptedStream;
    use crate::journal::{JournalEntry, MockLogReader};
    use crate::measure::Unmeasurable;
    use crate::service::MockServiceManager;
    use assert_matches::assert_matches;
    use chrono::TimeDelta;
    use mockall::Sequence;
    use regex::Regex;

    const SECOND: i64 = 1_000_000;

    fn markers() -> Markers {
        Markers::new(
            Regex::new(defaults::STARTED_MARKER).unwrap(),
            Regex::new(defaults::FIRST_BLOCK_MARKER).unwrap(),
        )
    }

    fn cycle_entries(start_micros: i64, block_micros: i64) -> Vec<JournalEntry> {
        vec![
            JournalEntry::synthetic(start_micros, "Started Agoric Cosmos daemon."),
            JournalEntry::synthetic(block_micros, "block-manager: block 1 begin"),
        ]
    }

    #[test]
    fn runs_exactly_n_cycles() {
        let mut service = MockServiceManager::new();
        service
            .expect_restart()
            .withf(|unit| unit == "some.service")
            .times(3)
            .returning(|_| Ok(()));

        let mut logs = MockLogReader::new();
        logs.expect_follow().times(3).returning(|_| {
            Ok(Box::new(ScriptedStream::closing(cycle_entries(
                SECOND,
                13 * SECOND,
            ))))
        });

        let runner = RestartRunner::new(
            service,
            logs,
            "some.service",
            markers(),
            Duration::from_secs(5),
        );
        let outcomes = runner.run(3).unwrap();

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert_matches!(outcome, Outcome::Measured(m) => {
                assert_eq!(m.elapsed(), TimeDelta::seconds(12));
            });
        }
    }

    #[test]
    fn reports_each_cycle_independently() {
        let mut service = MockServiceManager::new();
        service.expect_restart().times(2).returning(|_| Ok(()));

        let mut seq = Sequence::new();
        let mut logs = MockLogReader::new();
        logs.expect_follow()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(Box::new(ScriptedStream::closing(cycle_entries(
                    0,
                    12 * SECOND,
                ))))
            });
        logs.expect_follow()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(Box::new(ScriptedStream::closing(cycle_entries(
                    0,
                    9 * SECOND,
                ))))
            });

        let runner = RestartRunner::new(
            service,
            logs,
            "some.service",
            markers(),
            Duration::from_secs(5),
        );
        let outcomes = runner.run(2).unwrap();

        let elapsed: Vec<TimeDelta> = outcomes
            .iter()
            .map(|outcome| match outcome {
                Outcome::Measured(m) => m.elapsed(),
                Outcome::Unmeasurable(reason) => panic!("unexpected: {reason}"),
            })
            .collect();
        assert_eq!(elapsed, vec![TimeDelta::seconds(12), TimeDelta::seconds(9)]);
    }

    #[test]
    fn continues_past_unmeasurable_cycles() {
        let mut service = MockServiceManager::new();
        service.expect_restart().times(2).returning(|_| Ok(()));

        let mut seq = Sequence::new();
        let mut logs = MockLogReader::new();
        logs.expect_follow()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                // start line only; the block never arrives
                Ok(Box::new(ScriptedStream::stalling(vec![
                    JournalEntry::synthetic(SECOND, "Started Agoric Cosmos daemon."),
                ])))
            });
        logs.expect_follow()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(Box::new(ScriptedStream::closing(cycle_entries(
                    0,
                    9 * SECOND,
                ))))
            });

        let runner = RestartRunner::new(
            service,
            logs,
            "some.service",
            markers(),
            Duration::from_millis(50),
        );
        let outcomes = runner.run(2).unwrap();

        assert_matches!(
            &outcomes[0],
            Outcome::Unmeasurable(Unmeasurable::MarkerNotFound { .. })
        );
        assert_matches!(&outcomes[1], Outcome::Measured(_));
    }

    #[test]
    fn restart_failure_aborts_the_run() {
        let mut seq = Sequence::new();
        let mut service = MockServiceManager::new();
        service
            .expect_restart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        service
            .expect_restart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ServiceError::Exec(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "systemctl went away",
                )))
            });

        let mut logs = MockLogReader::new();
        logs.expect_follow().times(2).returning(|_| {
            Ok(Box::new(ScriptedStream::closing(cycle_entries(
                0,
                9 * SECOND,
            ))))
        });

        let runner = RestartRunner::new(
            service,
            logs,
            "some.service",
            markers(),
            Duration::from_secs(5),
        );
        let err = runner.run(5).unwrap_err();
        assert_matches!(err, RunError::Service(_));
    }

    #[test]
    fn journal_spawn_failure_aborts_the_run() {
        let mut service = MockServiceManager::new();
        service.expect_restart().never();

        let mut logs = MockLogReader::new();
        logs.expect_follow()
            .times(1)
            .returning(|_| Err(JournalError::MissingStdout));

        let runner = RestartRunner::new(
            service,
            logs,
            "some.service",
            markers(),
            Duration::from_secs(5),
        );
        let err = runner.run(2).unwrap_err();
        assert_matches!(err, RunError::Journal(JournalError::MissingStdout));
    }
}

//! Locates the two marker lines in the journal stream and computes the
//! elapsed time between them.

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use tracing::debug;

use crate::journal::{LogStream, StreamError, TimestampError};

/// The two patterns that give journal lines their meaning here: one for
/// the service-started line, one for the first-received-block line.
#[derive(Debug, Clone)]
pub struct Markers {
    start: Regex,
    first_block: Regex,
}

impl Markers {
    pub fn new(start: Regex, first_block: Regex) -> Self {
        Self { start, first_block }
    }
}

/// A successful restart measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub started_at: DateTime<Utc>,
    pub first_block_at: DateTime<Utc>,
}

impl Measurement {
    /// Signed: the journal's clock may place the block line before the
    /// start line, and the raw delta is reported as-is.
    pub fn elapsed(&self) -> TimeDelta {
        self.first_block_at - self.started_at
    }
}

/// Why one restart cycle produced no measurement. Never fatal for the
/// run.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Unmeasurable {
    #[error("no line matched `{marker}` within {timeout:?}")]
    MarkerNotFound { marker: String, timeout: Duration },
    #[error("journal stream ended before both markers were seen")]
    StreamClosed,
    #[error(transparent)]
    BadTimestamp(#[from] TimestampError),
}

/// What one restart cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Measured(Measurement),
    Unmeasurable(Unmeasurable),
}

/// Scans `stream` until the start marker and then the first-block marker
/// have both matched, or the deadline expires.
///
/// A first-block line seen before any start line has matched does not
/// count; the pair is fixed by scan order. Entries without a textual
/// message are skipped. Timestamps are only parsed on matched lines, and
/// a parse failure there makes the cycle unmeasurable.
pub fn await_first_block(
    stream: &mut dyn LogStream,
    markers: &Markers,
    timeout: Duration,
) -> Result<Measurement, Unmeasurable> {
    let deadline = Instant::now() + timeout;
    let mut started_at: Option<DateTime<Utc>> = None;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(missing_marker(markers, started_at.is_some(), timeout));
        }

        let entry = match stream.next_entry(remaining) {
            Ok(entry) => entry,
            Err(StreamError::TimedOut) => {
                return Err(missing_marker(markers, started_at.is_some(), timeout))
            }
            Err(StreamError::Closed) => return Err(Unmeasurable::StreamClosed),
        };

        let Some(message) = entry.message() else {
            continue;
        };

        match started_at {
            None if markers.start.is_match(message) => {
                let timestamp = entry.timestamp()?;
                debug!(%timestamp, "start marker matched");
                started_at = Some(timestamp);
            }
            Some(start) if markers.first_block.is_match(message) => {
                let first_block_at = entry.timestamp()?;
                debug!(timestamp = %first_block_at, "first-block marker matched");
                return Ok(Measurement {
                    started_at: start,
                    first_block_at,
                });
            }
            _ => {}
        }
    }
}

fn missing_marker(markers: &Markers, start_found: bool, timeout: Duration) -> Unmeasurable {
    let marker = if start_found {
        markers.first_block.as_str()
    } else {
        markers.start.as_str()
    };
    Unmeasurable::MarkerNotFound {
        marker: marker.to_string(),
        timeout,
    }
}

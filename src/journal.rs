//! Seam over the unit's journal.
//!
//! `JournalctlReader` follows `journalctl -o json` output for a unit and
//! hands entries to the caller over a channel fed by a reader thread, so
//! the scan loop can wait with a deadline.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("could not spawn journalctl: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("journalctl produced no stdout handle")]
    MissingStdout,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("no journal entry arrived before the deadline")]
    TimedOut,
    #[error("journal stream closed")]
    Closed,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("could not parse journal timestamp `{raw}`")]
pub struct TimestampError {
    pub raw: String,
}

/// One line of `journalctl -o json` output. `MESSAGE` may hold a byte
/// array for binary payloads; those entries carry no usable message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JournalEntry {
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    realtime_timestamp: String,
    #[serde(rename = "MESSAGE", default)]
    message: Option<serde_json::Value>,
}

impl JournalEntry {
    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().and_then(|value| value.as_str())
    }

    /// The journal's realtime clock for this entry, microseconds since
    /// the Unix epoch.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, TimestampError> {
        self.realtime_timestamp
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_micros)
            .ok_or_else(|| TimestampError {
                raw: self.realtime_timestamp.clone(),
            })
    }

    #[cfg(test)]
    pub(crate) fn synthetic(micros: i64, message: &str) -> Self {
        Self {
            realtime_timestamp: micros.to_string(),
            message: Some(serde_json::Value::String(message.to_string())),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_raw_timestamp(raw: &str, message: &str) -> Self {
        Self {
            realtime_timestamp: raw.to_string(),
            message: Some(serde_json::Value::String(message.to_string())),
        }
    }
}

/// Ordered journal entries for one unit, oldest first.
pub trait LogStream {
    /// Blocks for the next entry, up to `timeout`.
    fn next_entry(&mut self, timeout: Duration) -> Result<JournalEntry, StreamError>;
}

/// Opens a [LogStream] over a unit's journal.
#[cfg_attr(test, mockall::automock)]
pub trait LogReader {
    fn follow(&self, unit: &str) -> Result<Box<dyn LogStream>, JournalError>;
}

/// Follows a unit's journal through `journalctl -f`.
pub struct JournalctlReader {
    program: String,
}

impl Default for JournalctlReader {
    fn default() -> Self {
        Self {
            program: "journalctl".to_string(),
        }
    }
}

impl JournalctlReader {
    /// Replaces the invoked binary. Tests point this at scripts emitting
    /// canned journal output.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LogReader for JournalctlReader {
    fn follow(&self, unit: &str) -> Result<Box<dyn LogStream>, JournalError> {
        // -n 0: the stream is opened before the restart is issued, so
        // backlog lines from a previous cycle must not replay.
        let mut child = Command::new(&self.program)
            .args(["-u", unit, "-o", "json", "-n", "0", "--output-fields=MESSAGE", "-f"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                return Err(JournalError::MissingStdout);
            }
        };

        let (sender, receiver) = unbounded();
        let spawned = thread::Builder::new()
            .name("journal-reader".to_string())
            .spawn(move || read_entries(stdout, sender));
        if let Err(err) = spawned {
            let _ = child.kill();
            return Err(err.into());
        }

        debug!(unit, "following journal");
        Ok(Box::new(JournalctlStream { child, receiver }))
    }
}

struct JournalctlStream {
    child: Child,
    receiver: Receiver<JournalEntry>,
}

impl LogStream for JournalctlStream {
    fn next_entry(&mut self, timeout: Duration) -> Result<JournalEntry, StreamError> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => StreamError::TimedOut,
            RecvTimeoutError::Disconnected => StreamError::Closed,
        })
    }
}

impl Drop for JournalctlStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read_entries(stdout: ChildStdout, sender: Sender<JournalEntry>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => {
                if sender.send(entry).is_err() {
                    break;
                }
            }
            Err(err) => debug!(%err, line = %line, "skipping unparseable journal line"),
        }
    }
}

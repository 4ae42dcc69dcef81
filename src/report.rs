//! Human-readable durations and the end-of-run summary block.

use std::fmt;

use chrono::TimeDelta;

use crate::measure::Outcome;

/// Formats a signed delta as seconds with millisecond precision, e.g.
/// `18.444s` or `-3.000s`.
pub fn format_duration(delta: TimeDelta) -> String {
    let micros = delta.num_microseconds().unwrap_or_else(|| {
        if delta < TimeDelta::zero() {
            i64::MIN
        } else {
            i64::MAX
        }
    });
    format!("{:.3}s", micros as f64 / 1_000_000.0)
}

/// Aggregates of one run, printed below the per-restart lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub restarts: usize,
    pub unmeasurable: usize,
    pub total: TimeDelta,
    pub min: Option<TimeDelta>,
    pub max: Option<TimeDelta>,
    pub avg: Option<TimeDelta>,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let measured: Vec<TimeDelta> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                Outcome::Measured(measurement) => Some(measurement.elapsed()),
                Outcome::Unmeasurable(_) => None,
            })
            .collect();

        let total = measured
            .iter()
            .fold(TimeDelta::zero(), |acc, delta| acc + *delta);
        let avg = (!measured.is_empty()).then(|| {
            let micros = total.num_microseconds().unwrap_or_default() / measured.len() as i64;
            TimeDelta::microseconds(micros)
        });

        Self {
            restarts: outcomes.len(),
            unmeasurable: outcomes.len() - measured.len(),
            total,
            min: measured.iter().min().copied(),
            max: measured.iter().max().copied(),
            avg,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "_".repeat(40))?;
        write!(
            f,
            "Restarts: {}, Total time: {}",
            self.restarts,
            format_duration(self.total)
        )?;
        if self.unmeasurable > 0 {
            write!(f, ", unmeasurable: {}", self.unmeasurable)?;
        }
        if let (Some(min), Some(max), Some(avg)) = (self.min, self.max, self.avg) {
            write!(
                f,
                "\nmin: {}, max: {}, avg: {}",
                format_duration(min),
                format_duration(max),
                format_duration(avg)
            )?;
        }
        Ok(())
    }
}

// Query window for one collection run

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Resolution asked from the source for range queries.
pub const QUERY_STEP: Duration = Duration::from_secs(60);

/// Amount the window end is pulled in so the next bucket's first sample is not fetched.
const END_SHRINK: Duration = Duration::from_secs(1);

/// Closed time window `[start, end]` sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl TimeRange {
    /// Returns `None` unless `start <= end` and `step > 0`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Option<Self> {
        if start > end || step.is_zero() {
            return None;
        }
        Some(Self { start, end, step })
    }

    /// Window covering the last complete interval before `now`.
    ///
    /// `start = (now - interval)` floored to a multiple of `interval` since the epoch,
    /// `end = start + interval - 1s`, `step = 1 minute`.
    /// Returns `None` when `interval` is shorter than one second.
    pub fn last_complete(now: DateTime<Utc>, interval: Duration) -> Option<Self> {
        if interval < END_SHRINK {
            return None;
        }
        let interval_ms = i64::try_from(interval.as_millis()).ok()?;
        let shifted = now.timestamp_millis() - interval_ms;
        let start_ms = shifted - shifted.rem_euclid(interval_ms);
        let end_ms = start_ms + interval_ms - END_SHRINK.as_millis() as i64;

        let start = Utc.timestamp_millis_opt(start_ms).single()?;
        let end = Utc.timestamp_millis_opt(end_ms).single()?;
        Self::new(start, end, QUERY_STEP)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {} with {}s step",
            self.start.to_rfc3339(),
            self.end.to_rfc3339(),
            self.step.as_secs()
        )
    }
}

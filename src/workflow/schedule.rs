//! Run scheduling: fixed-interval presets anchored at a start date.
//!
//! Run boundaries are `start + k * period` for k >= 0. With catchup
//! disabled, boundaries that elapsed before the first evaluation generate
//! no runs; the next run fires at the first boundary after startup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How often a workflow fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Hourly,
    Daily,
    Weekly,
}

impl Interval {
    /// Parse a schedule preset such as `@weekly`.
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset.trim().trim_start_matches('@') {
            "hourly" => Ok(Interval::Hourly),
            "daily" => Ok(Interval::Daily),
            "weekly" => Ok(Interval::Weekly),
            other => Err(Error::Schedule(format!(
                "unknown schedule preset: {:?}",
                other
            ))),
        }
    }

    /// The interval's period.
    pub fn period(&self) -> Duration {
        match self {
            Interval::Hourly => Duration::hours(1),
            Interval::Daily => Duration::days(1),
            Interval::Weekly => Duration::weeks(1),
        }
    }

    pub fn as_preset(&self) -> &'static str {
        match self {
            Interval::Hourly => "@hourly",
            Interval::Daily => "@daily",
            Interval::Weekly => "@weekly",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_preset())
    }
}

/// A workflow's trigger: interval, fixed UTC start date, and catchup flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval: Interval,
    pub start: DateTime<Utc>,
    /// Whether boundaries that elapsed before first evaluation are run.
    pub catchup: bool,
}

impl Schedule {
    /// Create a schedule with catchup disabled.
    pub fn new(interval: Interval, start: DateTime<Utc>) -> Self {
        Self {
            interval,
            start,
            catchup: false,
        }
    }

    pub fn with_catchup(mut self, catchup: bool) -> Self {
        self.catchup = catchup;
        self
    }

    /// The first boundary strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        if t < self.start {
            return self.start;
        }
        let period = self.interval.period().num_seconds();
        let elapsed = (t - self.start).num_seconds();
        let k = elapsed / period + 1;
        self.start + Duration::seconds(k * period)
    }

    /// All boundaries in the half-open window `(after, now]`.
    pub fn due_between(&self, after: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut due = Vec::new();
        let mut t = self.next_after(after);
        while t <= now {
            due.push(t);
            t = self.next_after(t);
        }
        due
    }

    /// Boundaries due at evaluation time, honoring catchup.
    ///
    /// With no previous run and catchup disabled this is empty: intervals
    /// that elapsed before the first evaluation produce no runs. With
    /// catchup enabled, every boundary since the start date (or since
    /// `last_run`) is due, oldest first.
    pub fn due_runs(
        &self,
        last_run: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let after = match last_run {
            Some(t) => t,
            // The start date itself is the first boundary, so back off by
            // a second to include it in the window.
            None if self.catchup => self.start - Duration::seconds(1),
            None => return Vec::new(),
        };
        self.due_between(after, now)
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} from {} (catchup {})",
            self.interval,
            self.start.format("%Y-%m-%d %H:%M:%S UTC"),
            if self.catchup { "on" } else { "off" }
        )
    }
}

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub const TIME_FORMAT: &str = "%H:%M";

/// Half-open wall-clock interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> anyhow::Result<Self> {
        if start >= end {
            return Err(anyhow::anyhow!(
                "end time {} must be after start time {}",
                end.format(TIME_FORMAT),
                start.format(TIME_FORMAT)
            ));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> anyhow::Result<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    /// `start1 < end2 AND start2 < end1`; ranges that merely touch do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }
}

/// Accepts `HH:MM`, and `HH:MM:SS` as produced by some form inputs.
pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| anyhow::anyhow!("invalid time: {s}"))
}

pub fn format_time(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

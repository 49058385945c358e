//! Scan results.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::metrics::{MetricValue, metric_names};
use crate::{Channel, Kind};

/// Terminal verdict of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// An inverse ERROR rule fired: the expected greeting never appeared.
    NotStarted,
    /// No fatal match, but the termination marker was never seen.
    RunningOrIncomplete,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::NotStarted => "NOT_STARTED",
            Verdict::RunningOrIncomplete => "RUNNING_OR_INCOMPLETE",
            Verdict::Completed => "COMPLETED",
            Verdict::CompletedWithWarnings => "COMPLETED_WITH_WARNINGS",
            Verdict::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// What a scan observed. Flags only ever get set during a scan.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScanFlags: u8 {
        /// A non-recoverable rule matched.
        const FATAL       = 1 << 0;
        /// A recoverable rule matched (or an inverse WARNING rule fired).
        const RECOVERABLE = 1 << 1;
        /// The termination marker was seen on some channel.
        const TERMINATED  = 1 << 2;
        /// An inverse ERROR rule fired.
        const NOT_STARTED = 1 << 3;
    }
}

impl ScanFlags {
    /// Fold the observations into a verdict.
    ///
    /// `NotStarted` beats `Failed` beats `RunningOrIncomplete` beats
    /// `CompletedWithWarnings` beats `Completed`.
    pub fn verdict(self, termination_checked: bool) -> Verdict {
        if self.contains(ScanFlags::NOT_STARTED) {
            Verdict::NotStarted
        } else if self.contains(ScanFlags::FATAL) {
            Verdict::Failed
        } else if termination_checked && !self.contains(ScanFlags::TERMINATED) {
            Verdict::RunningOrIncomplete
        } else if self.contains(ScanFlags::RECOVERABLE) {
            Verdict::CompletedWithWarnings
        } else {
            Verdict::Completed
        }
    }
}

/// Where in its channel a history entry was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Position {
    /// 1-based line number.
    Line(usize),
    /// Synthetic position of inverse-rule matches, after the last line.
    EndOfStream,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Line(n) => write!(f, "line {n}"),
            Position::EndOfStream => f.write_str("end of stream"),
        }
    }
}

/// One detection, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub rule_id: String,
    pub kind: Kind,
    pub recoverable: bool,
    pub channel: Channel,
    pub position: Position,
    /// The matching line; empty for inverse rules.
    pub line: String,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {} @ {} {}", self.kind, self.rule_id, self.channel, self.position)
    }
}

/// Outcome of scanning both console channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub verdict: Verdict,
    /// Detections in order: stdout lines, stderr lines, then inverse rules.
    pub history: Vec<HistoryEntry>,
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(skip)]
    pub flags: ScanFlags,
}

impl RunStatus {
    pub fn has_entries(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn entries_on(&self, channel: Channel) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.history.iter().filter(move |e| e.channel == channel)
    }

    /// History entries produced by `rule_id`.
    pub fn entries_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.history.iter().filter(move |e| e.rule_id == rule_id)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// Declared number of bands.
    pub fn bands(&self) -> Option<u32> {
        self.metric(metric_names::BANDS)?.as_integer().and_then(|v| u32::try_from(v).ok())
    }

    /// Elapsed wall time reported by the program.
    pub fn elapsed(&self) -> Option<Duration> {
        let secs = self.metric(metric_names::ELAPSED)?.as_float()?;
        Duration::try_from_secs_f64(secs).ok()
    }

    /// Program version from the greeting line.
    pub fn version(&self) -> Option<&str> {
        self.metric(metric_names::VERSION)?.as_text()
    }

    pub fn highest_band_occupied(&self) -> bool {
        self.metric(metric_names::HIGHEST_BAND_OCCUPIED).and_then(MetricValue::as_flag).unwrap_or(false)
    }
}

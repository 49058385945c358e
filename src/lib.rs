//! Run-health classification and tolerant result reading for VASP runs.
//!
//! Two independent pipelines live in this crate:
//!
//! ```text
//! stdout lines ──┐
//!                ├─ StreamParser::scan ── RuleTable (ordered rules) ──▶ RunStatus
//! stderr lines ──┘        (verdict + history + scalar metrics)
//!
//! vasprun.xml ── VasprunReader ──▶ Document (ionic ▸ electronic steps, truncated flag)
//!                                      │
//!                                      └─ series::flatten ──▶ FlattenedSeries (values + counts)
//! ```
//!
//! Rule tables are plain data (YAML) passed explicitly to every scan, so
//! scans with different tables never interfere. A killed simulation is an
//! expected outcome: a short result file yields a `truncated` document, and a
//! fatal console message yields a `Failed` verdict, neither of which is an
//! error.
//!
//! # Example
//! ```
//! use vaspscan::{RuleTable, StreamParser, ScanOptions, Verdict};
//!
//! let table = RuleTable::vasp_default();
//! let stdout = [" vasp.6.3.0 18Jan22 complex", " BRMIX: very serious problems"];
//! let status = StreamParser::new(table)
//!     .with_options(ScanOptions::without_termination())
//!     .scan(stdout, Vec::<String>::new());
//! assert_eq!(status.verdict, Verdict::Failed);
//! ```
//!
//! Set `VASPSCAN_DEBUG=1` to print rule-table, scan and reader traces to stderr.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod rules;
mod series;
mod vasprun;

pub use api::{read_vasprun_file, read_vasprun_str, scan_files, scan_text};
pub use engine::{
    HistoryEntry, HistoryMode, Match, MetricKind, MetricSet, MetricSpec, MetricValue, Position, RunStatus,
    ScanFlags, ScanOptions, StreamParser, Verdict, evaluate, metric_names,
};
pub use error::{ConfigError, Error, InconsistentSeriesError, MalformedDocumentError};
pub use rules::{Rule, RuleSpec, RuleTable};
pub use series::{
    ElectronicSteps, EnergyKind, EnergyQuery, EnergySeries, FlattenedSeries, Selection, energies, flatten,
    flatten_nested, unflatten,
};
pub use vasprun::{Document, ElectronicStep, Generator, IonicStep, Rows, VasprunReader};

// --- Shared vocabulary -------------------------------------------------------

/// One of the two console output channels of the simulation program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    /// Primary channel.
    Stdout,
    /// Secondary channel.
    Stderr,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Stdout, Channel::Stderr];

    /// Position of this channel in per-channel arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Stdout => 0,
            Channel::Stderr => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stdout => "STDOUT",
            Channel::Stderr => "STDERR",
        }
    }

    /// Parse the configuration spelling (`STDOUT` / `STDERR`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STDOUT" => Some(Channel::Stdout),
            "STDERR" => Some(Channel::Stderr),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Kind {
    Error,
    Warning,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Error => "ERROR",
            Kind::Warning => "WARNING",
        }
    }

    /// Parse the configuration spelling; case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("ERROR") {
            Some(Kind::Error)
        } else if value.eq_ignore_ascii_case("WARNING") {
            Some(Kind::Warning)
        } else {
            None
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static DEBUG: Lazy<bool> = Lazy::new(|| std::env::var_os("VASPSCAN_DEBUG").is_some());

#[doc(hidden)]
pub fn debug_enabled() -> bool {
    *DEBUG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_and_kind_spellings() {
        assert_eq!(Channel::parse("STDOUT"), Some(Channel::Stdout));
        assert_eq!(Channel::parse("STDERR"), Some(Channel::Stderr));
        assert_eq!(Channel::parse("stdout"), None);
        assert_eq!(Kind::parse("warning"), Some(Kind::Warning));
        assert_eq!(Kind::parse("Error"), Some(Kind::Error));
        assert_eq!(Kind::parse("INFO"), None);
        assert_eq!(Channel::Stderr.to_string(), "STDERR");
    }
}

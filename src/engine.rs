//! Console-stream classification engine.
//!
//! ## How the parts work together
//!
//! ```text
//! RuleTable ── CompiledRules::new            (compiled_rules.rs)
//!                 per-channel RegexSet over non-inverse rules
//!                 per-channel list of inverse rules
//!                          │
//! line ── evaluate ────────┼─ first matching rule in table order   (evaluate.rs)
//!                          │
//!                          v
//!              StreamParser::scan             (scanner.rs)
//!                - one independent pass per channel
//!                - MetricSet on every line    (metrics.rs)
//!                - stop channel on fatal match
//!                - inverse rules after both channels
//!                          │
//!                          v
//!                      RunStatus              (status.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: builds the per-channel index once per table.
//! - `evaluate.rs`: the single-line rule engine.
//! - `metrics.rs`: scalar extractors that are not rules (bands, version, ...).
//! - `scanner.rs`: the two-channel state machine and verdict.
//! - `status.rs`: the verdict, scan history and [`RunStatus`] types.
//!
//! ## Debugging
//!
//! Set `VASPSCAN_DEBUG=1` to print matches, channel stops and the verdict.

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/evaluate.rs"]
mod evaluate;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/scanner.rs"]
mod scanner;
#[path = "engine/status.rs"]
mod status;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub(crate) use compiled_rules::CompiledRules;
pub use evaluate::{Match, evaluate};
pub use metrics::{MetricKind, MetricSet, MetricSpec, MetricValue, metric_names};
pub use scanner::{HistoryMode, ScanOptions, StreamParser};
pub use status::{HistoryEntry, Position, RunStatus, ScanFlags, Verdict};

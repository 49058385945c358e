//! Two-channel stream parser.
//!
//! Each channel is consumed once, line by line, by an independent
//! [`ChannelScan`]; the two results are merged into a [`RunStatus`]. Nothing
//! is shared between the channel scans, so they can be run in either order
//! and the merged result is the same.
//!
//! ## Per-line pass
//!
//! ```text
//! line n ──▶ inverse rules on channel  ── pattern seen? mark rule as seen
//!        ──▶ MetricSet::apply          ── last value wins
//!        ──▶ termination marker        ── TERMINATED
//!        ──▶ evaluate (first rule wins)
//!                 └─ match ── append history
//!                              └─ !recoverable ── FATAL, stop this channel
//! ```
//!
//! ## After both channels
//!
//! Every inverse rule whose pattern was never seen on its channel is
//! appended at [`Position::EndOfStream`], in table order. An inverse ERROR
//! rule means the run never started.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, BufRead};

use regex::Regex;

use super::compiled_rules::RuleId;
use super::evaluate::evaluate;
use super::metrics::{MetricSet, MetricValue};
use super::status::{HistoryEntry, Position, RunStatus, ScanFlags};
use crate::{Channel, Error, Kind, Rule, RuleTable};

/// How repeated matches of one rule are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Every matching line is recorded.
    #[default]
    Full,
    /// Each rule is recorded at most once per channel.
    FirstOccurrence,
}

/// Scan behaviour. The defaults describe VASP console output.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub history: HistoryMode,
    /// Line that marks a run that ran to its end; `None` disables the check.
    pub termination: Option<Regex>,
    pub metrics: MetricSet,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            history: HistoryMode::Full,
            termination: Some(
                regex!(r"General timing and accounting|Total CPU time used|writing wavefunctions").clone(),
            ),
            metrics: MetricSet::vasp_default(),
        }
    }
}

impl ScanOptions {
    /// Default options without the termination-marker check, for streams
    /// that are known to be complete or that never print a marker.
    pub fn without_termination() -> Self {
        Self { termination: None, ..Self::default() }
    }

    pub fn history(mut self, mode: HistoryMode) -> Self {
        self.history = mode;
        self
    }

    pub fn termination(mut self, marker: Option<Regex>) -> Self {
        self.termination = marker;
        self
    }

    pub fn metrics(mut self, metrics: MetricSet) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Result of scanning one channel.
#[derive(Debug)]
pub(super) struct ChannelScan {
    history: Vec<HistoryEntry>,
    /// Inverse rules whose pattern appeared on this channel.
    seen: HashSet<RuleId>,
    metrics: BTreeMap<String, MetricValue>,
    flags: ScanFlags,
}

/// Drives the rule engine over the two console channels of one run.
///
/// Usage: `StreamParser::new(&table).with_options(options).scan(stdout, stderr)`.
/// The table is borrowed, never mutated, and may be shared by any number of
/// concurrent parsers.
#[derive(Debug, Clone)]
pub struct StreamParser<'t> {
    table: &'t RuleTable,
    options: ScanOptions,
}

impl<'t> StreamParser<'t> {
    pub fn new(table: &'t RuleTable) -> Self {
        Self { table, options: ScanOptions::default() }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan already-captured lines of both channels.
    pub fn scan<I, J, S, T>(&self, stdout: I, stderr: J) -> RunStatus
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let out = self.scan_channel(Channel::Stdout, stdout);
        let err = self.scan_channel(Channel::Stderr, stderr);
        self.finish(out, err)
    }

    /// Scan two byte streams. Invalid UTF-8 is replaced, line endings
    /// (`\n`, `\r\n`) are stripped. A fatal match stops reading that stream.
    pub fn scan_readers<R: BufRead, W: BufRead>(&self, stdout: R, stderr: W) -> Result<RunStatus, Error> {
        let out = self.scan_reader(Channel::Stdout, stdout)?;
        let err = self.scan_reader(Channel::Stderr, stderr)?;
        Ok(self.finish(out, err))
    }

    fn scan_reader<R: BufRead>(&self, channel: Channel, reader: R) -> Result<ChannelScan, Error> {
        let mut failure: Option<io::Error> = None;
        let lines = LossyLines::new(reader).map_while(|line| match line {
            Ok(line) => Some(line),
            Err(err) => {
                failure = Some(err);
                None
            }
        });
        let scan = self.scan_channel(channel, lines);
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(scan),
        }
    }

    pub(super) fn scan_channel<I, S>(&self, channel: Channel, lines: I) -> ChannelScan
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = self.table.rules();
        let inverse = self.table.compiled().inverse_rules(channel);
        let mut scan = ChannelScan {
            history: Vec::new(),
            seen: HashSet::new(),
            metrics: BTreeMap::new(),
            flags: ScanFlags::empty(),
        };
        let mut recorded: HashSet<&str> = HashSet::new();
        let mut count = 0usize;

        for (idx, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            let number = idx + 1;
            count = number;

            for &id in inverse {
                if !scan.seen.contains(&id) && rules[id].pattern.is_match(line) {
                    scan.seen.insert(id);
                }
            }

            self.options.metrics.apply(line, &mut scan.metrics);

            if let Some(marker) = &self.options.termination {
                if marker.is_match(line) {
                    scan.flags |= ScanFlags::TERMINATED;
                }
            }

            let Some(found) = evaluate(line, channel, self.table) else {
                continue;
            };
            let rule = found.rule;

            if self.options.history == HistoryMode::FirstOccurrence && !recorded.insert(rule.id.as_str()) {
                continue;
            }

            trace!(
                "scan:match",
                "channel={} line={} rule=\"{}\" recoverable={} text=\"{}\"",
                channel,
                number,
                rule.id,
                rule.recoverable,
                line.trim()
            );
            scan.history.push(entry(rule, channel, Position::Line(number), line));

            if rule.recoverable {
                scan.flags |= ScanFlags::RECOVERABLE;
            } else {
                scan.flags |= ScanFlags::FATAL;
                trace!("scan:stop", "channel={} line={} rule=\"{}\"", channel, number, rule.id);
                break;
            }
        }

        trace!("scan:channel_done", "channel={} lines={} matches={}", channel, count, scan.history.len());
        scan
    }

    /// Merge both channel scans, settle the inverse rules and compute the verdict.
    pub(super) fn finish(&self, out: ChannelScan, err: ChannelScan) -> RunStatus {
        let mut flags = out.flags | err.flags;
        let mut history = out.history;
        history.extend(err.history);

        // stderr values are applied after stdout values.
        let mut metrics = out.metrics;
        metrics.extend(err.metrics);

        for (id, rule) in self.table.rules().iter().enumerate().filter(|(_, r)| r.inverse) {
            let seen = match rule.location {
                Channel::Stdout => out.seen.contains(&id),
                Channel::Stderr => err.seen.contains(&id),
            };
            if seen {
                continue;
            }
            trace!("scan:inverse", "channel={} rule=\"{}\" kind={}", rule.location, rule.id, rule.kind);
            history.push(entry(rule, rule.location, Position::EndOfStream, ""));
            flags |= match rule.kind {
                Kind::Error => ScanFlags::NOT_STARTED,
                Kind::Warning => ScanFlags::RECOVERABLE,
            };
        }

        let verdict = flags.verdict(self.options.termination.is_some());
        trace!("scan:verdict", "verdict={} flags={:?} history={}", verdict, flags, history.len());

        RunStatus { verdict, history, metrics, flags }
    }
}

fn entry(rule: &Rule, channel: Channel, position: Position, line: &str) -> HistoryEntry {
    HistoryEntry {
        rule_id: rule.id.clone(),
        kind: rule.kind,
        recoverable: rule.recoverable,
        channel,
        position,
        line: line.to_string(),
    }
}

/// Line iterator over a byte stream that tolerates invalid UTF-8.
struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new() }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

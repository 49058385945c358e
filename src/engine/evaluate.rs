//! Single-line rule engine.

use crate::{Channel, Rule, RuleTable};

/// A rule that fired on a line.
#[derive(Debug, Clone, Copy)]
pub struct Match<'t, 'l> {
    pub rule: &'t Rule,
    pub line: &'l str,
}

/// Return the first non-inverse rule on `channel` (in table order) whose
/// pattern occurs in `line`.
///
/// ```text
/// table: [nostart(inverse), ibzkpt, brmix, segfault(STDERR)]
/// line (STDOUT): "BRMIX: very serious problems"
///   nostart  -> skipped, inverse rules are settled at end of channel
///   ibzkpt   -> no match
///   brmix    -> match, returned
///   segfault -> never considered, other channel
/// ```
///
/// A line triggers at most one rule per call.
pub fn evaluate<'t, 'l>(line: &'l str, channel: Channel, table: &'t RuleTable) -> Option<Match<'t, 'l>> {
    let id = table.compiled().first_match(channel, line)?;
    Some(Match { rule: &table.rules()[id], line })
}

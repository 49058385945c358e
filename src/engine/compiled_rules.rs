//! Per-channel rule index.
//!
//! A scan asks one question per line: which is the first non-inverse rule on
//! this channel whose pattern matches? The index answers it with a
//! [`RegexSet`] built over exactly those rules, in table order, so the lowest
//! matching set index is the first matching rule.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleTable::rules`.
//! - `ChannelIndex::line_rules[i]` is the rule behind pattern `i` of
//!   `ChannelIndex::set`; both are in ascending table order.
//! - Inverse rules never enter the set.

use regex::RegexSet;

use crate::{Channel, ConfigError, Rule};

/// Rule identifier (index into the table's rules).
pub(crate) type RuleId = usize;

#[derive(Debug, Clone)]
struct ChannelIndex {
    line_rules: Vec<RuleId>,
    set: RegexSet,
    inverse_rules: Vec<RuleId>,
}

impl ChannelIndex {
    fn build(rules: &[Rule], channel: Channel) -> Result<Self, ConfigError> {
        let mut line_rules = Vec::new();
        let mut inverse_rules = Vec::new();
        for (id, rule) in rules.iter().enumerate().filter(|(_, r)| r.location == channel) {
            if rule.inverse {
                inverse_rules.push(id);
            } else {
                line_rules.push(id);
            }
        }

        let set = RegexSet::new(line_rules.iter().map(|&id| rules[id].pattern.as_str())).map_err(|source| {
            ConfigError::InvalidPattern { id: format!("<{} rule set>", channel.as_str().to_lowercase()), source }
        })?;

        Ok(ChannelIndex { line_rules, set, inverse_rules })
    }
}

/// Pre-compiled per-channel view of a rule table.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    channels: [ChannelIndex; 2],
}

impl CompiledRules {
    /// Index `rules` for both channels.
    ///
    /// The individual patterns were validated already; a failure here means
    /// the combined set exceeded the regex size limit.
    pub fn new(rules: &[Rule]) -> Result<Self, ConfigError> {
        Ok(CompiledRules {
            channels: [ChannelIndex::build(rules, Channel::Stdout)?, ChannelIndex::build(rules, Channel::Stderr)?],
        })
    }

    /// Non-inverse rules evaluated per line on `channel`, in table order.
    pub fn line_rules(&self, channel: Channel) -> &[RuleId] {
        &self.channels[channel.index()].line_rules
    }

    /// Inverse rules located on `channel`, in table order.
    pub fn inverse_rules(&self, channel: Channel) -> &[RuleId] {
        &self.channels[channel.index()].inverse_rules
    }

    /// First rule (table order) matching `line` on `channel`.
    pub fn first_match(&self, channel: Channel, line: &str) -> Option<RuleId> {
        let index = &self.channels[channel.index()];
        index.set.matches(line).iter().next().map(|i| index.line_rules[i])
    }
}

//! Rule table: the ordered, validated set of known error and warning
//! conditions.
//!
//! Rules are data. A table is loaded from a YAML mapping (rule id to record)
//! whose order is the evaluation order:
//!
//! ```yaml
//! brmix:
//!   kind: ERROR            # ERROR | WARNING (case-insensitive)
//!   location: STDOUT       # STDOUT | STDERR
//!   regex: 'BRMIX: very serious problems'
//!   message: 'Problems with the charge density mixing.'
//!   suggestion: ''         # may be empty or omitted
//!   recover: false         # false: a match stops the channel (fatal)
//!   inverse: false         # true: fires when the pattern never appears
//! ```
//!
//! Adding a detection is a new entry, never a code change. The default VASP
//! table is embedded from `rules/stream.yml`.

#[path = "rules/table.rs"]
mod table;

#[cfg(test)]
#[path = "rules/tests.rs"]
mod tests;

pub use table::{Rule, RuleSpec, RuleTable};

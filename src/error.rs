//! Error types.
//!
//! Only genuinely exceptional conditions are errors: a malformed rule table, a
//! structurally invalid result document and a broken series invariant. What
//! the simulation itself did wrong (fatal or recoverable rule matches, a
//! truncated result file) is reported as data on [`crate::RunStatus`] and
//! [`crate::Document`].

use thiserror::Error;

/// Malformed rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule `{0}` is defined more than once")]
    DuplicateId(String),
    #[error("rule `{id}` has unknown kind `{value}` (expected ERROR or WARNING)")]
    UnknownKind { id: String, value: String },
    #[error("rule `{id}` has unknown location `{value}` (expected STDOUT or STDERR)")]
    UnknownLocation { id: String, value: String },
    #[error("rule `{0}` has an empty pattern")]
    EmptyPattern(String),
    #[error("rule `{id}` has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("metric `{name}` has an invalid pattern: {source}")]
    InvalidMetric {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to parse rule configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to read rule configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// A result document that is wrong, as opposed to merely short.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedDocumentError {
    #[error("expected closing tag `</{expected}>` but found `</{found}>` at byte {position}")]
    MismatchedTag { expected: String, found: String, position: usize },
    #[error("closing tag `</{found}>` without an open element at byte {position}")]
    UnopenedTag { found: String, position: usize },
    #[error("unexpected element `<{element}>` inside `<{parent}>` at byte {position}")]
    UnexpectedNesting { element: String, parent: String, position: usize },
    #[error("document root must be `<{expected}>`, found `<{found}>`")]
    UnexpectedRoot { expected: &'static str, found: String },
    #[error("content after the closing root element at byte {position}")]
    TrailingContent { position: usize },
    #[error("field `{field}` holds non-numeric token `{token}` at byte {position}")]
    InvalidNumber { field: String, token: String, position: usize },
    #[error("xml syntax error at byte {position}: {message}")]
    Syntax { message: String, position: usize },
}

/// The flatten/unflatten invariant `sum(counts) == len(values)` was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("series counts sum to {counted} but {stored} values are stored")]
pub struct InconsistentSeriesError {
    pub counted: usize,
    pub stored: usize,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Malformed(#[from] MalformedDocumentError),
    #[error(transparent)]
    Series(#[from] InconsistentSeriesError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

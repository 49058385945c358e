//! Scalar metric extraction.
//!
//! Metrics are values read off the console stream that are not error
//! conditions: the declared band count, the elapsed wall time, the program
//! version and whether the highest band ended up occupied. They are applied
//! to every scanned line and the most recently seen value of each metric wins.
//!
//! Each [`MetricSpec`] is a regex; for every kind except [`MetricKind::Flag`]
//! capture group 1 holds the value. A capture that does not parse as the
//! declared kind is skipped, the previous value stays.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;

use crate::ConfigError;

/// Names of the metrics in [`MetricSet::vasp_default`].
pub mod metric_names {
    pub const VERSION: &str = "version";
    pub const BANDS: &str = "bands";
    pub const ELAPSED: &str = "elapsed";
    pub const HIGHEST_BAND_OCCUPIED: &str = "highest_band_occupied";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Integer,
    Float,
    Text,
    /// True as soon as the pattern is seen; no capture group needed.
    Flag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl MetricValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetricValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetricValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(v) => f.write_str(v),
            MetricValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: String,
    pub pattern: Regex,
    pub kind: MetricKind,
}

impl MetricSpec {
    fn extract(&self, line: &str) -> Option<MetricValue> {
        if self.kind == MetricKind::Flag {
            return self.pattern.is_match(line).then_some(MetricValue::Flag(true));
        }
        let caps = self.pattern.captures(line)?;
        let raw = caps.get(1)?.as_str().trim();
        match self.kind {
            MetricKind::Integer => raw.parse().ok().map(MetricValue::Integer),
            MetricKind::Float => raw.parse().ok().map(MetricValue::Float),
            MetricKind::Text => Some(MetricValue::Text(raw.to_string())),
            MetricKind::Flag => None,
        }
    }
}

/// Ordered set of metric extractors.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    specs: Vec<MetricSpec>,
}

impl MetricSet {
    /// A set with no extractors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extractors for VASP console output.
    pub fn vasp_default() -> Self {
        let specs = vec![
            MetricSpec {
                name: metric_names::VERSION.to_string(),
                pattern: regex!(r"vasp\.(\d+\.\d+\.\d+)").clone(),
                kind: MetricKind::Text,
            },
            MetricSpec {
                name: metric_names::BANDS.to_string(),
                pattern: regex!(r"NBANDS\s*=\s*(\d+)").clone(),
                kind: MetricKind::Integer,
            },
            MetricSpec {
                name: metric_names::ELAPSED.to_string(),
                pattern: regex!(r"Elapsed time \(sec\):\s*([0-9]+(?:\.[0-9]*)?)").clone(),
                kind: MetricKind::Float,
            },
            MetricSpec {
                name: metric_names::HIGHEST_BAND_OCCUPIED.to_string(),
                pattern: regex!(r"(?i)highest band is occupied").clone(),
                kind: MetricKind::Flag,
            },
        ];
        MetricSet { specs }
    }

    /// Append an extractor; a later extractor with the same name shares the
    /// metric slot and overwrites it when it matches later in the stream.
    pub fn with(mut self, name: impl Into<String>, pattern: &str, kind: MetricKind) -> Result<Self, ConfigError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| ConfigError::InvalidMetric { name: name.clone(), source })?;
        self.specs.push(MetricSpec { name, pattern, kind });
        Ok(self)
    }

    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Apply every extractor to `line`, overwriting earlier values.
    pub(crate) fn apply(&self, line: &str, into: &mut BTreeMap<String, MetricValue>) {
        for spec in &self.specs {
            if let Some(value) = spec.extract(line) {
                into.insert(spec.name.clone(), value);
            }
        }
    }
}

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::engine::CompiledRules;
use crate::{Channel, ConfigError, Kind};

static DEFAULT_TABLE: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::from_yaml_str(include_str!("stream.yml")).expect("embedded stream.yml is a valid rule table")
});

/// One rule record as it appears in configuration.
///
/// `kind` and `location` stay strings here so that validation can report
/// unknown values as [`ConfigError`]s naming the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Filled from the mapping key when loaded from YAML.
    #[serde(skip)]
    pub id: String,
    pub kind: String,
    #[serde(default = "default_location")]
    pub location: String,
    pub regex: String,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub recover: bool,
    #[serde(default)]
    pub inverse: bool,
}

fn default_location() -> String {
    Channel::Stdout.as_str().to_string()
}

impl RuleSpec {
    /// A non-inverse, non-recoverable rule on `location`.
    pub fn new(id: impl Into<String>, kind: Kind, location: Channel, regex: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            location: location.as_str().to_string(),
            regex: regex.into(),
            message: String::new(),
            suggestion: None,
            recover: false,
            inverse: false,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn recoverable(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }
}

/// Ordered rule records, in mapping order.
struct RuleConfig(Vec<RuleSpec>);

impl<'de> Deserialize<'de> for RuleConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RuleConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from rule id to rule record")
            }

            // Duplicate keys are passed through so that the table, not the
            // YAML layer, reports them.
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RuleConfig, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, mut spec)) = map.next_entry::<String, RuleSpec>()? {
                    spec.id = id;
                    entries.push(spec);
                }
                Ok(RuleConfig(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A validated detection rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub kind: Kind,
    pub location: Channel,
    pub pattern: Regex,
    /// Fires when the pattern never appears on `location`.
    pub inverse: bool,
    /// When false a match is fatal and stops scanning of `location`.
    pub recoverable: bool,
    pub message: String,
    /// Empty when the configuration gave none.
    pub suggestion: String,
}

impl Rule {
    fn from_spec(spec: RuleSpec) -> Result<Self, ConfigError> {
        let kind = Kind::parse(&spec.kind)
            .ok_or_else(|| ConfigError::UnknownKind { id: spec.id.clone(), value: spec.kind.clone() })?;
        let location = Channel::parse(&spec.location)
            .ok_or_else(|| ConfigError::UnknownLocation { id: spec.id.clone(), value: spec.location.clone() })?;
        if spec.regex.is_empty() {
            return Err(ConfigError::EmptyPattern(spec.id));
        }
        let pattern =
            Regex::new(&spec.regex).map_err(|source| ConfigError::InvalidPattern { id: spec.id.clone(), source })?;

        Ok(Rule {
            id: spec.id,
            kind,
            location,
            pattern,
            inverse: spec.inverse,
            recoverable: spec.recover,
            message: spec.message,
            suggestion: spec.suggestion.unwrap_or_default(),
        })
    }

    /// The configuration record this rule was built from.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            id: self.id.clone(),
            kind: self.kind.as_str().to_string(),
            location: self.location.as_str().to_string(),
            regex: self.pattern.as_str().to_string(),
            message: self.message.clone(),
            suggestion: if self.suggestion.is_empty() { None } else { Some(self.suggestion.clone()) },
            recover: self.recoverable,
            inverse: self.inverse,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !self.recoverable
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}: {}", self.kind, self.id, self.message)
    }
}

/// Ordered, validated and immutable collection of [`Rule`]s.
///
/// Table order is evaluation order. The table carries its own per-channel
/// index so a scan never recompiles patterns.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
    compiled: CompiledRules,
}

impl RuleTable {
    /// Validate `specs` and build a table in the given order.
    pub fn new(specs: Vec<RuleSpec>) -> Result<Self, ConfigError> {
        let mut rules: Vec<Rule> = Vec::with_capacity(specs.len());
        for spec in specs {
            if rules.iter().any(|r| r.id == spec.id) {
                return Err(ConfigError::DuplicateId(spec.id));
            }
            rules.push(Rule::from_spec(spec)?);
        }
        let compiled = CompiledRules::new(&rules)?;

        trace!(
            "rules:load",
            "rules={} inverse={} stdout={} stderr={}",
            rules.len(),
            rules.iter().filter(|r| r.inverse).count(),
            compiled.line_rules(Channel::Stdout).len(),
            compiled.line_rules(Channel::Stderr).len()
        );

        Ok(RuleTable { rules, compiled })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let RuleConfig(specs) = serde_yaml::from_str(yaml)?;
        Self::new(specs)
    }

    pub fn from_yaml_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let RuleConfig(specs) = serde_yaml::from_reader(reader)?;
        Self::new(specs)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())?;
        Self::from_yaml_reader(BufReader::new(file))
    }

    /// The embedded table of known VASP conditions.
    pub fn vasp_default() -> &'static RuleTable {
        &DEFAULT_TABLE
    }

    /// Merge `overrides` into a copy of this table.
    ///
    /// An override whose id exists replaces that rule in place, keeping its
    /// evaluation position; other overrides are appended in order.
    pub fn with_overrides(&self, overrides: Vec<RuleSpec>) -> Result<Self, ConfigError> {
        let mut specs: Vec<RuleSpec> = self.rules.iter().map(Rule::to_spec).collect();
        let mut appended: Vec<RuleSpec> = Vec::new();
        for spec in overrides {
            if appended.iter().any(|s| s.id == spec.id) {
                return Err(ConfigError::DuplicateId(spec.id));
            }
            match specs.iter_mut().find(|s| s.id == spec.id) {
                Some(slot) => *slot = spec,
                None => appended.push(spec),
            }
        }
        specs.extend(appended);
        Self::new(specs)
    }

    /// Merge a YAML override document; see [`RuleTable::with_overrides`].
    pub fn with_yaml_overrides(&self, yaml: &str) -> Result<Self, ConfigError> {
        let RuleConfig(specs) = serde_yaml::from_str(yaml)?;
        self.with_overrides(specs)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Distinct kinds present in the table, in first-seen order.
    pub fn kinds(&self) -> Vec<Kind> {
        let mut kinds = Vec::new();
        for rule in &self.rules {
            if !kinds.contains(&rule.kind) {
                kinds.push(rule.kind);
            }
        }
        kinds
    }

    pub(crate) fn compiled(&self) -> &CompiledRules {
        &self.compiled
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

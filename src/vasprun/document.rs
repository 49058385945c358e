use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::reader::VasprunReader;
use crate::Error;
use crate::series::{self, EnergyKind, EnergyQuery, EnergySeries, Selection};

/// Scalar quantities of one step, keyed by the `name` attribute.
pub type Quantities = BTreeMap<String, Option<f64>>;

/// Rows of a `<varray>`, one inner vector per `<v>`.
pub type Rows = Vec<Vec<Option<f64>>>;

/// `<generator>` block: which program wrote the file, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Generator {
    pub program: String,
    pub version: String,
    pub subversion: String,
    pub platform: String,
    pub date: String,
    pub time: String,
}

impl Generator {
    /// Creation timestamp, when both `date` and `time` are present and well formed.
    pub fn generated_at(&self) -> Option<NaiveDateTime> {
        if self.date.is_empty() || self.time.is_empty() {
            return None;
        }
        let stamp = format!("{} {}", self.date.trim(), self.time.trim());
        NaiveDateTime::parse_from_str(&stamp, "%Y %m %d %H:%M:%S").ok()
    }

    pub(crate) fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "program" => &mut self.program,
            "version" => &mut self.version,
            "subversion" => &mut self.subversion,
            "platform" => &mut self.platform,
            "date" => &mut self.date,
            "time" => &mut self.time,
            _ => return,
        };
        *slot = value;
    }
}

/// One self-consistent electronic iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElectronicStep {
    pub quantities: Quantities,
}

impl ElectronicStep {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.quantities.get(name).copied().flatten()
    }
}

/// One ionic configuration and the electronic iterations that converged it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IonicStep {
    pub electronic_steps: Vec<ElectronicStep>,
    /// Energies reported after the electronic cycle.
    pub quantities: Quantities,
    /// One row per atom.
    pub forces: Rows,
    /// 3x3 stress tensor, row-major.
    pub stress: Rows,
    /// Lattice vectors of the step's structure.
    pub basis: Rows,
    /// Fractional coordinates, one row per atom.
    pub positions: Rows,
    pub efermi: Option<f64>,
}

impl IonicStep {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.quantities.get(name).copied().flatten()
    }
}

/// Everything recovered from one `vasprun.xml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub generator: Generator,
    pub incar: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
    pub ionic_steps: Vec<IonicStep>,
    /// Fermi level from a `<dos>` block outside any ionic step.
    pub efermi: Option<f64>,
    /// The file ended before the root element was closed.
    pub truncated: bool,
}

impl Document {
    /// Read a complete or truncated document.
    pub fn read<R: std::io::BufRead>(source: R) -> Result<Self, Error> {
        VasprunReader::read(source)
    }

    /// Integer INCAR tag, falling back to the full parameter list.
    pub fn tag_integer(&self, name: &str) -> Option<i64> {
        self.incar.get(name).or_else(|| self.parameters.get(name))?.trim().parse().ok()
    }

    pub fn nbands(&self) -> Option<i64> {
        self.tag_integer("NBANDS")
    }

    pub fn nsw(&self) -> Option<i64> {
        self.tag_integer("NSW")
    }

    pub fn last_ionic_step(&self) -> Option<&IonicStep> {
        self.ionic_steps.last()
    }

    pub fn steps(&self, selection: Selection) -> &[IonicStep] {
        selection.pick(&self.ionic_steps)
    }

    pub fn forces(&self, selection: Selection) -> Vec<&Rows> {
        self.steps(selection).iter().map(|s| &s.forces).collect()
    }

    pub fn stress(&self, selection: Selection) -> Vec<&Rows> {
        self.steps(selection).iter().map(|s| &s.stress).collect()
    }

    pub fn positions(&self, selection: Selection) -> Vec<&Rows> {
        self.steps(selection).iter().map(|s| &s.positions).collect()
    }

    pub fn basis(&self, selection: Selection) -> Vec<&Rows> {
        self.steps(selection).iter().map(|s| &s.basis).collect()
    }

    /// Fermi level of the last step that reports one, else the document-level value.
    pub fn fermi_level(&self) -> Option<f64> {
        self.ionic_steps.iter().rev().find_map(|s| s.efermi).or(self.efermi)
    }

    pub fn electronic_step_count(&self) -> usize {
        self.ionic_steps.iter().map(|s| s.electronic_steps.len()).sum()
    }

    /// Shortcut for [`series::energies`].
    pub fn energies(&self, kind: EnergyKind, query: EnergyQuery) -> EnergySeries {
        series::energies(self, kind, query)
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VasprunReader::read(s.as_bytes())
    }
}

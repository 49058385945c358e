//! Flatten/unflatten codec for ragged per-step series.
//!
//! A sequence of ionic steps, each holding a variable number of electronic
//! steps, is stored as one flat value array plus the number of values that
//! belong to each ionic step:
//!
//! ```text
//! [[a, b, c], [d, e]]  ⇄  values = [a, b, c, d, e], counts = [3, 2]
//! ```
//!
//! `unflatten(flatten_nested(x)) == x` for every input, including inner
//! sequences of length zero, and `flatten_nested(unflatten(s)) == s` for
//! every series whose counts add up to its length. Any other series is
//! rejected with [`InconsistentSeriesError`].

use serde::Serialize;

use crate::{Document, InconsistentSeriesError};

/// Flat values plus per-group lengths. `counts` sums to `values.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlattenedSeries<T> {
    pub values: Vec<T>,
    pub counts: Vec<usize>,
}

impl<T> FlattenedSeries<T> {
    /// Number of groups (ionic steps).
    pub fn groups(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of group `index`, if the series is consistent and the group exists.
    pub fn group(&self, index: usize) -> Option<&[T]> {
        let start = total(self.counts.get(..index)?)?;
        let end = start.checked_add(*self.counts.get(index)?)?;
        self.values.get(start..end)
    }

    fn check(&self) -> Result<(), InconsistentSeriesError> {
        let stored = self.values.len();
        match total(&self.counts) {
            Some(counted) if counted == stored => Ok(()),
            // Saturated: an overflowing sum never matches a real length.
            counted => Err(InconsistentSeriesError { counted: counted.unwrap_or(usize::MAX), stored }),
        }
    }
}

fn total(counts: &[usize]) -> Option<usize> {
    counts.iter().try_fold(0usize, |sum, &count| sum.checked_add(count))
}

pub fn flatten_nested<T: Clone>(nested: &[Vec<T>]) -> FlattenedSeries<T> {
    FlattenedSeries {
        values: nested.iter().flatten().cloned().collect(),
        counts: nested.iter().map(Vec::len).collect(),
    }
}

/// Rebuild the nested form; fails when `counts` does not add up to the
/// number of stored values.
pub fn unflatten<T: Clone>(series: &FlattenedSeries<T>) -> Result<Vec<Vec<T>>, InconsistentSeriesError> {
    series.check()?;
    let mut rest = series.values.as_slice();
    let mut nested = Vec::with_capacity(series.counts.len());
    for &count in &series.counts {
        let (head, tail) = rest.split_at(count);
        nested.push(head.to_vec());
        rest = tail;
    }
    Ok(nested)
}

/// Electronic-step values of `field` across the whole document, grouped
/// per ionic step.
pub fn flatten(document: &Document, field: &str) -> FlattenedSeries<Option<f64>> {
    let nested: Vec<Vec<Option<f64>>> = document
        .ionic_steps
        .iter()
        .map(|ionic| ionic.electronic_steps.iter().map(|e| e.quantities.get(field).copied().flatten()).collect())
        .collect();
    flatten_nested(&nested)
}

/// Which energy column to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyKind {
    /// Energy extrapolated to zero smearing (`e_0_energy`).
    Extrapolated,
    /// Free energy (`e_fr_energy`).
    Free,
    /// Energy without the entropy term (`e_wo_entrp`).
    NoEntropy,
}

impl EnergyKind {
    pub fn field(self) -> &'static str {
        match self {
            EnergyKind::Extrapolated => "e_0_energy",
            EnergyKind::Free => "e_fr_energy",
            EnergyKind::NoEntropy => "e_wo_entrp",
        }
    }
}

/// Which ionic steps to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Initial,
    Last,
}

impl Selection {
    /// The selected slice of `items`; empty when `items` is.
    pub fn pick<T>(self, items: &[T]) -> &[T] {
        match self {
            Selection::All => items,
            Selection::Initial => &items[..items.len().min(1)],
            Selection::Last => &items[items.len().saturating_sub(1)..],
        }
    }
}

/// Which electronic steps to report within each selected ionic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectronicSteps {
    #[default]
    All,
    /// Only the converged (last) electronic step.
    LastOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyQuery {
    pub selection: Selection,
    pub electronic: ElectronicSteps,
}

impl EnergyQuery {
    pub fn new(selection: Selection, electronic: ElectronicSteps) -> Self {
        Self { selection, electronic }
    }
}

/// Energies of the selected ionic steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergySeries {
    /// Electronic-step energies, grouped per selected ionic step.
    pub scf: FlattenedSeries<Option<f64>>,
    /// Energy reported after each selected ionic step's electronic cycle.
    pub final_values: Vec<Option<f64>>,
}

pub fn energies(document: &Document, kind: EnergyKind, query: EnergyQuery) -> EnergySeries {
    let selected = document.steps(query.selection);
    let field = kind.field();

    let nested: Vec<Vec<Option<f64>>> = selected
        .iter()
        .map(|ionic| -> Vec<Option<f64>> {
            let scf = ionic.electronic_steps.iter().map(|e| e.quantities.get(field).copied().flatten());
            match query.electronic {
                ElectronicSteps::All => scf.collect(),
                ElectronicSteps::LastOnly => scf.last().into_iter().collect(),
            }
        })
        .collect();

    EnergySeries {
        scf: flatten_nested(&nested),
        final_values: selected.iter().map(|ionic| ionic.quantities.get(field).copied().flatten()).collect(),
    }
}

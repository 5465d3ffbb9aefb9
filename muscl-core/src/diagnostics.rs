//! Aggregation of per-cell numerical failures.
//!
//! A parallel kernel cannot return an error from one work item, so every
//! cell produces a [`CellReport`] and the reports are merged with an
//! associative reduction. The merge keeps the offending cell with the lowest
//! linear index so the reported cell does not depend on scheduling.

use std::fmt;

/// What went wrong in a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Violation {
    NegativeDensity(f64),
    NegativePressure(f64),
    NonFinite,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NegativeDensity(rho) => write!(f, "non-positive density {rho:e}"),
            Violation::NegativePressure(p) => write!(f, "negative pressure {p:e}"),
            Violation::NonFinite => write!(f, "non-finite value"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellReport {
    pub density: u64,
    pub pressure: u64,
    pub non_finite: u64,
    /// Linear index and kind of the first offending cell.
    pub first: Option<(usize, Violation)>,
}

impl CellReport {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn flag(idx: usize, violation: Violation) -> Self {
        let mut r = Self {
            first: Some((idx, violation)),
            ..Self::default()
        };
        match violation {
            Violation::NegativeDensity(_) => r.density = 1,
            Violation::NegativePressure(_) => r.pressure = 1,
            Violation::NonFinite => r.non_finite = 1,
        }
        r
    }

    pub fn merge(self, other: Self) -> Self {
        let first = match (self.first, other.first) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (a, b) => a.or(b),
        };
        Self {
            density: self.density + other.density,
            pressure: self.pressure + other.pressure,
            non_finite: self.non_finite + other.non_finite,
            first,
        }
    }

    pub fn count(&self) -> u64 {
        self.density + self.pressure + self.non_finite
    }

    pub fn is_clean(&self) -> bool {
        self.first.is_none()
    }
}

/// Recovered events accumulated over a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunDiagnostics {
    pub density_floors: u64,
    pub pressure_floors: u64,
    pub non_finite_cells: u64,
    pub clamped_steps: u64,
}

impl RunDiagnostics {
    pub fn record(&mut self, report: &CellReport) {
        self.density_floors += report.density;
        self.pressure_floors += report.pressure;
        self.non_finite_cells += report.non_finite;
    }

    pub fn total(&self) -> u64 {
        self.density_floors + self.pressure_floors + self.non_finite_cells + self.clamped_steps
    }
}

impl fmt::Display for RunDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "density floors: {}, pressure floors: {}, non-finite cells: {}, clamped steps: {}",
            self.density_floors, self.pressure_floors, self.non_finite_cells, self.clamped_steps
        )
    }
}

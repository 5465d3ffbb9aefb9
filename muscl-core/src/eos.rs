//! Ideal-gas closure: conservative <-> primitive conversion, sound speed and
//! the physical Euler flux.

use crate::diagnostics::{CellReport, Violation};
use crate::exec;
use crate::state::{Field, HydroState, ID, IE, IP, IU};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdealGas {
    pub gamma: f64,
    /// Density floor.
    pub smallr: f64,
    /// Sound-speed floor.
    pub smallc: f64,
    /// Specific pressure floor, `p >= rho * smallp`.
    pub smallp: f64,
}

impl IdealGas {
    pub fn new(gamma: f64, smallr: f64, smallc: f64) -> Self {
        Self {
            gamma,
            smallr,
            smallc,
            smallp: smallc * smallc / gamma,
        }
    }

    /// Conservative to primitive.
    ///
    /// Never fails: density and pressure are floored and the returned
    /// violation (if any) tells the caller what had to be repaired.
    #[inline]
    pub fn to_primitive<const D: usize>(&self, u: &HydroState) -> (HydroState, Option<Violation>) {
        let mut violation = None;
        if !u.is_finite() {
            violation = Some(Violation::NonFinite);
        } else if u[ID] <= 0.0 {
            violation = Some(Violation::NegativeDensity(u[ID]));
        }

        let d = if u[ID].is_finite() { u[ID].max(self.smallr) } else { self.smallr };
        let mut q = HydroState::ZERO;
        q[ID] = d;

        let mut ekin = 0.0;
        for a in 0..D {
            let v = u[IU + a] / d;
            q[IU + a] = if v.is_finite() { v } else { 0.0 };
            ekin += 0.5 * d * q[IU + a] * q[IU + a];
        }

        let p = (self.gamma - 1.0) * (u[IE] - ekin);
        if violation.is_none() && p < 0.0 {
            violation = Some(Violation::NegativePressure(p));
        }
        q[IP] = if p.is_finite() { p.max(d * self.smallp) } else { d * self.smallp };

        (q, violation)
    }

    /// Primitive to conservative: `E = p/(gamma-1) + rho |v|^2 / 2`.
    #[inline]
    pub fn to_conservative<const D: usize>(&self, q: &HydroState) -> HydroState {
        let d = q[ID];
        let mut u = HydroState::ZERO;
        u[ID] = d;
        let mut ekin = 0.0;
        for a in 0..D {
            u[IU + a] = d * q[IU + a];
            ekin += 0.5 * d * q[IU + a] * q[IU + a];
        }
        u[IE] = q[IP] / (self.gamma - 1.0) + ekin;
        u
    }

    #[inline]
    pub fn sound_speed(&self, q: &HydroState) -> f64 {
        (self.gamma * q[IP] / q[ID]).abs().sqrt().max(self.smallc)
    }

    /// Apply the floors to a primitive state (used on reconstructed face values).
    #[inline]
    pub fn floor_primitive(&self, mut q: HydroState) -> HydroState {
        q[ID] = q[ID].max(self.smallr);
        q[IP] = q[IP].max(q[ID] * self.smallp);
        q
    }

    /// Physical flux of a primitive state through a face normal to `axis`.
    #[inline]
    pub fn flux<const D: usize>(&self, q: &HydroState, axis: usize) -> HydroState {
        let u = self.to_conservative::<D>(q);
        let vn = q[IU + axis];
        let mut f = u * vn;
        f[IU + axis] += q[IP];
        f[IE] += q[IP] * vn;
        f
    }
}

/// Primitive variables of every cell of `u`, ghosts included. Only interior
/// cells are reported; ghosts are copies and would count a cell twice.
pub fn convert_to_primitives<const D: usize>(gas: &IdealGas, u: &Field<D>, q: &mut Field<D>) -> CellReport {
    let grid = *u.grid();
    exec::for_each_cell_reported(q.as_mut_slice(), |idx, qc| {
        let (prim, violation) = gas.to_primitive::<D>(&u[idx]);
        *qc = prim;
        match violation {
            Some(v) if grid.is_interior(grid.coords(idx)) => CellReport::flag(idx, v),
            _ => CellReport::clean(),
        }
    })
}

//! Limited slopes of primitive variables and face-state reconstruction.
//!
//! Slopes are undivided differences (per cell, not per unit length). A face
//! value is the cell value plus or minus half the slope, optionally after a
//! half-step MUSCL-Hancock predictor.

use serde::{Deserialize, Serialize};

use crate::config::named_options;
use crate::eos::IdealGas;
use crate::exec;
use crate::state::{Field, HydroState, ID, IP, IU, NVAR};

/// Monotonicity-preserving limiter applied to the one-sided differences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlopeLimiter {
    Minmod,
    /// Monotonized central.
    #[default]
    Mc,
    VanLeer,
}

named_options!(SlopeLimiter, "hydro.limiter", {
    Minmod => "minmod",
    Mc => "mc",
    VanLeer => "van_leer",
});

impl SlopeLimiter {
    /// Limited slope from the left (`q - q_minus`) and right (`q_plus - q`)
    /// differences. Zero at extrema; otherwise never more than twice the
    /// smaller difference, so `q +- slope/2` stays within the neighbours.
    #[inline]
    pub fn limit(self, dl: f64, dr: f64) -> f64 {
        if dl * dr <= 0.0 {
            return 0.0;
        }
        match self {
            SlopeLimiter::Minmod => mc_family(1.0, dl, dr),
            SlopeLimiter::Mc => mc_family(2.0, dl, dr),
            SlopeLimiter::VanLeer => 2.0 * dl * dr / (dl + dr),
        }
    }
}

#[inline]
fn mc_family(k: f64, dl: f64, dr: f64) -> f64 {
    let dcen = 0.5 * (dl + dr);
    let dlim = (k * dl).abs().min((k * dr).abs());
    dcen.signum() * dlim.min(dcen.abs())
}

/// Limited slope of every variable of `q` given its two neighbours along one axis.
#[inline]
pub fn slope(limiter: SlopeLimiter, qm: &HydroState, q: &HydroState, qp: &HydroState) -> HydroState {
    HydroState(std::array::from_fn(|v| limiter.limit(q[v] - qm[v], qp[v] - q[v])))
}

/// Half-step MUSCL-Hancock predictor: the time derivative of the primitive
/// state from the quasi-linear Euler equations, times `dt/2`.
///
/// `dtdx[a]` is `dt / dx[a]`. With `only_axis` set, only that axis
/// contributes (directional sweeps).
#[inline]
pub fn hancock_source<const D: usize>(
    gas: &IdealGas,
    q: &HydroState,
    dq: &[HydroState; D],
    dtdx: &[f64; D],
    only_axis: Option<usize>,
) -> HydroState {
    let r = q[ID];
    let p = q[IP];
    let mut s = HydroState::ZERO;

    for a in 0..D {
        if only_axis.is_some_and(|axis| axis != a) {
            continue;
        }
        let h = 0.5 * dtdx[a];
        let ua = q[IU + a];
        let d = &dq[a];

        s[ID] += (-ua * d[ID] - r * d[IU + a]) * h;
        s[IP] += (-ua * d[IP] - gas.gamma * p * d[IU + a]) * h;
        for b in 0..D {
            s[IU + b] -= ua * d[IU + b] * h;
        }
        s[IU + a] -= d[IP] / r * h;
    }
    s
}

/// Face state on `high` (or low) side of a cell: `q +- dq/2`, floored.
#[inline]
pub fn face_state(gas: &IdealGas, q: &HydroState, dq: &HydroState, high: bool) -> HydroState {
    let half = if high { 0.5 } else { -0.5 };
    let mut f = HydroState::ZERO;
    for v in 0..NVAR {
        f[v] = q[v] + half * dq[v];
    }
    gas.floor_primitive(f)
}

/// Slopes of every cell along every axis. A cell on the outermost ghost
/// layer of an axis has no neighbour there and gets a zero slope.
pub fn compute_slopes<const D: usize>(
    limiter: SlopeLimiter,
    q: &Field<D>,
    slopes: &mut [[HydroState; D]],
) {
    let grid = *q.grid();
    let total = grid.total();
    debug_assert_eq!(slopes.len(), grid.n_cells_total());

    exec::for_each_cell(slopes, |idx, dq| {
        let c = grid.coords(idx);
        for a in 0..D {
            dq[a] = if c[a] >= 1 && c[a] + 1 < total[a] {
                let s = grid.stride(a);
                slope(limiter, &q[idx - s], &q[idx], &q[idx + s])
            } else {
                HydroState::ZERO
            };
        }
    });
}

/// Cell-centred primitive state advanced half a step with
/// [`hancock_source`]; faces are then built from it with [`face_state`].
pub fn trace<const D: usize>(
    gas: &IdealGas,
    q: &Field<D>,
    slopes: &[[HydroState; D]],
    dtdx: [f64; D],
    only_axis: Option<usize>,
    out: &mut Field<D>,
) {
    exec::for_each_cell(out.as_mut_slice(), |idx, qh| {
        *qh = q[idx] + hancock_source(gas, &q[idx], &slopes[idx], &dtdx, only_axis);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::IV;

    const ALL: [SlopeLimiter; 3] = [SlopeLimiter::Minmod, SlopeLimiter::Mc, SlopeLimiter::VanLeer];

    fn gas() -> IdealGas {
        IdealGas::new(1.4, 1e-10, 1e-10)
    }

    #[test]
    fn limiters_on_smooth_and_extremal_data() {
        for lim in ALL {
            assert_eq!(lim.limit(1.0, -1.0), 0.0, "{lim}");
            assert_eq!(lim.limit(0.0, 3.0), 0.0, "{lim}");
            assert!((lim.limit(1.0, 1.0) - 1.0).abs() < 1e-15, "{lim}");
        }
        assert_eq!(SlopeLimiter::Minmod.limit(1.0, 3.0), 1.0);
        assert_eq!(SlopeLimiter::Mc.limit(1.0, 3.0), 2.0);
        assert_eq!(SlopeLimiter::Mc.limit(-1.0, -1.5), -1.25);
        assert!((SlopeLimiter::VanLeer.limit(1.0, 3.0) - 1.5).abs() < 1e-15);
    }

    #[test]
    fn faces_stay_within_neighbours() {
        let samples = [(0.0, 1.0, 5.0), (2.0, 1.9, 0.1), (1.0, 1.1, 1.05), (-3.0, 0.0, 0.2)];
        for lim in ALL {
            for &(qm, q, qp) in &samples {
                let s = lim.limit(q - qm, qp - q);
                let (lo, hi) = (qm.min(q).min(qp), qm.max(q).max(qp));
                for face in [q - 0.5 * s, q + 0.5 * s] {
                    assert!(face >= lo - 1e-14 && face <= hi + 1e-14, "{lim}: {face}");
                }
            }
        }
    }

    #[test]
    fn flat_input_gives_zero_slope_and_source() {
        let q = HydroState([1.2, 0.7, 0.3, -0.1, 0.0]);
        for lim in ALL {
            let dq = slope(lim, &q, &q, &q);
            assert_eq!(dq, HydroState::ZERO);
            let s = hancock_source::<2>(&gas(), &q, &[dq; 2], &[0.1, 0.2], None);
            assert_eq!(s, HydroState::ZERO);
            assert_eq!(face_state(&gas(), &q, &dq, true), q);
            assert_eq!(face_state(&gas(), &q, &dq, false), q);
        }
    }

    #[test]
    fn source_advects_density_gradient() {
        // Pure advection at u = 1 of a density ramp: drho/dt = -u drho/dx.
        let q = HydroState([1.0, 1.0, 1.0, 0.0, 0.0]);
        let mut dx = HydroState::ZERO;
        dx[ID] = 0.2;
        let s = hancock_source::<1>(&gas(), &q, &[dx], &[0.5], None);
        assert!((s[ID] + 0.05).abs() < 1e-15);
        assert_eq!(s[IU], 0.0);
        assert_eq!(s[IP], 0.0);
    }

    #[test]
    fn split_source_ignores_other_axes() {
        let q = HydroState([1.0, 1.0, 0.5, 0.5, 0.0]);
        let mut dy = HydroState::ZERO;
        dy[IP] = 0.1;
        let dq = [HydroState::ZERO, dy];
        let s = hancock_source::<2>(&gas(), &q, &dq, &[0.1, 0.1], Some(0));
        assert_eq!(s, HydroState::ZERO);
        let s = hancock_source::<2>(&gas(), &q, &dq, &[0.1, 0.1], Some(1));
        assert!((s[IV] + 0.005).abs() < 1e-15);
    }

    #[test]
    fn slope_kernel_on_linear_ramp() {
        use crate::grid::Grid;

        let grid = Grid::<2>::new([4, 3], [0.0; 2], [1.0; 2]);
        let mut q = Field::new(grid);
        for idx in 0..grid.n_cells_total() {
            let c = grid.coords(idx);
            q[idx] = HydroState([1.0 + 0.1 * c[0] as f64, 1.0, 0.0, 0.0, 0.0]);
        }
        let mut slopes = vec![[HydroState::ZERO; 2]; grid.n_cells_total()];
        compute_slopes(SlopeLimiter::Mc, &q, &mut slopes);

        let inner = grid.index([3, 2]);
        assert!((slopes[inner][0][ID] - 0.1).abs() < 1e-14);
        assert_eq!(slopes[inner][1][ID], 0.0);
        // outermost layer has no left neighbour
        assert_eq!(slopes[grid.index([0, 2])][0], HydroState::ZERO);
    }

    #[test]
    fn face_state_is_floored() {
        let q = HydroState([1e-12, 1e-12, 0.0, 0.0, 0.0]);
        let dq = HydroState([1.0, 1.0, 0.0, 0.0, 0.0]);
        let f = face_state(&gas(), &q, &dq, false);
        assert!(f[ID] > 0.0 && f[IP] > 0.0);
    }
}

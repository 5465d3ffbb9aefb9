//! Face-flux kernels.
//!
//! Along axis `a` the flux through the low face of cell `i` is stored at
//! index `i` of that axis' flux field, so cell `i` is bounded by the faces at
//! `i` and `i + stride(a)`. Only active faces are computed; the rest are
//! zeroed so a stale value can never leak into an update.

use crate::eos::IdealGas;
use crate::exec;
use crate::grid::GHOST_WIDTH;
use crate::riemann::{RiemannContext, RiemannSolverKind, solve_face};
use crate::slope::{SlopeLimiter, face_state, hancock_source, slope};
use crate::state::{Field, HydroState};

/// Cells a face reaches on each side: the face between `i-1` and `i` needs
/// the slopes of both, i.e. cells `i-2 ..= i+1`.
pub const STENCIL_REACH: usize = 2;

const _: () = assert!(GHOST_WIDTH >= STENCIL_REACH);

/// Everything a face kernel needs besides the fields.
#[derive(Clone, Copy, Debug)]
pub struct FaceScheme {
    pub riemann: RiemannSolverKind,
    pub limiter: SlopeLimiter,
    pub ctx: RiemannContext,
}

impl FaceScheme {
    pub fn gas(&self) -> &IdealGas {
        &self.ctx.gas
    }
}

/// Version 0: the slopes and the half-step predictor of the two cells of a
/// face are evaluated inline, so nothing is kept between stages. Each cell's
/// slopes are recomputed for every face that touches it.
pub fn direct_fluxes<const D: usize>(
    scheme: &FaceScheme,
    q: &Field<D>,
    dtdx: [f64; D],
    only_axis: Option<usize>,
    axis: usize,
    flux: &mut Field<D>,
) {
    let grid = *q.grid();
    let s = grid.stride(axis);
    let gas = scheme.gas();

    // predicted cell state and its slope along `axis`
    let predict = |c: usize| {
        let dq: [HydroState; D] = std::array::from_fn(|b| {
            if only_axis.is_some_and(|a| a != b) {
                return HydroState::ZERO;
            }
            let t = grid.stride(b);
            slope(scheme.limiter, &q[c - t], &q[c], &q[c + t])
        });
        let qh = q[c] + hancock_source(gas, &q[c], &dq, &dtdx, only_axis);
        (qh, dq[axis])
    };

    exec::for_each_cell(flux.as_mut_slice(), |i, f| {
        if !grid.is_active_face(grid.coords(i), axis) {
            *f = HydroState::ZERO;
            return;
        }
        let (qhl, dql) = predict(i - s);
        let (qhr, dqr) = predict(i);

        let ql = face_state(gas, &qhl, &dql, true);
        let qr = face_state(gas, &qhr, &dqr, false);
        *f = solve_face(&scheme.riemann, &ql, &qr, axis, &scheme.ctx);
    });
}

/// Version 1: faces from the half-step traced state `qh` and the stored
/// slopes.
pub fn traced_fluxes<const D: usize>(
    scheme: &FaceScheme,
    qh: &Field<D>,
    slopes: &[[HydroState; D]],
    axis: usize,
    flux: &mut Field<D>,
) {
    let grid = *qh.grid();
    let s = grid.stride(axis);
    let gas = scheme.gas();

    exec::for_each_cell(flux.as_mut_slice(), |i, f| {
        if !grid.is_active_face(grid.coords(i), axis) {
            *f = HydroState::ZERO;
            return;
        }
        let im = i - s;
        let ql = face_state(gas, &qh[im], &slopes[im][axis], true);
        let qr = face_state(gas, &qh[i], &slopes[i][axis], false);
        *f = solve_face(&scheme.riemann, &ql, &qr, axis, &scheme.ctx);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::slope::{compute_slopes, trace};
    use crate::state::{ID, IE, IU, IV};

    fn scheme(riemann: RiemannSolverKind) -> FaceScheme {
        FaceScheme {
            riemann,
            limiter: SlopeLimiter::Mc,
            ctx: RiemannContext::new(IdealGas::new(1.4, 1e-10, 1e-10), 10),
        }
    }

    fn uniform(grid: Grid<2>, q: HydroState) -> Field<2> {
        let mut f = Field::new(grid);
        f.fill(q);
        f
    }

    #[test]
    fn uniform_flow_gives_physical_flux_on_every_active_face() {
        let grid = Grid::<2>::new([5, 4], [0.0; 2], [1.0; 2]);
        let q0 = HydroState([1.0, 1.0, 0.3, -0.2, 0.0]);
        let q = uniform(grid, q0);
        let sc = scheme(RiemannSolverKind::Hllc);

        for axis in 0..2 {
            let exact = sc.gas().flux::<2>(&q0, axis);
            let mut direct = Field::new(grid);
            direct_fluxes(&sc, &q, [0.1, 0.1], None, axis, &mut direct);

            let mut slopes = vec![[HydroState::ZERO; 2]; grid.n_cells_total()];
            compute_slopes(sc.limiter, &q, &mut slopes);
            let mut qh = Field::new(grid);
            trace(sc.gas(), &q, &slopes, [0.1, 0.1], None, &mut qh);
            let mut traced = Field::new(grid);
            traced_fluxes(&sc, &qh, &slopes, axis, &mut traced);

            for i in 0..grid.n_cells_total() {
                if grid.is_active_face(grid.coords(i), axis) {
                    for v in [ID, IE, IU, IV] {
                        assert!((direct[i][v] - exact[v]).abs() < 1e-12);
                        assert!((traced[i][v] - exact[v]).abs() < 1e-12);
                    }
                } else {
                    assert_eq!(direct[i], HydroState::ZERO);
                }
            }
        }
    }

    #[test]
    fn inline_and_staged_predictors_give_the_same_faces() {
        let grid = Grid::<2>::new([6, 5], [0.0; 2], [1.0; 2]);
        let mut q = Field::new(grid);
        for i in 0..grid.n_cells_total() {
            let [x, y] = grid.coords(i).map(|c| c as f64);
            q[i] = HydroState([
                1.0 + 0.3 * (0.9 * x).sin() + 0.1 * y,
                1.0 + 0.5 * (0.7 * y).cos().abs() + 0.05 * x * y,
                0.2 * (x - y).sin(),
                -0.1 + 0.03 * x,
                0.0,
            ]);
        }
        let sc = scheme(RiemannSolverKind::Hllc);
        let dtdx = [0.2, 0.15];

        let mut slopes = vec![[HydroState::ZERO; 2]; grid.n_cells_total()];
        compute_slopes(sc.limiter, &q, &mut slopes);
        for only_axis in [None, Some(0), Some(1)] {
            let mut qh = Field::new(grid);
            trace(sc.gas(), &q, &slopes, dtdx, only_axis, &mut qh);

            for axis in only_axis.map_or(vec![0, 1], |a| vec![a]) {
                let mut direct = Field::new(grid);
                direct_fluxes(&sc, &q, dtdx, only_axis, axis, &mut direct);
                let mut traced = Field::new(grid);
                traced_fluxes(&sc, &qh, &slopes, axis, &mut traced);

                for i in 0..grid.n_cells_total() {
                    for v in 0..4 {
                        assert!(
                            (direct[i][v] - traced[i][v]).abs() < 1e-13,
                            "{only_axis:?} axis {axis} cell {i} var {v}"
                        );
                    }
                }
                // the field is not uniform, so the predictor actually moved the faces
                let mut flat = Field::new(grid);
                direct_fluxes(&sc, &q, [0.0, 0.0], only_axis, axis, &mut flat);
                assert!((0..grid.n_cells_total()).any(|i| (flat[i][ID] - direct[i][ID]).abs() > 1e-8));
            }
        }
    }

    #[test]
    fn active_face_count_per_axis() {
        let grid = Grid::<2>::new([5, 4], [0.0; 2], [1.0; 2]);
        let q = uniform(grid, HydroState([1.0, 1.0, 0.0, 0.0, 0.0]));
        let sc = scheme(RiemannSolverKind::Hll);
        let mut f = Field::new(grid);
        direct_fluxes(&sc, &q, [0.1, 0.1], None, 0, &mut f);
        // pressure flux is non-zero on exactly the (5+1)*4 x-faces
        let nonzero = f.as_slice().iter().filter(|v| v[IU] != 0.0).count();
        assert_eq!(nonzero, 24);
    }
}

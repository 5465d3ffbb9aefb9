//! Finite-volume divergence update.

use crate::diagnostics::CellReport;
use crate::eos::IdealGas;
use crate::exec;
use crate::grid::GHOST_WIDTH;
use crate::state::{Field, HydroState};

/// `u_out[i] = u_in[i] + sum_a dt/dx_a (F_a[i] - F_a[i + stride_a])` over
/// the interior, for the axes listed in `axes` (all of them in an unsplit
/// step, one per directional sweep). Ghost cells are copied unchanged.
///
/// An updated cell that is no longer physical is replaced by its floored
/// state and reported; whether that is fatal is the caller's decision.
pub fn update<const D: usize>(
    gas: &IdealGas,
    u_in: &Field<D>,
    fluxes: &[Field<D>],
    axes: &[usize],
    dtdx: [f64; D],
    u_out: &mut Field<D>,
) -> CellReport {
    let grid = *u_in.grid();
    debug_assert_eq!(fluxes.len(), D);

    exec::for_each_cell_reported(u_out.as_mut_slice(), |i, out| {
        let c = grid.coords(i);
        if !grid.is_interior(c) {
            *out = u_in[i];
            return CellReport::clean();
        }

        let mut u = u_in[i];
        for &a in axes {
            debug_assert!(grid.is_active_face(c, a));
            let s = grid.stride(a);
            let f = &fluxes[a];
            u = u + (f[i] - f[i + s]) * dtdx[a];
        }

        match gas.to_primitive::<D>(&u) {
            (_, None) => {
                *out = u;
                CellReport::clean()
            }
            (q, Some(violation)) => {
                *out = gas.to_conservative::<D>(&q);
                CellReport::flag(i, violation)
            }
        }
    })
}

/// Sum of `dt/dx_a` times the net flux through the domain faces of this
/// block: what [`update`] adds to the interior total. Used to check
/// conservation.
pub fn boundary_flux_total<const D: usize>(fluxes: &[Field<D>], axes: &[usize], dtdx: [f64; D]) -> HydroState {
    let mut total = HydroState::ZERO;
    for &a in axes {
        let f = &fluxes[a];
        let grid = *f.grid();
        let hi = GHOST_WIDTH + grid.n()[a];
        for i in 0..grid.n_cells_total() {
            let c = grid.coords(i);
            if !grid.is_active_face(c, a) {
                continue;
            }
            if c[a] == GHOST_WIDTH {
                total = total + f[i] * dtdx[a];
            } else if c[a] == hi {
                total = total - f[i] * dtdx[a];
            }
        }
    }
    total
}

//! Ghost-cell filling.
//!
//! Axes are processed in order (x, then y, then z) and every fill covers the
//! full transverse extent of the mesh, ghosts included. Corner ghosts are
//! therefore only consistent once the last axis has been filled; the MUSCL
//! face stencil never reads them, so this is sufficient here. A stencil that
//! reads diagonal neighbours would need a different ordering.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::comm::Communicator;
use crate::config::named_options;
use crate::error::HydroResult;
use crate::grid::{GHOST_WIDTH, Grid, Side};
use crate::state::{Field, HydroState, IU};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Zero-gradient outflow: copy the nearest interior cell.
    #[default]
    Absorbing,
    /// Solid wall: mirror the interior, negate the normal velocity.
    Reflecting,
    /// Copy from the opposite face.
    Periodic,
}

named_options!(BoundaryKind, "mesh.boundary", {
    Absorbing => "absorbing",
    Reflecting => "reflecting",
    Periodic => "periodic",
});

/// Ghost layers on `side` of an axis with `n` interior cells (total coords).
pub fn ghost_layers(side: Side, n: usize) -> Range<usize> {
    match side {
        Side::Low => 0..GHOST_WIDTH,
        Side::High => n + GHOST_WIDTH..n + 2 * GHOST_WIDTH,
    }
}

/// Interior layers adjacent to `side`; what a neighbour needs for its ghosts.
pub fn edge_layers(side: Side, n: usize) -> Range<usize> {
    match side {
        Side::Low => GHOST_WIDTH..2 * GHOST_WIDTH,
        Side::High => n..n + GHOST_WIDTH,
    }
}

/// Interior coordinate that ghost coordinate `i` copies from.
#[inline]
pub fn ghost_source(kind: BoundaryKind, side: Side, i: usize, n: usize) -> usize {
    let g = GHOST_WIDTH;
    match (kind, side) {
        (BoundaryKind::Absorbing, Side::Low) => g,
        (BoundaryKind::Absorbing, Side::High) => n + g - 1,
        (BoundaryKind::Reflecting, Side::Low) => 2 * g - 1 - i,
        (BoundaryKind::Reflecting, Side::High) => 2 * (n + g) - 1 - i,
        (BoundaryKind::Periodic, Side::Low) => i + n,
        (BoundaryKind::Periodic, Side::High) => i - n,
    }
}

/// Fill the ghosts of one face from the local interior.
pub fn fill_ghosts<const D: usize>(
    field: &mut Field<D>,
    axis: usize,
    side: Side,
    kind: BoundaryKind,
) {
    let grid = *field.grid();
    let n = grid.n()[axis];

    for c in grid.slab(axis, ghost_layers(side, n)) {
        let mut src = c;
        src[axis] = ghost_source(kind, side, c[axis], n);

        let mut q = field.at(src);
        if kind == BoundaryKind::Reflecting {
            q[IU + axis] = -q[IU + axis];
        }
        *field.at_mut(c) = q;
    }
}

fn pack<const D: usize>(field: &Field<D>, grid: &Grid<D>, axis: usize, side: Side) -> Vec<HydroState> {
    grid.slab(axis, edge_layers(side, grid.n()[axis]))
        .map(|c| field.at(c))
        .collect()
}

fn unpack<const D: usize>(field: &mut Field<D>, axis: usize, side: Side, cells: &[HydroState]) {
    let grid = *field.grid();
    for (c, q) in grid.slab(axis, ghost_layers(side, grid.n()[axis])).zip(cells) {
        *field.at_mut(c) = *q;
    }
}

/// Fill every ghost layer of `field`.
///
/// Faces with a remote neighbour are filled by exchange, the rest locally.
/// All sends of an axis are posted before any receive, and a barrier
/// separates axes so that no rank reads a half-updated slab.
pub fn make_boundaries<const D: usize>(
    field: &mut Field<D>,
    kinds: &[[BoundaryKind; 2]; D],
    comm: &dyn Communicator<D>,
) -> HydroResult<()> {
    let grid = *field.grid();
    let me = comm.rank();

    for axis in 0..D {
        let mut pending = Vec::with_capacity(2);

        for side in Side::BOTH {
            match comm.neighbor(axis, side) {
                Some(peer) if peer != me => {
                    let cells = pack(field, &grid, axis, side);
                    comm.send_ghosts(peer, axis, side.opposite(), cells)?;
                    pending.push(side);
                }
                _ => fill_ghosts(field, axis, side, kinds[axis][side as usize]),
            }
        }

        for side in pending {
            let cells = comm.recv_ghosts(axis, side)?;
            unpack(field, axis, side, &cells);
        }

        if comm.size() > 1 {
            comm.barrier()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcess;
    use crate::state::{ID, IP, IV};

    fn ramp_1d(n: usize) -> Field<1> {
        let grid = Grid::<1>::new([n], [0.0], [1.0]);
        let mut f = Field::new(grid);
        for i in 0..n {
            let c = [i + GHOST_WIDTH];
            *f.at_mut(c) = HydroState([1.0 + i as f64, 10.0 + i as f64, 0.5 * i as f64, 0.0, 0.0]);
        }
        f
    }

    #[test]
    fn absorbing_copies_edge_cell() {
        let mut f = ramp_1d(5);
        fill_ghosts(&mut f, 0, Side::Low, BoundaryKind::Absorbing);
        fill_ghosts(&mut f, 0, Side::High, BoundaryKind::Absorbing);
        assert_eq!(f.at([0]), f.at([2]));
        assert_eq!(f.at([1]), f.at([2]));
        assert_eq!(f.at([7]), f.at([6]));
        assert_eq!(f.at([8]), f.at([6]));
    }

    #[test]
    fn periodic_wraps_around() {
        let mut f = ramp_1d(5);
        fill_ghosts(&mut f, 0, Side::Low, BoundaryKind::Periodic);
        fill_ghosts(&mut f, 0, Side::High, BoundaryKind::Periodic);
        // ghost -1 <- interior 4, ghost -2 <- interior 3
        assert_eq!(f.at([1]), f.at([6]));
        assert_eq!(f.at([0]), f.at([5]));
        // ghost n <- interior 0, ghost n+1 <- interior 1
        assert_eq!(f.at([7]), f.at([2]));
        assert_eq!(f.at([8]), f.at([3]));
    }

    #[test]
    fn reflecting_high_side_mirrors() {
        let mut f = ramp_1d(5);
        fill_ghosts(&mut f, 0, Side::High, BoundaryKind::Reflecting);
        assert_eq!(f.at([7])[ID], f.at([6])[ID]);
        assert_eq!(f.at([7])[IU], -f.at([6])[IU]);
        assert_eq!(f.at([8])[ID], f.at([5])[ID]);
    }

    #[test]
    fn reflecting_negates_only_normal_component() {
        let grid = Grid::<2>::new([3, 3], [0.0; 2], [1.0; 2]);
        let mut f = Field::new(grid);
        f.fill(HydroState([1.0, 2.5, 0.3, 0.7, 0.0]));
        fill_ghosts(&mut f, 1, Side::Low, BoundaryKind::Reflecting);
        let g = f.at([3, 1]);
        assert_eq!(g[IU], 0.3);
        assert_eq!(g[IV], -0.7);
        assert_eq!(g[IP], 2.5);
    }

    #[test]
    fn corners_are_filled_after_all_axes() {
        let grid = Grid::<2>::new([3, 3], [0.0; 2], [1.0; 2]);
        let mut f = Field::new(grid);
        for c in (0..grid.n_cells_total()).map(|i| grid.coords(i)) {
            if grid.is_interior(c) {
                *f.at_mut(c) = HydroState([1.0, 1.0, 0.0, 0.0, 0.0]);
            }
        }
        let kinds = [[BoundaryKind::Absorbing; 2]; 2];
        make_boundaries(&mut f, &kinds, &SingleProcess).unwrap();
        assert!(f.as_slice().iter().all(|q| q[ID] == 1.0));
    }
}

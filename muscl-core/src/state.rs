//! Per-cell variable vectors and the dense mesh fields that hold them.
//!
//! A single [`HydroState`] type carries either conservative
//! `(rho, E, rho*u, rho*v, rho*w)` or primitive `(rho, p, u, v, w)` values;
//! which one is meant is always clear from the buffer it lives in.

use std::ops::{Add, Index, IndexMut, Mul, Sub};

use crate::grid::Grid;

/// Maximum number of variables per cell (3D hydro).
pub const NVAR: usize = 5;

/// Density.
pub const ID: usize = 0;
/// Total energy (conservative form).
pub const IE: usize = 1;
/// Pressure (primitive form), shares the energy slot.
pub const IP: usize = 1;
/// First momentum / velocity component; axis `a` lives at `IU + a`.
pub const IU: usize = 2;
pub const IV: usize = 3;
pub const IW: usize = 4;

/// Number of variables actually used in `D` dimensions.
#[inline]
pub const fn nbvar(dim: usize) -> usize {
    dim + 2
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HydroState(pub [f64; NVAR]);

impl HydroState {
    pub const ZERO: Self = Self([0.0; NVAR]);

    /// Swap the first velocity slot with the one normal to `axis`, so that a
    /// 1D solver always sees the normal component at `IU`. Applying it twice
    /// restores the original ordering.
    #[inline]
    pub fn rotate(mut self, axis: usize) -> Self {
        if axis != 0 {
            self.0.swap(IU, IU + axis);
        }
        self
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Index<usize> for HydroState {
    type Output = f64;
    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for HydroState {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl Add for HydroState {
    type Output = Self;
    #[inline]
    fn add(self, o: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] + o.0[i]))
    }
}

impl Sub for HydroState {
    type Output = Self;
    #[inline]
    fn sub(self, o: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] - o.0[i]))
    }
}

impl Mul<f64> for HydroState {
    type Output = Self;
    #[inline]
    fn mul(self, a: f64) -> Self {
        Self(self.0.map(|v| v * a))
    }
}

impl Mul<HydroState> for f64 {
    type Output = HydroState;
    #[inline]
    fn mul(self, u: HydroState) -> HydroState {
        u * self
    }
}

/// Dense array of cell values over the whole mesh, ghosts included.
#[derive(Clone, Debug)]
pub struct Field<const D: usize> {
    grid: Grid<D>,
    cells: Vec<HydroState>,
}

impl<const D: usize> Field<D> {
    pub fn new(grid: Grid<D>) -> Self {
        Self {
            grid,
            cells: vec![HydroState::ZERO; grid.n_cells_total()],
        }
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    #[inline]
    pub fn at(&self, coords: [usize; D]) -> HydroState {
        self.cells[self.grid.index(coords)]
    }

    #[inline]
    pub fn at_mut(&mut self, coords: [usize; D]) -> &mut HydroState {
        let idx = self.grid.index(coords);
        &mut self.cells[idx]
    }

    pub fn as_slice(&self) -> &[HydroState] {
        &self.cells
    }

    pub fn as_mut_slice(&mut self) -> &mut [HydroState] {
        &mut self.cells
    }

    pub fn fill(&mut self, value: HydroState) {
        self.cells.fill(value);
    }

    pub fn copy_from(&mut self, other: &Field<D>) {
        self.cells.copy_from_slice(&other.cells);
    }

    /// Sum of every variable over interior cells (ghosts excluded).
    pub fn interior_sum(&self) -> HydroState {
        self.grid
            .interior_indices()
            .fold(HydroState::ZERO, |acc, idx| acc + self.cells[idx])
    }
}

impl<const D: usize> Index<usize> for Field<D> {
    type Output = HydroState;
    #[inline]
    fn index(&self, idx: usize) -> &HydroState {
        &self.cells[idx]
    }
}

impl<const D: usize> IndexMut<usize> for Field<D> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut HydroState {
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_is_an_involution() {
        let q = HydroState([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(q.rotate(0), q);
        assert_eq!(q.rotate(1).0, [1.0, 2.0, 4.0, 3.0, 5.0]);
        assert_eq!(q.rotate(2).0, [1.0, 2.0, 5.0, 4.0, 3.0]);
        assert_eq!(q.rotate(2).rotate(2), q);
    }

    #[test]
    fn interior_sum_skips_ghosts() {
        let grid = Grid::<2>::new([4, 3], [0.0, 0.0], [1.0, 1.0]);
        let mut f = Field::new(grid);
        f.fill(HydroState([1.0, 0.0, 0.0, 0.0, 0.0]));
        assert_eq!(f.interior_sum()[ID], 12.0);
    }
}

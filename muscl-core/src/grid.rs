//! Cartesian mesh geometry with a fixed ghost layer.

use std::ops::Range;

/// Ghost layer width. Two layers are what the MUSCL stencil reaches:
/// the face between cells `i-1` and `i` needs slopes of both, which read
/// cells `i-2 ..= i+1`.
pub const GHOST_WIDTH: usize = 2;

/// Which end of an axis a face sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Low,
    High,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Low, Side::High];

    pub fn opposite(self) -> Side {
        match self {
            Side::Low => Side::High,
            Side::High => Side::Low,
        }
    }
}

pub(crate) const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// Geometry of one (possibly process-local) block of a uniform mesh.
///
/// Coordinates passed to [`Grid::index`] are *total* coordinates, i.e. they
/// include the ghost layer: interior cells along axis `a` live in
/// `GHOST_WIDTH .. GHOST_WIDTH + n[a]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid<const D: usize> {
    n: [usize; D],
    total: [usize; D],
    strides: [usize; D],
    xmin: [f64; D],
    dx: [f64; D],
    offset: [usize; D],
    global_n: [usize; D],
}

impl<const D: usize> Grid<D> {
    /// Single-block grid covering `[xmin, xmax]` with `n` interior cells per axis.
    pub fn new(n: [usize; D], xmin: [f64; D], xmax: [f64; D]) -> Self {
        Self::block(n, xmin, xmax, [1; D], [0; D])
    }

    /// The block owned by the process at `proc_coords` in a Cartesian process
    /// grid of shape `proc_dims`. `global_n` must be divisible by `proc_dims`
    /// (checked during configuration validation).
    pub fn block(
        global_n: [usize; D],
        xmin: [f64; D],
        xmax: [f64; D],
        proc_dims: [usize; D],
        proc_coords: [usize; D],
    ) -> Self {
        let dx: [f64; D] = std::array::from_fn(|a| (xmax[a] - xmin[a]) / global_n[a] as f64);
        let n: [usize; D] = std::array::from_fn(|a| global_n[a] / proc_dims[a]);
        let offset: [usize; D] = std::array::from_fn(|a| proc_coords[a] * n[a]);
        let total: [usize; D] = std::array::from_fn(|a| n[a] + 2 * GHOST_WIDTH);

        let mut strides = [1usize; D];
        for a in 1..D {
            strides[a] = strides[a - 1] * total[a - 1];
        }

        Self {
            n,
            total,
            strides,
            xmin,
            dx,
            offset,
            global_n,
        }
    }

    // ---- Extents ----

    pub fn n(&self) -> [usize; D] {
        self.n
    }

    pub fn global_n(&self) -> [usize; D] {
        self.global_n
    }

    pub fn total(&self) -> [usize; D] {
        self.total
    }

    pub fn dx(&self) -> [f64; D] {
        self.dx
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.strides[axis]
    }

    pub fn offset(&self) -> [usize; D] {
        self.offset
    }

    pub fn n_cells_total(&self) -> usize {
        self.total.iter().product()
    }

    pub fn n_interior(&self) -> usize {
        self.n.iter().product()
    }

    pub fn cell_volume(&self) -> f64 {
        self.dx.iter().product()
    }

    // ---- Indexing ----

    #[inline]
    pub fn index(&self, coords: [usize; D]) -> usize {
        let mut idx = 0;
        for a in 0..D {
            debug_assert!(coords[a] < self.total[a]);
            idx += coords[a] * self.strides[a];
        }
        idx
    }

    #[inline]
    pub fn coords(&self, mut idx: usize) -> [usize; D] {
        let mut c = [0usize; D];
        for a in 0..D {
            c[a] = idx % self.total[a];
            idx /= self.total[a];
        }
        c
    }

    /// Whether total coordinates point at an interior (non-ghost) cell.
    #[inline]
    pub fn is_interior(&self, coords: [usize; D]) -> bool {
        (0..D).all(|a| coords[a] >= GHOST_WIDTH && coords[a] < GHOST_WIDTH + self.n[a])
    }

    /// Whether the face on the low side of the cell at `coords` is one of the
    /// faces a sweep along `axis` has to compute: every face bounding an
    /// interior cell along `axis`, including the two domain faces.
    #[inline]
    pub fn is_active_face(&self, coords: [usize; D], axis: usize) -> bool {
        (0..D).all(|a| {
            let hi = GHOST_WIDTH + self.n[a] + usize::from(a == axis);
            coords[a] >= GHOST_WIDTH && coords[a] < hi
        })
    }

    /// Total coordinates of every cell whose coordinate along `axis` lies in
    /// `layers`, over the full transverse extent (ghosts included). The
    /// enumeration order only depends on the layer offset and the transverse
    /// position, so two blocks with equal transverse sizes enumerate matching
    /// slabs in the same order.
    pub fn slab(&self, axis: usize, layers: Range<usize>) -> impl Iterator<Item = [usize; D]> + '_ {
        let start = layers.start;
        let len = layers.len();
        let count = self.n_cells_total() / self.total[axis] * len;
        (0..count).map(move |m| {
            let mut c = [0usize; D];
            c[axis] = start + m % len;
            let mut rest = m / len;
            for a in (0..D).filter(|&a| a != axis) {
                c[a] = rest % self.total[a];
                rest /= self.total[a];
            }
            c
        })
    }

    pub fn interior_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_cells_total()).filter(move |&idx| self.is_interior(self.coords(idx)))
    }

    /// Global, interior-relative coordinates of a cell (what diagnostics print).
    pub fn global_coords(&self, coords: [usize; D]) -> [usize; D] {
        std::array::from_fn(|a| (coords[a] + self.offset[a]).saturating_sub(GHOST_WIDTH))
    }

    /// Physical position of a cell centre.
    pub fn cell_center(&self, coords: [usize; D]) -> [f64; D] {
        std::array::from_fn(|a| {
            let i = coords[a] as f64 + self.offset[a] as f64 - GHOST_WIDTH as f64;
            self.xmin[a] + (i + 0.5) * self.dx[a]
        })
    }

    /// Physical position of a cell centre relative to the global domain,
    /// scaled into `[0, 1]` per axis.
    pub fn normalized_center(&self, coords: [usize; D]) -> [f64; D] {
        let x = self.cell_center(coords);
        std::array::from_fn(|a| (x[a] - self.xmin[a]) / self.extent(a))
    }

    /// Length of the global domain along `axis`.
    pub fn extent(&self, axis: usize) -> f64 {
        self.dx[axis] * self.global_n[axis] as f64
    }

    pub fn domain_min(&self) -> [f64; D] {
        self.xmin
    }

    pub fn domain_max(&self) -> [f64; D] {
        std::array::from_fn(|a| self.xmin[a] + self.extent(a))
    }
}

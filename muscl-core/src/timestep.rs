//! CFL-limited time step.

use crate::comm::Communicator;
use crate::config::SweepMode;
use crate::eos::IdealGas;
use crate::error::HydroResult;
use crate::exec;
use crate::state::{Field, IU};

/// Largest signal speed `|u_a| + c` per axis over the interior of `u`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveSpeeds<const D: usize> {
    pub max: [f64; D],
    /// Whether every interior cell produced a finite speed.
    pub finite: bool,
}

impl<const D: usize> WaveSpeeds<D> {
    fn merge(self, other: Self) -> Self {
        Self {
            max: std::array::from_fn(|a| self.max[a].max(other.max[a])),
            finite: self.finite && other.finite,
        }
    }

    /// Combine the block maxima of every process.
    pub fn all_reduce(self, comm: &dyn Communicator<D>) -> HydroResult<Self> {
        if comm.size() == 1 {
            return Ok(self);
        }
        let mut max = self.max;
        for m in max.iter_mut() {
            *m = comm.all_reduce_max(*m)?;
        }
        let bad = comm.all_reduce_max(if self.finite { 0.0 } else { 1.0 })?;
        Ok(Self { max, finite: bad == 0.0 })
    }
}

pub fn max_wave_speeds<const D: usize>(gas: &IdealGas, u: &Field<D>) -> WaveSpeeds<D> {
    let grid = *u.grid();
    let identity = WaveSpeeds {
        max: [0.0; D],
        finite: true,
    };

    exec::map_reduce(
        grid.n_cells_total(),
        identity,
        |i| {
            if !grid.is_interior(grid.coords(i)) {
                return identity;
            }
            let (q, _) = gas.to_primitive::<D>(&u[i]);
            let c = gas.sound_speed(&q);
            let max: [f64; D] = std::array::from_fn(|a| q[IU + a].abs() + c);
            WaveSpeeds {
                max,
                finite: u[i].is_finite() && max.iter().all(|s| s.is_finite()),
            }
        },
        WaveSpeeds::merge,
    )
}

/// Stable step for the given maxima, `f64::INFINITY` when nothing moves.
///
/// Unsplit: `cfl / sum_a(s_a / dx_a)`. Split: `cfl * min_a(dx_a / s_a)`.
/// Both are bounded by `cfl * dx_a / s_a` on every axis.
pub fn cfl_dt<const D: usize>(speeds: &[f64; D], dx: &[f64; D], cfl: f64, sweep: SweepMode) -> f64 {
    match sweep {
        SweepMode::Unsplit => {
            let rate: f64 = (0..D).map(|a| speeds[a] / dx[a]).sum();
            if rate > 0.0 { cfl / rate } else { f64::INFINITY }
        }
        SweepMode::Split => (0..D)
            .filter(|&a| speeds[a] > 0.0)
            .map(|a| cfl * dx[a] / speeds[a])
            .fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::state::HydroState;

    fn gas() -> IdealGas {
        IdealGas::new(1.4, 1e-10, 1e-10)
    }

    #[test]
    fn speeds_of_uniform_flow() {
        let grid = Grid::<2>::new([4, 4], [0.0; 2], [1.0; 2]);
        let mut u = Field::new(grid);
        let q = HydroState([1.4, 1.0, 2.0, -3.0, 0.0]);
        u.fill(gas().to_conservative::<2>(&q));
        let s = max_wave_speeds(&gas(), &u);
        // c = sqrt(1.4 * 1 / 1.4) = 1
        assert!(s.finite);
        assert!((s.max[0] - 3.0).abs() < 1e-12);
        assert!((s.max[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_cell_is_detected() {
        let grid = Grid::<1>::new([4], [0.0], [1.0]);
        let mut u = Field::new(grid);
        u.fill(HydroState([1.0, 2.5, 0.0, 0.0, 0.0]));
        *u.at_mut([3]) = HydroState([1.0, f64::NAN, 0.0, 0.0, 0.0]);
        assert!(!max_wave_speeds(&gas(), &u).finite);
    }

    #[test]
    fn both_forms_respect_the_per_axis_bound() {
        let speeds = [3.0, 4.0];
        let dx = [0.1, 0.05];
        for sweep in [SweepMode::Unsplit, SweepMode::Split] {
            let dt = cfl_dt(&speeds, &dx, 0.8, sweep);
            for a in 0..2 {
                assert!(dt <= 0.8 * dx[a] / speeds[a] + 1e-15);
            }
        }
        assert!((cfl_dt(&speeds, &dx, 0.8, SweepMode::Split) - 0.01).abs() < 1e-15);
        assert_eq!(cfl_dt(&[0.0], &[0.1], 0.5, SweepMode::Unsplit), f64::INFINITY);
    }
}

//! Run configuration as read from a parameter file.
//!
//! Every section has defaults so a partial JSON document is enough. Nothing
//! here is trusted until [`HydroConfig::validate`] turns it into the
//! immutable [`HydroParams`] the solver components are built from.

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryKind;
use crate::eos::IdealGas;
use crate::error::{HydroError, HydroResult};
use crate::grid::{AXIS_NAMES, GHOST_WIDTH, Grid};
use crate::problems::{Problem, ProblemConfig};
use crate::riemann::RiemannSolverKind;
use crate::slope::SlopeLimiter;

/// Implements `as_str`, `Display` and `FromStr` for a fieldless option enum.
macro_rules! named_options {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::error::HydroError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err($crate::error::HydroError::config(
                        $field,
                        format!(
                            "unknown value `{}` (expected one of: {})",
                            other,
                            [$($name),+].join(", ")
                        ),
                    )),
                }
            }
        }
    };
}
pub(crate) use named_options;

/// How face states are produced before the Riemann solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reconstruction {
    /// Slopes and half-step predictor evaluated inline per face, fluxes
    /// computed and stored in one pass.
    Direct,
    /// Slopes stored, then traced half a step in time (MUSCL-Hancock).
    #[default]
    Hancock,
}

named_options!(Reconstruction, "hydro.implementation", {
    Direct => "direct",
    Hancock => "hancock",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// All axes from the same state, one combined divergence update.
    #[default]
    Unsplit,
    /// One update per axis, each consuming the previous sweep's output.
    Split,
}

named_options!(SweepMode, "hydro.sweep", {
    Unsplit => "unsplit",
    Split => "split",
});

/// What to do when a cell goes non-physical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Floor the cell, log a warning and count the event.
    #[default]
    Clamp,
    /// Abort the run.
    Strict,
}

named_options!(FailurePolicy, "hydro.policy", {
    Clamp => "clamp",
    Strict => "strict",
});

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HydroConfig {
    pub mesh: MeshConfig,
    pub run: RunConfig,
    pub hydro: SchemeConfig,
    pub problem: ProblemConfig,
    pub topology: TopologyConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub dimension: usize,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    pub boundary: BoundaryConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            dimension: 2,
            nx: 64,
            ny: 64,
            nz: 64,
            xmin: 0.0,
            xmax: 1.0,
            ymin: 0.0,
            ymax: 1.0,
            zmin: 0.0,
            zmax: 1.0,
            boundary: BoundaryConfig::default(),
        }
    }
}

impl MeshConfig {
    pub fn set_all_boundaries(&mut self, kind: BoundaryKind) {
        self.boundary = BoundaryConfig::uniform(kind);
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub xmin: BoundaryKind,
    pub xmax: BoundaryKind,
    pub ymin: BoundaryKind,
    pub ymax: BoundaryKind,
    pub zmin: BoundaryKind,
    pub zmax: BoundaryKind,
}

impl BoundaryConfig {
    pub fn uniform(kind: BoundaryKind) -> Self {
        Self {
            xmin: kind,
            xmax: kind,
            ymin: kind,
            ymax: kind,
            zmin: kind,
            zmax: kind,
        }
    }

    fn per_axis(&self) -> [[BoundaryKind; 2]; 3] {
        [
            [self.xmin, self.xmax],
            [self.ymin, self.ymax],
            [self.zmin, self.zmax],
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub t_end: f64,
    pub max_steps: u64,
    /// Snapshot cadence in iterations; 0 disables intermediate snapshots.
    pub output_every: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            t_end: 0.2,
            max_steps: 1_000_000,
            output_every: 100,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeConfig {
    pub gamma: f64,
    pub cfl: f64,
    pub riemann: RiemannSolverKind,
    pub limiter: SlopeLimiter,
    pub implementation: Reconstruction,
    pub sweep: SweepMode,
    pub policy: FailurePolicy,
    pub smallr: f64,
    pub smallc: f64,
    pub niter_riemann: usize,
    pub dt_min: f64,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            gamma: 1.4,
            cfl: 0.5,
            riemann: RiemannSolverKind::default(),
            limiter: SlopeLimiter::default(),
            implementation: Reconstruction::default(),
            sweep: SweepMode::default(),
            policy: FailurePolicy::default(),
            smallr: 1e-10,
            smallc: 1e-10,
            niter_riemann: 10,
            dt_min: 1e-14,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Process grid shape; only the first `dimension` entries are used.
    pub procs: [usize; 3],
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self { procs: [1, 1, 1] }
    }
}

/// Validated, immutable parameters shared by every solver component.
#[derive(Clone, Debug)]
pub struct HydroParams<const D: usize> {
    pub gas: IdealGas,
    pub cfl: f64,
    pub riemann: RiemannSolverKind,
    pub limiter: SlopeLimiter,
    pub reconstruction: Reconstruction,
    pub sweep: SweepMode,
    pub policy: FailurePolicy,
    pub niter_riemann: usize,
    pub dt_min: f64,
    /// `[low, high]` boundary kind per axis.
    pub boundaries: [[BoundaryKind; 2]; D],
    pub t_end: f64,
    pub max_steps: u64,
    pub output_every: u64,
    pub global_n: [usize; D],
    pub xmin: [f64; D],
    pub xmax: [f64; D],
    pub procs: [usize; D],
    pub problem: Problem,
}

impl<const D: usize> HydroParams<D> {
    /// Geometry of the block owned by the process at `proc_coords`.
    pub fn grid(&self, proc_coords: [usize; D]) -> Grid<D> {
        Grid::block(self.global_n, self.xmin, self.xmax, self.procs, proc_coords)
    }

    pub fn n_procs(&self) -> usize {
        self.procs.iter().product()
    }

    /// Axes whose process grid wraps around.
    pub fn periodic_axes(&self) -> [bool; D] {
        std::array::from_fn(|a| self.boundaries[a][0] == BoundaryKind::Periodic)
    }
}

impl HydroConfig {
    /// Check every field and produce the parameters for a `D`-dimensional run.
    pub fn validate<const D: usize>(&self) -> HydroResult<HydroParams<D>> {
        if !(1..=3).contains(&D) {
            return Err(HydroError::config(
                "mesh.dimension",
                format!("{D} is not supported (expected 1, 2 or 3)"),
            ));
        }
        if self.mesh.dimension != D {
            return Err(HydroError::config(
                "mesh.dimension",
                format!("configured {} but a {D}D solver was requested", self.mesh.dimension),
            ));
        }

        let m = &self.mesh;
        let all_n = [m.nx, m.ny, m.nz];
        let all_min = [m.xmin, m.ymin, m.zmin];
        let all_max = [m.xmax, m.ymax, m.zmax];
        let all_bc = m.boundary.per_axis();
        let procs = self.topology.procs;

        for a in 0..D {
            let name = AXIS_NAMES[a];
            if procs[a] == 0 {
                return Err(HydroError::config(
                    format!("topology.procs[{a}]"),
                    "process count must be positive",
                ));
            }
            if all_n[a] % procs[a] != 0 {
                return Err(HydroError::config(
                    format!("mesh.n{name}"),
                    format!("{} cells cannot be split over {} processes", all_n[a], procs[a]),
                ));
            }
            if all_n[a] / procs[a] < GHOST_WIDTH {
                return Err(HydroError::config(
                    format!("mesh.n{name}"),
                    format!("each process needs at least {GHOST_WIDTH} cells along {name}"),
                ));
            }
            if !(all_max[a] > all_min[a]) || !all_min[a].is_finite() || !all_max[a].is_finite() {
                return Err(HydroError::config(
                    format!("mesh.{name}max"),
                    format!("must be finite and greater than {name}min"),
                ));
            }
            let [lo, hi] = all_bc[a];
            if (lo == BoundaryKind::Periodic) != (hi == BoundaryKind::Periodic) {
                return Err(HydroError::config(
                    format!("mesh.boundary.{name}min"),
                    "periodic boundaries must be set on both faces of an axis",
                ));
            }
        }

        let h = &self.hydro;
        if !(h.gamma > 1.0) {
            return Err(HydroError::config("hydro.gamma", "must be greater than 1"));
        }
        if !(h.cfl > 0.0 && h.cfl <= 1.0) {
            return Err(HydroError::config("hydro.cfl", "must lie in (0, 1]"));
        }
        if !(h.smallr > 0.0) {
            return Err(HydroError::config("hydro.smallr", "must be positive"));
        }
        if !(h.smallc > 0.0) {
            return Err(HydroError::config("hydro.smallc", "must be positive"));
        }
        if !(h.dt_min > 0.0) {
            return Err(HydroError::config("hydro.dt_min", "must be positive"));
        }
        if h.niter_riemann == 0 {
            return Err(HydroError::config("hydro.niter_riemann", "must be at least 1"));
        }
        if !(self.run.t_end >= 0.0) {
            return Err(HydroError::config("run.t_end", "must be non-negative"));
        }

        let problem = Problem::from_config(&self.problem, D)?;

        Ok(HydroParams {
            gas: IdealGas::new(h.gamma, h.smallr, h.smallc),
            cfl: h.cfl,
            riemann: h.riemann,
            limiter: h.limiter,
            reconstruction: h.implementation,
            sweep: h.sweep,
            policy: h.policy,
            niter_riemann: h.niter_riemann,
            dt_min: h.dt_min,
            boundaries: std::array::from_fn(|a| all_bc[a]),
            t_end: self.run.t_end,
            max_steps: self.run.max_steps,
            output_every: self.run.output_every,
            global_n: std::array::from_fn(|a| all_n[a]),
            xmin: std::array::from_fn(|a| all_min[a]),
            xmax: std::array::from_fn(|a| all_max[a]),
            procs: std::array::from_fn(|a| procs[a]),
            problem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: HydroError) -> String {
        match err {
            HydroError::Config { field, .. } => field,
            other => panic!("expected a configuration error, got {other}"),
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: HydroConfig = serde_json::from_str(
            r#"{
                "mesh": { "nx": 32, "boundary": { "xmin": "reflecting" } },
                "hydro": { "riemann": "approx", "limiter": "van_leer", "sweep": "split" },
                "problem": { "name": "blast", "blast": { "pressure_in": 100.0 } }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.mesh.nx, 32);
        assert_eq!(cfg.mesh.ny, 64);
        assert_eq!(cfg.mesh.boundary.xmin, BoundaryKind::Reflecting);
        assert_eq!(cfg.mesh.boundary.xmax, BoundaryKind::Absorbing);
        assert_eq!(cfg.hydro.riemann, RiemannSolverKind::Approx);
        assert_eq!(cfg.hydro.limiter, SlopeLimiter::VanLeer);
        assert_eq!(cfg.hydro.sweep, SweepMode::Split);
        assert_eq!(cfg.hydro.implementation, Reconstruction::Hancock);
        assert_eq!(cfg.problem.blast.pressure_in, 100.0);
        assert_eq!(cfg.problem.blast.density_out, 1.2);

        let params = cfg.validate::<2>().unwrap();
        assert_eq!(params.global_n, [32, 64]);
        assert_eq!(params.boundaries[0], [BoundaryKind::Reflecting, BoundaryKind::Absorbing]);
    }

    #[test]
    fn unknown_option_names_the_field() {
        let err = "superbee".parse::<SlopeLimiter>().unwrap_err();
        assert_eq!(field_of(err), "hydro.limiter");
        let err = "open".parse::<BoundaryKind>().unwrap_err();
        assert_eq!(field_of(err), "mesh.boundary");
        assert_eq!(" Periodic ".parse::<BoundaryKind>().unwrap(), BoundaryKind::Periodic);
    }

    #[test]
    fn validation_reports_offending_field() {
        let mut cfg = HydroConfig::default();
        cfg.mesh.ny = 1;
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "mesh.ny");

        let mut cfg = HydroConfig::default();
        cfg.hydro.cfl = 1.5;
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "hydro.cfl");

        let mut cfg = HydroConfig::default();
        cfg.hydro.gamma = 1.0;
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "hydro.gamma");

        let mut cfg = HydroConfig::default();
        cfg.mesh.xmax = cfg.mesh.xmin;
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "mesh.xmax");

        let mut cfg = HydroConfig::default();
        cfg.mesh.boundary.ymin = BoundaryKind::Periodic;
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "mesh.boundary.ymin");

        let mut cfg = HydroConfig::default();
        cfg.topology.procs = [3, 1, 1];
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "mesh.nx");

        let cfg = HydroConfig::default();
        assert_eq!(field_of(cfg.validate::<3>().unwrap_err()), "mesh.dimension");

        let mut cfg = HydroConfig::default();
        cfg.problem.name = "sedov".into();
        assert_eq!(field_of(cfg.validate::<2>().unwrap_err()), "problem.name");
    }

    #[test]
    fn periodic_axes_follow_boundaries() {
        let mut cfg = HydroConfig::default();
        cfg.mesh.boundary.xmin = BoundaryKind::Periodic;
        cfg.mesh.boundary.xmax = BoundaryKind::Periodic;
        let params = cfg.validate::<2>().unwrap();
        assert_eq!(params.periodic_axes(), [true, false]);
    }
}

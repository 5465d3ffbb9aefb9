//! Catalogue of named initial conditions.
//!
//! Each problem is a pure function of a cell's position (and, for the seeded
//! perturbation, its global index), so every process of a decomposed run
//! initializes its block independently and identically to a single-process
//! run.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::eos::IdealGas;
use crate::error::{HydroError, HydroResult};
use crate::exec;
use crate::grid::Grid;
use crate::state::{Field, HydroState, ID, IP, IU, IV};

pub const PROBLEM_NAMES: [&str; 7] = [
    "implode",
    "blast",
    "four_quadrant",
    "isentropic_vortex",
    "kelvin_helmholtz",
    "sod",
    "advection",
];

/// `problem` section of the parameter file. Only the block matching `name`
/// is read.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    pub name: String,
    pub blast: BlastParams,
    pub four_quadrant: FourQuadrantParams,
    pub isentropic_vortex: VortexParams,
    pub kelvin_helmholtz: ShearLayerParams,
    pub advection: AdvectionParams,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            name: "implode".to_string(),
            blast: BlastParams::default(),
            four_quadrant: FourQuadrantParams::default(),
            isentropic_vortex: VortexParams::default(),
            kelvin_helmholtz: ShearLayerParams::default(),
            advection: AdvectionParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastParams {
    /// Physical radius; defaults to 1/8 of the shortest domain side.
    pub radius: Option<f64>,
    /// Physical centre; defaults to the domain centre.
    pub center: Option<[f64; 3]>,
    pub density_in: f64,
    pub density_out: f64,
    pub pressure_in: f64,
    pub pressure_out: f64,
}

impl Default for BlastParams {
    fn default() -> Self {
        Self {
            radius: None,
            center: None,
            density_in: 1.0,
            density_out: 1.2,
            pressure_in: 10.0,
            pressure_out: 0.1,
        }
    }
}

/// Lax-Liu four-quadrant Riemann problems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FourQuadrantParams {
    /// Configuration index, 0 ..= 18.
    pub config: usize,
    pub x: f64,
    pub y: f64,
}

impl Default for FourQuadrantParams {
    fn default() -> Self {
        Self {
            config: 0,
            x: 0.8,
            y: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VortexParams {
    pub density_ambient: f64,
    pub pressure_ambient: f64,
    pub temperature_ambient: f64,
    pub vx_ambient: f64,
    pub vy_ambient: f64,
    pub beta: f64,
    pub center: Option<[f64; 2]>,
}

impl Default for VortexParams {
    fn default() -> Self {
        Self {
            density_ambient: 1.0,
            pressure_ambient: 1.0,
            temperature_ambient: 1.0,
            vx_ambient: 1.0,
            vy_ambient: 1.0,
            beta: 5.0,
            center: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShearLayerParams {
    pub density_inner: f64,
    pub density_outer: f64,
    pub velocity_inner: f64,
    pub velocity_outer: f64,
    pub pressure: f64,
    /// Half width of the inner band as a fraction of the y extent.
    pub half_width: f64,
    /// Amplitude of the random velocity perturbation.
    pub amplitude: f64,
    pub seed: u64,
}

impl Default for ShearLayerParams {
    fn default() -> Self {
        Self {
            density_inner: 2.0,
            density_outer: 1.0,
            velocity_inner: 0.5,
            velocity_outer: -0.5,
            pressure: 2.5,
            half_width: 0.25,
            amplitude: 0.01,
            seed: 12345,
        }
    }
}

/// Gaussian density bump carried by a uniform flow at uniform pressure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvectionParams {
    pub velocity: [f64; 3],
    pub density: f64,
    pub amplitude: f64,
    /// Gaussian width as a fraction of the x extent.
    pub width: f64,
    pub pressure: f64,
}

impl Default for AdvectionParams {
    fn default() -> Self {
        Self {
            velocity: [1.0, 0.5, 0.25],
            density: 1.0,
            amplitude: 1.0,
            width: 0.1,
            pressure: 1.0,
        }
    }
}

/// A validated problem selection.
#[derive(Clone, Debug, PartialEq)]
pub enum Problem {
    Implode,
    Blast(BlastParams),
    FourQuadrant(FourQuadrantParams),
    IsentropicVortex(VortexParams),
    KelvinHelmholtz(ShearLayerParams),
    Sod,
    Advection(AdvectionParams),
}

impl Problem {
    pub fn from_config(cfg: &ProblemConfig, dim: usize) -> HydroResult<Self> {
        let problem = match cfg.name.trim() {
            "implode" => Problem::Implode,
            "blast" => {
                let b = &cfg.blast;
                if b.radius.is_some_and(|r| !(r > 0.0)) {
                    return Err(HydroError::config("problem.blast.radius", "must be positive"));
                }
                if [b.density_in, b.density_out, b.pressure_in, b.pressure_out]
                    .iter()
                    .any(|v| !(*v > 0.0))
                {
                    return Err(HydroError::config(
                        "problem.blast",
                        "densities and pressures must be positive",
                    ));
                }
                Problem::Blast(b.clone())
            }
            "four_quadrant" => {
                if cfg.four_quadrant.config >= QUADRANT_STATES.len() {
                    return Err(HydroError::config(
                        "problem.four_quadrant.config",
                        format!(
                            "{} is out of range (0..={})",
                            cfg.four_quadrant.config,
                            QUADRANT_STATES.len() - 1
                        ),
                    ));
                }
                Problem::FourQuadrant(cfg.four_quadrant.clone())
            }
            "isentropic_vortex" => Problem::IsentropicVortex(cfg.isentropic_vortex.clone()),
            "kelvin_helmholtz" => Problem::KelvinHelmholtz(cfg.kelvin_helmholtz.clone()),
            "sod" => Problem::Sod,
            "advection" => Problem::Advection(cfg.advection.clone()),
            other => {
                return Err(HydroError::config(
                    "problem.name",
                    format!(
                        "unknown problem `{other}` (expected one of: {})",
                        PROBLEM_NAMES.join(", ")
                    ),
                ));
            }
        };
        problem.check_dimension(dim)?;
        Ok(problem)
    }

    /// Reject problems whose initial condition reads axes the mesh lacks.
    pub fn check_dimension(&self, dim: usize) -> HydroResult<()> {
        match self {
            Problem::FourQuadrant(_) | Problem::IsentropicVortex(_) if dim != 2 => Err(HydroError::config(
                "problem.name",
                format!("`{}` is only defined in 2D, not {dim}D", self.name()),
            )),
            Problem::KelvinHelmholtz(_) if dim < 2 => Err(HydroError::config(
                "problem.name",
                format!("`{}` needs at least two dimensions", self.name()),
            )),
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Problem::Implode => "implode",
            Problem::Blast(_) => "blast",
            Problem::FourQuadrant(_) => "four_quadrant",
            Problem::IsentropicVortex(_) => "isentropic_vortex",
            Problem::KelvinHelmholtz(_) => "kelvin_helmholtz",
            Problem::Sod => "sod",
            Problem::Advection(_) => "advection",
        }
    }

    /// Primitive state of the cell at total coordinates `coords`.
    pub fn primitive<const D: usize>(&self, gas: &IdealGas, grid: &Grid<D>, coords: [usize; D]) -> HydroState {
        let x = grid.cell_center(coords);
        let lo = grid.domain_min();
        let hi = grid.domain_max();
        let mut q = HydroState::ZERO;

        match self {
            Problem::Implode => {
                let s: f64 = grid.normalized_center(coords).iter().sum();
                if s > 0.5 {
                    q[ID] = 1.0;
                    q[IP] = 1.0;
                } else {
                    q[ID] = 0.125;
                    q[IP] = 0.14;
                }
            }

            Problem::Blast(b) => {
                let min_side = (0..D).map(|a| hi[a] - lo[a]).fold(f64::INFINITY, f64::min);
                let radius = b.radius.unwrap_or(0.125 * min_side);
                let r2: f64 = (0..D)
                    .map(|a| {
                        let c = b.center.map_or(0.5 * (lo[a] + hi[a]), |c| c[a]);
                        (x[a] - c) * (x[a] - c)
                    })
                    .sum();
                if r2 < radius * radius {
                    q[ID] = b.density_in;
                    q[IP] = b.pressure_in;
                } else {
                    q[ID] = b.density_out;
                    q[IP] = b.pressure_out;
                }
            }

            Problem::FourQuadrant(p) => {
                let [u0, u1, u2, u3] = QUADRANT_STATES[p.config];
                let s = match (x[0] < p.x, x[1] < p.y) {
                    (true, true) => u2,
                    (true, false) => u1,
                    (false, true) => u3,
                    (false, false) => u0,
                };
                q[ID] = s[0];
                q[IU] = s[1];
                q[IV] = s[2];
                q[IP] = s[3];
            }

            Problem::IsentropicVortex(v) => {
                let center = v
                    .center
                    .unwrap_or([0.5 * (lo[0] + hi[0]), 0.5 * (lo[1] + hi[1])]);
                let dx = x[0] - center[0];
                let dy = x[1] - center[1];
                let r2 = dx * dx + dy * dy;
                let gamma = gas.gamma;

                let amp = v.beta / (2.0 * PI) * (0.5 * (1.0 - r2)).exp();
                let dt = (gamma - 1.0) * v.beta * v.beta / (8.0 * gamma * PI * PI) * (1.0 - r2).exp();
                let t = v.temperature_ambient - dt;
                let ratio = t / v.temperature_ambient;

                q[ID] = v.density_ambient * ratio.powf(1.0 / (gamma - 1.0));
                q[IP] = v.pressure_ambient * ratio.powf(gamma / (gamma - 1.0));
                q[IU] = v.vx_ambient - amp * dy;
                q[IV] = v.vy_ambient + amp * dx;
            }

            Problem::KelvinHelmholtz(k) => {
                let yc = 0.5 * (lo[1] + hi[1]);
                let inner = (x[1] - yc).abs() < k.half_width * (hi[1] - lo[1]);
                if inner {
                    q[ID] = k.density_inner;
                    q[IU] = k.velocity_inner;
                } else {
                    q[ID] = k.density_outer;
                    q[IU] = k.velocity_outer;
                }
                q[IP] = k.pressure;

                let mut rng = ChaCha8Rng::seed_from_u64(cell_seed(k.seed, grid, coords));
                q[IU] += k.amplitude * (rng.r#gen::<f64>() - 0.5);
                q[IV] += k.amplitude * (rng.r#gen::<f64>() - 0.5);
            }

            Problem::Sod => {
                if x[0] < 0.5 * (lo[0] + hi[0]) {
                    q[ID] = 1.0;
                    q[IP] = 1.0;
                } else {
                    q[ID] = 0.125;
                    q[IP] = 0.1;
                }
            }

            Problem::Advection(a) => {
                let w = a.width * (hi[0] - lo[0]);
                let r2: f64 = (0..D)
                    .map(|ax| {
                        let c = 0.5 * (lo[ax] + hi[ax]);
                        (x[ax] - c) * (x[ax] - c)
                    })
                    .sum();
                q[ID] = a.density + a.amplitude * (-r2 / (2.0 * w * w)).exp();
                q[IP] = a.pressure;
                for ax in 0..D {
                    q[IU + ax] = a.velocity[ax];
                }
            }
        }
        q
    }
}

/// Seed of one cell's generator, derived from the global cell index so the
/// result does not depend on decomposition or visiting order.
fn cell_seed<const D: usize>(seed: u64, grid: &Grid<D>, coords: [usize; D]) -> u64 {
    let g = grid.global_coords(coords);
    let global_n = grid.global_n();
    let mut idx = 0u64;
    let mut stride = 1u64;
    for a in 0..D {
        idx += g[a] as u64 * stride;
        stride *= global_n[a] as u64;
    }
    seed ^ idx.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Write the conservative initial state into every interior cell of
/// `field`. Ghosts are left for the boundary fill.
pub fn initialize<const D: usize>(problem: &Problem, gas: &IdealGas, field: &mut Field<D>) {
    let grid = *field.grid();
    exec::for_each_cell(field.as_mut_slice(), |idx, u| {
        let c = grid.coords(idx);
        if grid.is_interior(c) {
            *u = gas.to_conservative::<D>(&problem.primitive(gas, &grid, c));
        }
    });
}

/// `[U0, U1, U2, U3]` per configuration, each `[rho, u, v, p]`.
const QUADRANT_STATES: [[[f64; 4]; 4]; 19] = [
    [[1.0, 0.0, 0.0, 1.0], [0.5197, -0.7259, 0.0, 0.4], [0.1072, -0.7259, -1.4045, 0.0439], [0.2579, 0.0, -1.4045, 0.15]],
    [[1.0, 0.0, 0.0, 1.0], [0.5197, -0.7259, 0.0, 0.4], [1.0, -0.7259, -0.7259, 1.0], [0.5197, 0.0, -0.7259, 0.4]],
    [[1.5, 0.0, 0.0, 1.5], [0.5323, 1.206, 0.0, 0.3], [0.138, 1.206, 1.206, 0.029], [0.5323, 0.0, 1.206, 0.3]],
    [[1.1, 0.0, 0.0, 1.1], [0.5065, 0.8939, 0.0, 0.35], [1.1, 0.8939, 0.8939, 1.1], [0.5065, 0.0, 0.8939, 0.35]],
    [[1.0, -0.75, -0.5, 1.0], [2.0, -0.75, 0.5, 1.0], [1.0, 0.75, 0.5, 1.0], [3.0, 0.75, -0.5, 1.0]],
    [[1.0, 0.75, -0.5, 1.0], [2.0, 0.75, 0.5, 0.5], [1.0, -0.75, 0.5, 1.0], [3.0, -0.75, -0.5, 1.0]],
    [[1.0, 0.1, 0.1, 1.0], [0.5197, -0.6259, 0.1, 0.4], [0.8, 0.1, 0.1, 0.4], [0.5197, 0.1, -0.6259, 0.4]],
    [[0.5197, 0.1, 0.1, 0.4], [1.0, -0.6259, 0.1, 1.0], [0.8, 0.1, 0.1, 1.0], [1.0, 0.1, -0.6259, 1.0]],
    [[1.0, 0.0, 0.3, 1.0], [2.0, 0.0, -0.3, 1.0], [1.039, 0.0, -0.8133, 0.4], [0.5197, 0.0, -0.4259, 0.4]],
    [[1.0, 0.0, 0.4297, 1.0], [0.5, 0.0, 0.6076, 1.0], [0.2281, 0.0, -0.6076, 0.3333], [0.4562, 0.0, -0.4259, 0.3333]],
    [[1.0, 0.1, 0.0, 1.0], [0.5313, 0.8276, 0.0, 0.4], [0.8, 0.1, 0.0, 0.4], [0.5313, 0.1, 0.7276, 0.4]],
    [[0.5313, 0.0, 0.0, 0.4], [1.0, 0.7276, 0.0, 1.0], [0.8, 0.0, 0.0, 1.0], [1.0, 0.0, 0.7276, 1.0]],
    [[1.0, 0.0, -0.3, 1.0], [2.0, 0.0, 0.3, 1.0], [1.0625, 0.0, 0.8145, 0.4], [0.5313, 0.0, 0.4276, 0.4]],
    [[2.0, 0.0, -0.5606, 8.0], [1.0, 0.0, -1.2172, 8.0], [0.4736, 0.0, 1.2172, 2.6667], [0.9474, 0.0, 1.1606, 2.6667]],
    [[1.0, 0.1, -0.3, 1.0], [0.5197, -0.6259, -0.3, 0.4], [0.8, 0.1, -0.3, 0.4], [0.5313, 0.1, 0.4276, 0.4]],
    [[0.5313, 0.1, 0.1, 0.4], [1.0222, -0.6179, 0.1, 1.0], [0.8, 0.1, 0.1, 1.0], [1.0, 0.1, 0.8276, 1.0]],
    [[1.0, 0.0, -0.4, 1.0], [2.0, 0.0, -0.3, 1.0], [1.0625, 0.0, 0.2145, 0.4], [0.5197, 0.0, -1.1259, 0.4]],
    [[1.0, 0.0, 1.0, 1.0], [2.0, 0.0, -0.3, 1.0], [1.0625, 0.0, 0.2145, 0.4], [0.5197, 0.0, 0.2741, 0.4]],
    [[1.0, 0.0, 0.3, 1.0], [2.0, 0.0, -0.3, 1.0], [1.0625, 0.0, 0.2145, 0.4], [0.5197, 0.0, -0.4259, 0.4]],
];

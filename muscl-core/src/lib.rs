//! Second-order MUSCL-Hancock finite-volume solver for the compressible
//! Euler equations on 1D, 2D and 3D Cartesian meshes.
//!
//! A run is configured with a [`HydroConfig`], validated into immutable
//! [`HydroParams`], and advanced by a [`HydroSolver`]:
//!
//! ```no_run
//! use muscl_core::{HydroConfig, HydroSolver};
//!
//! let mut cfg = HydroConfig::default();
//! cfg.problem.name = "blast".into();
//! let mut solver = HydroSolver::<2>::new(cfg.validate::<2>()?)?;
//! while !solver.is_finished() {
//!     solver.step()?;
//! }
//! # Ok::<(), muscl_core::HydroError>(())
//! ```

pub mod boundary;
pub mod clock;
pub mod comm;
pub mod config;
pub mod diagnostics;
pub mod eos;
pub mod error;
pub mod exec;
pub mod flux;
pub mod grid;
pub mod problems;
pub mod riemann;
pub mod slope;
pub mod solver;
pub mod state;
pub mod timestep;
pub mod update;

pub use boundary::BoundaryKind;
pub use clock::SimulationClock;
pub use comm::{Communicator, SingleProcess, ThreadCluster, ThreadComm};
pub use config::{FailurePolicy, HydroConfig, HydroParams, Reconstruction, SweepMode};
pub use diagnostics::{RunDiagnostics, Violation};
pub use eos::IdealGas;
pub use error::{HydroError, HydroResult};
pub use grid::{GHOST_WIDTH, Grid, Side};
pub use problems::{PROBLEM_NAMES, Problem, ProblemConfig};
pub use riemann::{RiemannSolver, RiemannSolverKind};
pub use slope::SlopeLimiter;
pub use solver::{HydroSolver, RunReport, RunState, StateView};
pub use state::{Field, HydroState, ID, IE, IP, IU, IV, IW, NVAR, nbvar};

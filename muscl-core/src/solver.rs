//! The MUSCL-Hancock driver: owns every buffer of a run and advances it one
//! stable step at a time.
//!
//! Each step goes through the same stages (time step, ghost fill, primitive
//! variables, reconstruction, fluxes, update) and only swaps the result into
//! the current buffer once all of them succeeded, so an observer never sees
//! a partial step and a failed step leaves the last good state in place.

use log::{debug, error, info, warn};

use crate::boundary::make_boundaries;
use crate::clock::SimulationClock;
use crate::comm::{Communicator, SingleProcess};
use crate::config::{FailurePolicy, HydroParams, Reconstruction, SweepMode};
use crate::diagnostics::{CellReport, RunDiagnostics};
use crate::eos::{IdealGas, convert_to_primitives};
use crate::error::{HydroError, HydroResult};
use crate::flux::{FaceScheme, STENCIL_REACH, direct_fluxes, traced_fluxes};
use crate::grid::{GHOST_WIDTH, Grid};
use crate::problems::{self, Problem};
use crate::riemann::RiemannContext;
use crate::slope::{compute_slopes, trace};
use crate::state::{Field, HydroState, ID, IP, NVAR};
use crate::timestep::{cfl_dt, max_wave_speeds};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Finished,
    Failed,
}

/// Reconstruction buffers, chosen once at construction.
enum Stages<const D: usize> {
    Direct,
    Hancock {
        slopes: Vec<[HydroState; D]>,
        traced: Field<D>,
    },
}

/// Summary of a completed run, summed over processes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    pub iterations: u64,
    pub time: f64,
    /// Interior cells times iterations over the whole mesh.
    pub cell_updates: u64,
    pub diagnostics: RunDiagnostics,
}

pub struct HydroSolver<const D: usize> {
    params: HydroParams<D>,
    scheme: FaceScheme,
    grid: Grid<D>,
    comm: Box<dyn Communicator<D>>,

    current: Field<D>,
    next: Field<D>,
    /// Second work buffer of a directional sweep.
    scratch: Field<D>,
    q: Field<D>,
    stages: Stages<D>,
    fluxes: Vec<Field<D>>,

    clock: SimulationClock,
    state: RunState,
    diagnostics: RunDiagnostics,
}

impl<const D: usize> HydroSolver<D> {
    /// Single-process solver, initialized with the configured problem.
    pub fn new(params: HydroParams<D>) -> HydroResult<Self> {
        Self::with_communicator(params, Box::new(SingleProcess))
    }

    /// Solver for the block of the mesh owned by `comm`'s rank.
    pub fn with_communicator(params: HydroParams<D>, comm: Box<dyn Communicator<D>>) -> HydroResult<Self> {
        if comm.size() != params.n_procs() {
            return Err(HydroError::config(
                "topology.procs",
                format!(
                    "process grid {:?} needs {} ranks, communicator has {}",
                    params.procs,
                    params.n_procs(),
                    comm.size()
                ),
            ));
        }

        let grid = params.grid(comm.coords());
        let scheme = FaceScheme {
            riemann: params.riemann,
            limiter: params.limiter,
            ctx: RiemannContext::new(params.gas, params.niter_riemann),
        };
        let stages = match params.reconstruction {
            Reconstruction::Direct => Stages::Direct,
            Reconstruction::Hancock => Stages::Hancock {
                slopes: vec![[HydroState::ZERO; D]; grid.n_cells_total()],
                traced: Field::new(grid),
            },
        };
        let clock = SimulationClock::new(params.t_end, params.max_steps, params.output_every);

        let mut solver = Self {
            scheme,
            grid,
            comm,
            current: Field::new(grid),
            next: Field::new(grid),
            scratch: Field::new(grid),
            q: Field::new(grid),
            stages,
            fluxes: (0..D).map(|_| Field::new(grid)).collect(),
            clock,
            state: RunState::Idle,
            diagnostics: RunDiagnostics::default(),
            params,
        };
        solver.check_stencil()?;

        let problem = solver.params.problem.clone();
        solver.initialize(&problem)?;

        if solver.comm.rank() == 0 {
            info!(
                "{}D {} on {:?} cells ({} rank(s)): riemann={}, limiter={}, implementation={}, sweep={}, cfl={}",
                D,
                problem.name(),
                solver.params.global_n,
                solver.comm.size(),
                solver.params.riemann,
                solver.params.limiter,
                solver.params.reconstruction,
                solver.params.sweep,
                solver.params.cfl,
            );
        }
        Ok(solver)
    }

    /// Buffers and ghost layer must cover everything the face stencil reads.
    fn check_stencil(&self) -> HydroResult<()> {
        let cells = self.grid.n_cells_total();
        let mut sizes = [&self.current, &self.next, &self.scratch, &self.q]
            .into_iter()
            .chain(self.fluxes.iter())
            .map(|f| f.as_slice().len());
        if let Some(len) = sizes.find(|&len| len != cells) {
            return Err(HydroError::Consistency(format!(
                "buffer of {len} cells on a mesh of {cells}"
            )));
        }
        if let Stages::Hancock { slopes, traced } = &self.stages {
            if slopes.len() != cells || traced.as_slice().len() != cells {
                return Err(HydroError::Consistency("slope buffers do not match the mesh".into()));
            }
        }
        if let Some(a) = (0..D).find(|&a| self.grid.n()[a] < STENCIL_REACH) {
            return Err(HydroError::Consistency(format!(
                "{} interior cells along axis {a}, the stencil reaches {STENCIL_REACH}",
                self.grid.n()[a]
            )));
        }
        debug_assert!(GHOST_WIDTH >= STENCIL_REACH);
        Ok(())
    }

    // ---- Driver interface ----

    /// Seed the conserved field with `problem` and rewind the clock.
    pub fn initialize(&mut self, problem: &Problem) -> HydroResult<()> {
        problem.check_dimension(D)?;
        self.current.fill(HydroState::ZERO);
        problems::initialize(problem, &self.params.gas, &mut self.current);
        self.clock = SimulationClock::new(self.params.t_end, self.params.max_steps, self.params.output_every);
        self.diagnostics = RunDiagnostics::default();
        self.state = RunState::Idle;

        let report = convert_to_primitives(&self.params.gas, &self.current, &mut self.q);
        self.absorb(report, "initial condition")
    }

    /// Advance by one stable step and return the step size used.
    pub fn step(&mut self) -> HydroResult<f64> {
        match self.state {
            RunState::Finished => return Err(HydroError::Finished { time: self.clock.time() }),
            RunState::Failed => {
                return Err(HydroError::Consistency("step() called after a fatal failure".into()));
            }
            RunState::Idle | RunState::Running => {}
        }
        if self.clock.is_finished() {
            self.state = RunState::Finished;
            return Err(HydroError::Finished { time: self.clock.time() });
        }
        self.state = RunState::Running;

        match self.try_step() {
            Ok(dt) => {
                std::mem::swap(&mut self.current, &mut self.next);
                self.clock.advance(dt);
                debug!(
                    "step {:>6}  t = {:.6e}  dt = {:.6e}",
                    self.clock.iteration(),
                    self.clock.time(),
                    dt
                );
                if self.clock.is_finished() {
                    self.state = RunState::Finished;
                    if self.comm.rank() == 0 {
                        info!(
                            "finished at t = {:.6e} after {} steps",
                            self.clock.time(),
                            self.clock.iteration()
                        );
                    }
                }
                Ok(dt)
            }
            Err(e) => {
                self.state = RunState::Failed;
                error!("rank {}: {e}", self.comm.rank());
                Err(e)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == RunState::Finished || self.clock.is_finished()
    }

    /// Read-only view of the last completed step.
    pub fn current_state(&self) -> StateView<'_, D> {
        StateView {
            field: &self.current,
            gas: &self.params.gas,
            comm: self.comm.as_ref(),
            clock: &self.clock,
        }
    }

    /// Step until finished. `observer` sees the initial state, every
    /// `output_every` iterations, and the final state.
    pub fn run<F, E>(&mut self, mut observer: F) -> Result<RunReport, E>
    where
        F: FnMut(&StateView<'_, D>) -> Result<(), E>,
        E: From<HydroError>,
    {
        observer(&self.current_state())?;

        while !self.is_finished() {
            self.step()?;
            if !self.is_finished() && self.clock.should_output() {
                observer(&self.current_state())?;
            }
        }
        if self.clock.iteration() > 0 {
            observer(&self.current_state())?;
        }

        let report = self.report()?;
        if self.comm.rank() == 0 {
            info!("recovered events: {}", report.diagnostics);
        }
        Ok(report)
    }

    /// [`HydroSolver::run`] without an observer.
    pub fn run_to_end(&mut self) -> HydroResult<RunReport> {
        self.run(|_| Ok::<(), HydroError>(()))
    }

    /// Run summary; a collective call when the run is distributed.
    pub fn report(&self) -> HydroResult<RunReport> {
        let sum = |v: u64| -> HydroResult<u64> { Ok(self.comm.all_reduce_sum(v as f64)? as u64) };
        let d = &self.diagnostics;
        let global_cells: u64 = self.params.global_n.iter().map(|&n| n as u64).product();

        Ok(RunReport {
            iterations: self.clock.iteration(),
            time: self.clock.time(),
            cell_updates: global_cells * self.clock.iteration(),
            diagnostics: RunDiagnostics {
                density_floors: sum(d.density_floors)?,
                pressure_floors: sum(d.pressure_floors)?,
                non_finite_cells: sum(d.non_finite_cells)?,
                // every rank clamps the same (reduced) step
                clamped_steps: d.clamped_steps,
            },
        })
    }

    // ---- Accessors ----

    pub fn params(&self) -> &HydroParams<D> {
        &self.params
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Recovered events on this rank so far.
    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    // ---- Internal stages ----

    /// Everything of a step that can fail; writes the result into `next`.
    fn try_step(&mut self) -> HydroResult<f64> {
        let dt = self.compute_dt()?;
        let dx = self.grid.dx();
        let dtdx: [f64; D] = std::array::from_fn(|a| dt / dx[a]);

        match self.params.sweep {
            SweepMode::Unsplit => self.unsplit_step(dtdx)?,
            SweepMode::Split => self.split_step(dtdx)?,
        }
        Ok(dt)
    }

    fn compute_dt(&mut self) -> HydroResult<f64> {
        let p = &self.params;
        let speeds = max_wave_speeds(&p.gas, &self.current).all_reduce(self.comm.as_ref())?;
        let dt = cfl_dt(&speeds.max, &self.grid.dx(), p.cfl, p.sweep);

        let reason = if !speeds.finite {
            Some("non-finite wave speed".to_string())
        } else if dt < p.dt_min {
            Some(format!("dt = {dt:e} is below dt_min = {:e}", p.dt_min))
        } else {
            None
        };

        let dt = match (reason, p.policy) {
            (None, _) => dt,
            (Some(reason), FailurePolicy::Strict) => {
                return Err(HydroError::TimeStep {
                    iteration: self.clock.iteration(),
                    time: self.clock.time(),
                    reason,
                });
            }
            (Some(reason), FailurePolicy::Clamp) => {
                if self.comm.rank() == 0 {
                    warn!(
                        "iteration {}: {reason}; using dt_min = {:e}",
                        self.clock.iteration(),
                        p.dt_min
                    );
                }
                self.diagnostics.clamped_steps += 1;
                p.dt_min
            }
        };
        Ok(self.clock.clip(dt))
    }

    fn unsplit_step(&mut self, dtdx: [f64; D]) -> HydroResult<()> {
        make_boundaries(&mut self.current, &self.params.boundaries, self.comm.as_ref())?;
        let report = convert_to_primitives(&self.params.gas, &self.current, &mut self.q);
        self.absorb(report, "primitive conversion")?;

        let axes: [usize; D] = std::array::from_fn(|a| a);
        compute_fluxes(&mut self.stages, &self.scheme, &self.q, dtdx, None, &axes, &mut self.fluxes);

        let report = crate::update::update(
            &self.params.gas,
            &self.current,
            &self.fluxes,
            &axes,
            dtdx,
            &mut self.next,
        );
        self.absorb(report, "update")
    }

    /// One sweep per axis, alternating the order every step. The working
    /// state ping-pongs between `next` and `scratch` and ends in `next`.
    fn split_step(&mut self, dtdx: [f64; D]) -> HydroResult<()> {
        self.next.copy_from(&self.current);

        let reverse = self.clock.iteration() % 2 == 1;
        for k in 0..D {
            let axis = if reverse { D - 1 - k } else { k };

            make_boundaries(&mut self.next, &self.params.boundaries, self.comm.as_ref())?;
            let report = convert_to_primitives(&self.params.gas, &self.next, &mut self.q);
            self.absorb(report, "primitive conversion")?;

            compute_fluxes(
                &mut self.stages,
                &self.scheme,
                &self.q,
                dtdx,
                Some(axis),
                &[axis],
                &mut self.fluxes,
            );
            let report = crate::update::update(
                &self.params.gas,
                &self.next,
                &self.fluxes,
                &[axis],
                dtdx,
                &mut self.scratch,
            );
            std::mem::swap(&mut self.next, &mut self.scratch);
            self.absorb(report, "update")?;
        }
        Ok(())
    }

    /// Apply the failure policy to a kernel report.
    ///
    /// In strict mode every rank takes part in one reduction so that all of
    /// them stop together: the rank owning the bad cell reports it, the
    /// others report that a peer aborted.
    fn absorb(&mut self, report: CellReport, stage: &str) -> HydroResult<()> {
        let failed = !report.is_clean();

        match self.params.policy {
            FailurePolicy::Clamp => {
                if let Some((idx, violation)) = report.first {
                    warn!(
                        "iteration {}, {stage}: {} cell(s) floored, first {violation} at {:?}",
                        self.clock.iteration(),
                        report.count(),
                        self.grid.global_coords(self.grid.coords(idx))
                    );
                    self.diagnostics.record(&report);
                }
                Ok(())
            }
            FailurePolicy::Strict => {
                let any = if self.comm.size() > 1 {
                    self.comm.all_reduce_max(if failed { 1.0 } else { 0.0 })? > 0.0
                } else {
                    failed
                };
                match report.first {
                    Some((idx, violation)) => Err(HydroError::NonPhysical {
                        iteration: self.clock.iteration(),
                        time: self.clock.time(),
                        cell: self.grid.global_coords(self.grid.coords(idx)).to_vec(),
                        violation,
                    }),
                    None if any => Err(HydroError::Communication(format!(
                        "aborted during {stage}: a peer reported a non-physical state"
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Fill `fluxes[axis]` for every axis in `axes` from the primitive field `q`.
fn compute_fluxes<const D: usize>(
    stages: &mut Stages<D>,
    scheme: &FaceScheme,
    q: &Field<D>,
    dtdx: [f64; D],
    only_axis: Option<usize>,
    axes: &[usize],
    fluxes: &mut [Field<D>],
) {
    match stages {
        Stages::Direct => {
            for &a in axes {
                direct_fluxes(scheme, q, dtdx, only_axis, a, &mut fluxes[a]);
            }
        }
        Stages::Hancock { slopes, traced } => {
            compute_slopes(scheme.limiter, q, slopes);
            trace(scheme.gas(), q, slopes, dtdx, only_axis, traced);
            for &a in axes {
                traced_fluxes(scheme, traced, slopes, a, &mut fluxes[a]);
            }
        }
    }
}

/// Read-only access to the state between steps.
pub struct StateView<'a, const D: usize> {
    field: &'a Field<D>,
    gas: &'a IdealGas,
    comm: &'a dyn Communicator<D>,
    clock: &'a SimulationClock,
}

impl<'a, const D: usize> StateView<'a, D> {
    pub fn grid(&self) -> &Grid<D> {
        self.field.grid()
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn iteration(&self) -> u64 {
        self.clock.iteration()
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Whole field including (possibly stale) ghosts.
    pub fn field(&self) -> &Field<D> {
        self.field
    }

    /// Conserved state of interior cell `i` (coordinates without ghosts).
    pub fn conserved(&self, i: [usize; D]) -> HydroState {
        self.field.at(std::array::from_fn(|a| i[a] + GHOST_WIDTH))
    }

    pub fn primitive(&self, i: [usize; D]) -> HydroState {
        self.gas.to_primitive::<D>(&self.conserved(i)).0
    }

    /// Interior cells in x-fastest order.
    pub fn interior(&self) -> impl Iterator<Item = HydroState> + '_ {
        self.grid()
            .interior_indices()
            .map(move |idx| self.field[idx])
    }

    /// Variable `var` of every interior cell, x fastest.
    pub fn conserved_variable(&self, var: usize) -> Vec<f64> {
        self.interior().map(|u| u[var]).collect()
    }

    pub fn primitive_variable(&self, var: usize) -> Vec<f64> {
        self.interior()
            .map(|u| self.gas.to_primitive::<D>(&u).0[var])
            .collect()
    }

    /// Domain-integrated conserved variables (sum times cell volume),
    /// reduced over processes. Collective.
    pub fn totals(&self) -> HydroResult<HydroState> {
        let local = self.field.interior_sum() * self.grid().cell_volume();
        let mut out = HydroState::ZERO;
        for v in 0..NVAR {
            out[v] = self.comm.all_reduce_sum(local[v])?;
        }
        Ok(out)
    }

    /// Minimum density and pressure over the domain. Collective.
    pub fn min_density_pressure(&self) -> HydroResult<(f64, f64)> {
        let (rho, p) = self
            .interior()
            .map(|u| {
                let (q, _) = self.gas.to_primitive::<D>(&u);
                (u[ID], q[IP])
            })
            .fold((f64::INFINITY, f64::INFINITY), |acc, v| (acc.0.min(v.0), acc.1.min(v.1)));
        Ok((self.comm.all_reduce_min(rho)?, self.comm.all_reduce_min(p)?))
    }
}

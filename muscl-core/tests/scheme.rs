use muscl_core::boundary::fill_ghosts;
use muscl_core::riemann::{RiemannContext, solve_face};
use muscl_core::timestep::max_wave_speeds;
use muscl_core::{
    BoundaryKind, Field, FailurePolicy, Grid, HydroConfig, HydroSolver, HydroState, ID, IE, IU, IdealGas,
    Reconstruction, RiemannSolverKind, Side, SweepMode,
};

fn config(dim: usize, problem: &str, n: usize) -> HydroConfig {
    let mut cfg = HydroConfig::default();
    cfg.mesh.dimension = dim;
    cfg.mesh.nx = n;
    cfg.mesh.ny = n;
    cfg.mesh.nz = n;
    cfg.problem.name = problem.to_string();
    cfg.run.t_end = 0.05;
    cfg
}

fn rel(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs().max(1e-300)
}

// ---- Conservation ----

#[test]
fn periodic_run_conserves_mass_momentum_and_energy() {
    for sweep in [SweepMode::Unsplit, SweepMode::Split] {
        let mut cfg = config(2, "kelvin_helmholtz", 32);
        cfg.mesh.set_all_boundaries(BoundaryKind::Periodic);
        cfg.hydro.sweep = sweep;
        cfg.run.max_steps = 20;

        let mut solver = HydroSolver::new(cfg.validate::<2>().unwrap()).unwrap();
        let before = solver.current_state().totals().unwrap();
        let report = solver.run_to_end().unwrap();
        let after = solver.current_state().totals().unwrap();

        assert!(report.iterations > 0);
        assert!(rel(after[ID], before[ID]) < 1e-12, "{sweep}: mass");
        assert!(rel(after[IE], before[IE]) < 1e-12, "{sweep}: energy");
        // net x momentum is close to zero, compare absolutely
        assert!((after[IU] - before[IU]).abs() < 1e-12, "{sweep}: momentum");
    }
}

// ---- Positivity ----

#[test]
fn strict_advection_stays_positive() {
    let mut cfg = config(2, "advection", 32);
    cfg.mesh.set_all_boundaries(BoundaryKind::Periodic);
    cfg.hydro.policy = FailurePolicy::Strict;
    cfg.run.t_end = 0.2;

    let mut solver = HydroSolver::new(cfg.validate::<2>().unwrap()).unwrap();
    let report = solver.run_to_end().unwrap();
    let (rho, p) = solver.current_state().min_density_pressure().unwrap();

    assert_eq!(report.diagnostics.total(), 0);
    assert!(rho > 0.0 && p > 0.0);
    assert!((solver.clock().time() - 0.2).abs() < 1e-15);
}

#[test]
fn sod_tube_stays_within_initial_bounds() {
    let mut cfg = config(1, "sod", 200);
    cfg.run.t_end = 0.2;
    let mut solver = HydroSolver::new(cfg.validate::<1>().unwrap()).unwrap();
    solver.run_to_end().unwrap();

    let rho = solver.current_state().primitive_variable(ID);
    assert!(rho.iter().all(|&r| r > 0.12 && r < 1.01), "density left [0.125, 1]");
    // left state untouched, right state untouched
    assert!((rho[0] - 1.0).abs() < 1e-10);
    assert!((rho[199] - 0.125).abs() < 1e-10);
}

// ---- Symmetry ----

#[test]
fn centered_blast_keeps_its_symmetry() {
    let n = 32;
    let mut cfg = config(2, "blast", n);
    cfg.run.max_steps = 10;
    let mut solver = HydroSolver::new(cfg.validate::<2>().unwrap()).unwrap();
    solver.run_to_end().unwrap();

    let view = solver.current_state();
    for j in 0..n {
        for i in 0..n {
            let a = view.conserved([i, j])[ID];
            let mirrored = view.conserved([n - 1 - i, j])[ID];
            let transposed = view.conserved([j, i])[ID];
            assert!((a - mirrored).abs() < 1e-10 * a, "mirror at ({i}, {j})");
            assert!((a - transposed).abs() < 1e-10 * a, "transpose at ({i}, {j})");
        }
    }
}

// ---- Riemann solvers ----

#[test]
fn every_solver_is_consistent_with_the_physical_flux() {
    let gas = IdealGas::new(1.4, 1e-10, 1e-10);
    let ctx = RiemannContext::new(gas, 10);
    let q = HydroState([0.7, 2.0, -0.4, 0.3, 1.1]);

    for kind in [
        RiemannSolverKind::Approx,
        RiemannSolverKind::Hll,
        RiemannSolverKind::Hllc,
        RiemannSolverKind::Llf,
    ] {
        for axis in 0..3 {
            let f = solve_face(&kind, &q, &q, axis, &ctx);
            let exact = gas.flux::<3>(&q, axis);
            for v in 0..5 {
                assert!((f[v] - exact[v]).abs() < 1e-12, "{kind} axis {axis} var {v}");
            }
        }
    }
}

// ---- Boundaries ----

#[test]
fn reflecting_wall_mirrors_and_negates_normal_velocity() {
    let grid = Grid::new([4], [0.0], [1.0]);
    let mut field = Field::new(grid);
    // interior cells 0 and 1 live at total coordinates 2 and 3
    *field.at_mut([2]) = HydroState([1.0, 5.0, 2.0, 0.0, 0.0]);
    *field.at_mut([3]) = HydroState([0.5, 3.0, 0.25, 0.0, 0.0]);

    fill_ghosts(&mut field, 0, Side::Low, BoundaryKind::Reflecting);

    assert_eq!(field.at([1]), HydroState([1.0, 5.0, -2.0, 0.0, 0.0]));
    assert_eq!(field.at([0]), HydroState([0.5, 3.0, -0.25, 0.0, 0.0]));
}

// ---- Time step ----

#[test]
fn steps_respect_the_cfl_bound() {
    let mut cfg = config(2, "four_quadrant", 32);
    cfg.hydro.cfl = 0.4;
    cfg.run.max_steps = 15;
    let mut solver = HydroSolver::new(cfg.validate::<2>().unwrap()).unwrap();
    let gas = solver.params().gas;
    let dx = solver.grid().dx();

    while !solver.is_finished() {
        let speeds = max_wave_speeds(&gas, solver.current_state().field());
        let bound = 0.4 / (speeds.max[0] / dx[0] + speeds.max[1] / dx[1]);
        let dt = solver.step().unwrap();
        assert!(dt > 0.0 && dt <= bound * (1.0 + 1e-12));
    }
    assert_eq!(solver.diagnostics().total(), 0);
}

// ---- Reconstruction ----

#[test]
fn uniform_flow_is_preserved_by_both_reconstructions() {
    for implementation in [Reconstruction::Direct, Reconstruction::Hancock] {
        for sweep in [SweepMode::Unsplit, SweepMode::Split] {
            let mut cfg = config(3, "advection", 8);
            cfg.problem.advection.amplitude = 0.0;
            cfg.mesh.set_all_boundaries(BoundaryKind::Periodic);
            cfg.hydro.implementation = implementation;
            cfg.hydro.sweep = sweep;
            cfg.run.max_steps = 5;

            let mut solver = HydroSolver::new(cfg.validate::<3>().unwrap()).unwrap();
            let initial: Vec<HydroState> = solver.current_state().interior().collect();
            solver.run_to_end().unwrap();

            for (a, b) in solver.current_state().interior().zip(&initial) {
                for v in 0..5 {
                    assert!((a[v] - b[v]).abs() < 1e-12, "{implementation}/{sweep} var {v}");
                }
            }
        }
    }
}

//! Benchmarks for the Riemann solvers and a full MUSCL-Hancock step.
//!
//! Run with: `cargo bench --bench step_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use muscl_core::riemann::{RiemannContext, solve_face};
use muscl_core::{HydroConfig, HydroSolver, HydroState, IdealGas, Reconstruction, RiemannSolverKind, SweepMode};

/// Primitive face pairs `[rho, p, u, v, w]` spanning smooth and shocked states.
fn generate_face_states(n: usize) -> Vec<(HydroState, HydroState)> {
    (0..n)
        .map(|i| {
            let phase = i as f64 * 0.1;
            let left = HydroState([1.0 + 0.5 * phase.sin(), 1.0 + 0.8 * phase.cos().abs(), 0.3 * phase.cos(), 0.1, 0.0]);
            let right = HydroState([
                0.2 + 0.1 * (phase + 0.5).sin().abs(),
                0.1 + 0.05 * (phase + 0.3).cos().abs(),
                -0.2 * (phase + 0.2).sin(),
                -0.1,
                0.0,
            ]);
            (left, right)
        })
        .collect()
}

fn bench_riemann_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("riemann");
    let ctx = RiemannContext::new(IdealGas::new(1.4, 1e-10, 1e-10), 10);
    let states = generate_face_states(1000);
    group.throughput(Throughput::Elements(states.len() as u64));

    for kind in [
        RiemannSolverKind::Approx,
        RiemannSolverKind::Hll,
        RiemannSolverKind::Hllc,
        RiemannSolverKind::Llf,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, kind| {
            b.iter(|| {
                let mut mass = 0.0;
                for (ql, qr) in &states {
                    mass += solve_face(kind, black_box(ql), black_box(qr), 0, &ctx)[0];
                }
                mass
            });
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_2d");
    group.sample_size(20);

    for n in [64, 128] {
        for (implementation, sweep) in [
            (Reconstruction::Hancock, SweepMode::Unsplit),
            (Reconstruction::Direct, SweepMode::Unsplit),
            (Reconstruction::Hancock, SweepMode::Split),
        ] {
            let mut cfg = HydroConfig::default();
            cfg.mesh.nx = n;
            cfg.mesh.ny = n;
            cfg.problem.name = "implode".into();
            cfg.hydro.implementation = implementation;
            cfg.hydro.sweep = sweep;
            cfg.run.t_end = f64::MAX;
            cfg.run.max_steps = u64::MAX;

            let Ok(params) = cfg.validate::<2>() else { continue };
            let Ok(mut solver) = HydroSolver::new(params) else { continue };

            group.throughput(Throughput::Elements((n * n) as u64));
            group.bench_function(BenchmarkId::new(format!("{implementation}_{sweep}"), n), |b| {
                b.iter(|| black_box(solver.step().ok()));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_riemann_solvers, bench_step);
criterion_main!(benches);

mod snapshot;

use clap::Parser;
use log::{LevelFilter, info};
use muscl_core::{
    BoundaryKind, Communicator, HydroConfig, HydroError, HydroSolver, Reconstruction, RiemannSolverKind, RunReport,
    SlopeLimiter, SweepMode, ThreadCluster,
};
use muscl_core::FailurePolicy;
use snapshot::SnapshotWriter;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON parameter file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for state.bin / meta.jsonl (no snapshots when omitted)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Mesh dimension (1, 2 or 3)
    #[arg(long)]
    dim: Option<usize>,

    /// Initial condition (implode|blast|four_quadrant|isentropic_vortex|kelvin_helmholtz|sod|advection)
    #[arg(long)]
    problem: Option<String>,

    /// Cells along every axis
    #[arg(long)]
    n: Option<usize>,

    #[arg(long)]
    nx: Option<usize>,

    #[arg(long)]
    ny: Option<usize>,

    #[arg(long)]
    nz: Option<usize>,

    #[arg(long)]
    t_end: Option<f64>,

    #[arg(long)]
    max_steps: Option<u64>,

    /// Snapshot every N iterations (0 = only first and last)
    #[arg(long)]
    output_every: Option<u64>,

    #[arg(long)]
    cfl: Option<f64>,

    #[arg(long)]
    gamma: Option<f64>,

    /// approx|hll|hllc|llf
    #[arg(long)]
    riemann: Option<RiemannSolverKind>,

    /// minmod|mc|van_leer
    #[arg(long)]
    limiter: Option<SlopeLimiter>,

    /// direct|hancock
    #[arg(long)]
    implementation: Option<Reconstruction>,

    /// unsplit|split
    #[arg(long)]
    sweep: Option<SweepMode>,

    /// Boundary kind for every face (absorbing|reflecting|periodic)
    #[arg(long)]
    boundary: Option<BoundaryKind>,

    /// Abort on the first non-physical cell instead of flooring it
    #[arg(long)]
    strict: bool,

    /// Process grid for an in-process decomposed run, e.g. "2,2"
    #[arg(long)]
    procs: Option<String>,

    /// error|warn|info|debug|trace (default: RUST_LOG, then info)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let log_level = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(args: &Args) -> CliResult<()> {
    let cfg = build_config(args)?;

    let start = Instant::now();
    let report = match cfg.mesh.dimension {
        1 => simulate::<1>(&cfg, args.out.as_deref())?,
        2 => simulate::<2>(&cfg, args.out.as_deref())?,
        3 => simulate::<3>(&cfg, args.out.as_deref())?,
        d => {
            return Err(HydroError::config("mesh.dimension", format!("{d} is not supported")).into());
        }
    };
    let secs = start.elapsed().as_secs_f64().max(1e-9);

    println!("Steps: {} (t = {:.6e})", report.iterations, report.time);
    println!("Recovered events: {}", report.diagnostics);
    println!(
        "Throughput: {:.3} Mcell-updates/s ({} updates in {:.3} s)",
        report.cell_updates as f64 / secs / 1e6,
        report.cell_updates,
        secs
    );
    if let Some(out) = &args.out {
        println!("Wrote snapshots to: {}", out.display());
    }
    Ok(())
}

fn build_config(args: &Args) -> CliResult<HydroConfig> {
    let mut cfg: HydroConfig = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => HydroConfig::default(),
    };

    if let Some(d) = args.dim {
        cfg.mesh.dimension = d;
    }
    if let Some(name) = &args.problem {
        cfg.problem.name = name.clone();
    }
    if let Some(n) = args.n {
        cfg.mesh.nx = n;
        cfg.mesh.ny = n;
        cfg.mesh.nz = n;
    }
    if let Some(n) = args.nx {
        cfg.mesh.nx = n;
    }
    if let Some(n) = args.ny {
        cfg.mesh.ny = n;
    }
    if let Some(n) = args.nz {
        cfg.mesh.nz = n;
    }
    if let Some(t) = args.t_end {
        cfg.run.t_end = t;
    }
    if let Some(m) = args.max_steps {
        cfg.run.max_steps = m;
    }
    if let Some(k) = args.output_every {
        cfg.run.output_every = k;
    }
    if let Some(c) = args.cfl {
        cfg.hydro.cfl = c;
    }
    if let Some(g) = args.gamma {
        cfg.hydro.gamma = g;
    }
    if let Some(r) = args.riemann {
        cfg.hydro.riemann = r;
    }
    if let Some(l) = args.limiter {
        cfg.hydro.limiter = l;
    }
    if let Some(i) = args.implementation {
        cfg.hydro.implementation = i;
    }
    if let Some(s) = args.sweep {
        cfg.hydro.sweep = s;
    }
    if let Some(b) = args.boundary {
        cfg.mesh.set_all_boundaries(b);
    }
    if args.strict {
        cfg.hydro.policy = FailurePolicy::Strict;
    }
    if let Some(p) = &args.procs {
        cfg.topology.procs = parse_procs(p)?;
    }
    Ok(cfg)
}

fn simulate<const D: usize>(cfg: &HydroConfig, out: Option<&Path>) -> CliResult<RunReport> {
    let params = cfg.validate::<D>()?;

    if params.n_procs() == 1 {
        let mut solver = HydroSolver::new(params)?;
        return drive(&mut solver, out, "");
    }

    let results = ThreadCluster::run(params.procs, params.periodic_axes(), |comm| {
        let suffix = format!("_rank{}", comm.rank());
        let mut solver = HydroSolver::with_communicator(params.clone(), Box::new(comm))?;
        drive(&mut solver, out, &suffix)
    });

    // every rank carries the same (reduced) report
    let mut reports = Vec::with_capacity(results.len());
    for r in results {
        reports.push(r?);
    }
    reports.into_iter().next().ok_or_else(|| "no ranks were started".into())
}

fn drive<const D: usize>(solver: &mut HydroSolver<D>, out: Option<&Path>, suffix: &str) -> CliResult<RunReport> {
    let mut writer = match out {
        Some(dir) => Some(SnapshotWriter::create(
            dir,
            suffix,
            solver.params().problem.name(),
            solver.params().gas.gamma,
        )?),
        None => None,
    };

    let report = solver.run(|view| -> CliResult<()> {
        if let Some(w) = writer.as_mut() {
            w.write(view)?;
        }
        Ok(())
    })?;

    if let Some(w) = writer {
        let count = w.finish()?;
        info!("wrote {count} snapshot(s){suffix}");
    }
    Ok(report)
}

fn parse_procs(s: &str) -> CliResult<[usize; 3]> {
    let mut procs = [1usize; 3];
    let parts: Vec<&str> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(format!("--procs expects 1 to 3 comma-separated counts, got `{s}`").into());
    }
    for (slot, part) in procs.iter_mut().zip(&parts) {
        *slot = part.parse()?;
    }
    Ok(procs)
}

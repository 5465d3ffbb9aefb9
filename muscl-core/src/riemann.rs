//! Approximate Riemann solvers for the Euler equations.
//!
//! Every solver works in the face frame: the normal velocity sits at `IU` and
//! the two transverse components at `IV`/`IW` (zero when unused). The
//! [`solve_face`] helper rotates a face normal to any axis into that frame
//! and the flux back out of it.
//!
//! All solvers are consistent, `F*(q, q) = F(q)`, up to round-off, and floor
//! density and pressure on input so near-vacuum states never divide by zero.

use serde::{Deserialize, Serialize};

use crate::config::named_options;
use crate::eos::IdealGas;
use crate::state::{HydroState, ID, IE, IP, IU, IV, IW};

/// Parameters a Riemann solve needs besides the two states.
#[derive(Clone, Copy, Debug)]
pub struct RiemannContext {
    pub gas: IdealGas,
    /// Newton iterations for the iterative solver.
    pub niter: usize,
}

impl RiemannContext {
    pub fn new(gas: IdealGas, niter: usize) -> Self {
        Self { gas, niter }
    }

    #[inline]
    fn smallpp(&self) -> f64 {
        self.gas.smallr * self.gas.smallp
    }
}

pub trait RiemannSolver: Send + Sync {
    /// Numerical flux between primitive states `ql` and `qr` in the face frame.
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState;

    fn name(&self) -> &'static str;
}

/// Solve the Riemann problem at a face normal to `axis`.
#[inline]
pub fn solve_face<R: RiemannSolver + ?Sized>(
    solver: &R,
    ql: &HydroState,
    qr: &HydroState,
    axis: usize,
    ctx: &RiemannContext,
) -> HydroState {
    solver
        .solve(&ql.rotate(axis), &qr.rotate(axis), ctx)
        .rotate(axis)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Floored density, normal velocity and pressure of a face-frame state.
#[inline]
fn floored(q: &HydroState, gas: &IdealGas) -> (f64, f64, f64) {
    let r = q[ID].max(gas.smallr);
    (r, q[IU], q[IP].max(r * gas.smallp))
}

#[inline]
fn sound(r: f64, p: f64, gas: &IdealGas) -> f64 {
    (gas.gamma * p / r).sqrt().max(gas.smallc)
}

#[inline]
fn kinetic(r: f64, q: &HydroState) -> f64 {
    0.5 * r * (q[IU] * q[IU] + q[IV] * q[IV] + q[IW] * q[IW])
}

/// Conservative state and physical flux of a face-frame primitive state.
#[inline]
fn state_and_flux(q: &HydroState, gas: &IdealGas) -> (HydroState, HydroState) {
    let (r, u, p) = floored(q, gas);
    let e = p / (gas.gamma - 1.0) + kinetic(r, q);

    let cons = HydroState([r, e, r * q[IU], r * q[IV], r * q[IW]]);
    let mut flux = cons * u;
    flux[IU] += p;
    flux[IE] = u * (e + p);
    (cons, flux)
}

/// Godunov flux of a sampled primitive state (`cmpflx` in MUSCL codes).
#[inline]
fn godunov_flux(q: &HydroState, gas: &IdealGas) -> HydroState {
    state_and_flux(q, gas).1
}

// =============================================================================
// Solvers
// =============================================================================

/// Two-wave HLL estimate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hll;

impl RiemannSolver for Hll {
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState {
        let gas = &ctx.gas;
        let (rl, ul, pl) = floored(ql, gas);
        let (rr, ur, pr) = floored(qr, gas);
        let cl = sound(rl, pl, gas);
        let cr = sound(rr, pr, gas);

        let sl = (ul - cl).min(ur - cr).min(0.0);
        let sr = (ul + cl).max(ur + cr).max(0.0);

        let (uml, fl) = state_and_flux(ql, gas);
        let (umr, fr) = state_and_flux(qr, gas);

        if sl == 0.0 {
            return fl;
        }
        if sr == 0.0 {
            return fr;
        }
        (fl * sr - fr * sl + (umr - uml) * (sl * sr)) * (1.0 / (sr - sl))
    }

    fn name(&self) -> &'static str {
        "hll"
    }
}

/// HLLC: HLL with the contact wave restored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hllc;

impl RiemannSolver for Hllc {
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState {
        let gas = &ctx.gas;
        let entho = 1.0 / (gas.gamma - 1.0);

        let (rl, ul, pl) = floored(ql, gas);
        let etotl = pl * entho + kinetic(rl, ql);
        let (rr, ur, pr) = floored(qr, gas);
        let etotr = pr * entho + kinetic(rr, qr);

        let cfastl = sound(rl, pl, gas);
        let cfastr = sound(rr, pr, gas);

        let sl = ul.min(ur) - cfastl.max(cfastr);
        let sr = ul.max(ur) + cfastl.max(cfastr);

        // Lagrangian sound speeds
        let rcl = rl * (ul - sl);
        let rcr = rr * (sr - ur);

        let ustar = (rcr * ur + rcl * ul + (pl - pr)) / (rcr + rcl);
        let pstar = (rcr * pl + rcl * pr + rcl * rcr * (ul - ur)) / (rcr + rcl);

        let (ro, uo, po, eo) = if sl > 0.0 {
            (rl, ul, pl, etotl)
        } else if ustar > 0.0 {
            let rstar = rl * (sl - ul) / (sl - ustar);
            let estar = ((sl - ul) * etotl - pl * ul + pstar * ustar) / (sl - ustar);
            (rstar, ustar, pstar, estar)
        } else if sr > 0.0 {
            let rstar = rr * (sr - ur) / (sr - ustar);
            let estar = ((sr - ur) * etotr - pr * ur + pstar * ustar) / (sr - ustar);
            (rstar, ustar, pstar, estar)
        } else {
            (rr, ur, pr, etotr)
        };

        let mut flux = HydroState::ZERO;
        flux[ID] = ro * uo;
        flux[IU] = ro * uo * uo + po;
        flux[IE] = (eo + po) * uo;
        let upwind = if flux[ID] > 0.0 { ql } else { qr };
        flux[IV] = flux[ID] * upwind[IV];
        flux[IW] = flux[ID] * upwind[IW];
        flux
    }

    fn name(&self) -> &'static str {
        "hllc"
    }
}

/// Two-shock approximation solved by Newton iteration on the star pressure,
/// then sampled at `x/t = 0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproxIterative;

impl RiemannSolver for ApproxIterative {
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState {
        let gas = &ctx.gas;
        let gamma = gas.gamma;
        let gamma6 = (gamma + 1.0) / (2.0 * gamma);

        let (rl, ul, pl) = floored(ql, gas);
        let (rr, ur, pr) = floored(qr, gas);

        // Lagrangian sound speeds squared
        let cl = gamma * pl * rl;
        let cr = gamma * pr * rr;

        let mut wl = cl.sqrt();
        let mut wr = cr.sqrt();
        let mut pold = (((wr * pl + wl * pr) + wl * wr * (ul - ur)) / (wl + wr)).max(0.0);

        let mut conv = 1.0;
        let mut iter = 0;
        while iter < ctx.niter && conv > 1e-6 {
            let wwl = (cl * (1.0 + gamma6 * (pold - pl) / pl)).sqrt();
            let wwr = (cr * (1.0 + gamma6 * (pold - pr) / pr)).sqrt();
            let zl = 2.0 * wwl * wwl * wwl / (wwl * wwl + cl);
            let zr = 2.0 * wwr * wwr * wwr / (wwr * wwr + cr);
            let usl = ul - (pold - pl) / wwl;
            let usr = ur + (pold - pr) / wwr;
            let delp = (zr * zl / (zr + zl) * (usl - usr)).max(-pold);
            pold += delp;
            conv = (delp / (pold + ctx.smallpp())).abs();
            iter += 1;
        }

        let pstar = pold;
        wl = (cl * (1.0 + gamma6 * (pstar - pl) / pl)).sqrt();
        wr = (cr * (1.0 + gamma6 * (pstar - pr) / pr)).sqrt();
        let ustar = 0.5 * (ul + (pl - pstar) / wl + ur - (pr - pstar) / wr);

        // Which side of the contact the face sees
        let left = ustar >= 0.0;
        let (ro, uo, po, wo, sgnm) = if left {
            (rl, ul, pl, wl, 1.0)
        } else {
            (rr, ur, pr, wr, -1.0)
        };
        let co = (gamma * po / ro).abs().sqrt().max(gas.smallc);

        let rstar = (ro / (1.0 + ro * (po - pstar) / (wo * wo))).max(gas.smallr);
        let cstar = (gamma * pstar / rstar).abs().sqrt().max(gas.smallc);

        // Rarefaction head/tail, or the shock speed when compressive
        let (mut spout, mut spin) = (co - sgnm * uo, cstar - sgnm * ustar);
        if pstar >= po {
            let ushock = wo / ro - sgnm * uo;
            spout = ushock;
            spin = ushock;
        }

        let scr = (spout - spin).max(gas.smallc + (spout + spin).abs());
        let frac = (0.5 * (1.0 + (spout + spin) / scr)).clamp(0.0, 1.0);

        let mut q = HydroState::ZERO;
        q[ID] = frac * rstar + (1.0 - frac) * ro;
        q[IU] = frac * ustar + (1.0 - frac) * uo;
        q[IP] = frac * pstar + (1.0 - frac) * po;
        if spout < 0.0 {
            q[ID] = ro;
            q[IU] = uo;
            q[IP] = po;
        }
        if spin > 0.0 {
            q[ID] = rstar;
            q[IU] = ustar;
            q[IP] = pstar;
        }

        let upwind = if left { ql } else { qr };
        q[IV] = upwind[IV];
        q[IW] = upwind[IW];

        godunov_flux(&q, gas)
    }

    fn name(&self) -> &'static str {
        "approx"
    }
}

/// Local Lax-Friedrichs (Rusanov): central flux plus maximal dissipation.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalLaxFriedrichs;

impl RiemannSolver for LocalLaxFriedrichs {
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState {
        let gas = &ctx.gas;
        let (uml, fl) = state_and_flux(ql, gas);
        let (umr, fr) = state_and_flux(qr, gas);

        let speed = |q: &HydroState| {
            let (r, u, p) = floored(q, gas);
            u.abs() + sound(r, p, gas)
        };
        let smax = speed(ql).max(speed(qr));

        (fl + fr) * 0.5 - (umr - uml) * (0.5 * smax)
    }

    fn name(&self) -> &'static str {
        "llf"
    }
}

// =============================================================================
// Configuration-selected solver
// =============================================================================

/// The closed set of solvers a run can be configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiemannSolverKind {
    /// Iterative two-shock solver.
    Approx,
    Hll,
    #[default]
    Hllc,
    /// Local Lax-Friedrichs / Rusanov.
    Llf,
}

named_options!(RiemannSolverKind, "hydro.riemann", {
    Approx => "approx",
    Hll => "hll",
    Hllc => "hllc",
    Llf => "llf",
});

impl RiemannSolver for RiemannSolverKind {
    #[inline]
    fn solve(&self, ql: &HydroState, qr: &HydroState, ctx: &RiemannContext) -> HydroState {
        match self {
            RiemannSolverKind::Approx => ApproxIterative.solve(ql, qr, ctx),
            RiemannSolverKind::Hll => Hll.solve(ql, qr, ctx),
            RiemannSolverKind::Hllc => Hllc.solve(ql, qr, ctx),
            RiemannSolverKind::Llf => LocalLaxFriedrichs.solve(ql, qr, ctx),
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }
}

//! Process topology and the two blocking collectives the scheme needs:
//! ghost exchange (point-to-point, per axis) and time-step reduction.
//!
//! [`SingleProcess`] is what a plain run uses. [`ThreadCluster`] runs one
//! solver per thread over a Cartesian decomposition of the mesh, which is
//! enough to exercise the decomposed code path without an MPI runtime.
//!
//! Collectives are fallible: once any rank of a cluster has gone away
//! (returned or panicked), every pending and later barrier, reduction or
//! ghost receive on the other ranks fails with
//! [`HydroError::Communication`] instead of blocking forever.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::error::{HydroError, HydroResult};
use crate::grid::Side;
use crate::state::HydroState;

/// Position of this process in a Cartesian process grid, plus synchronous
/// exchange and reduction primitives.
pub trait Communicator<const D: usize>: Send {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn coords(&self) -> [usize; D];

    /// Rank adjacent across `side` of `axis`, `None` at a physical boundary.
    /// Periodic axes wrap, so the neighbour may be this rank itself.
    fn neighbor(&self, axis: usize, side: Side) -> Option<usize>;

    /// Post the slab that fills the `side` ghosts of `to`.
    fn send_ghosts(&self, to: usize, axis: usize, side: Side, cells: Vec<HydroState>) -> HydroResult<()>;

    /// Block until the slab for this rank's `side` ghosts along `axis` arrives.
    fn recv_ghosts(&self, axis: usize, side: Side) -> HydroResult<Vec<HydroState>>;

    fn barrier(&self) -> HydroResult<()>;
    fn all_reduce_min(&self, v: f64) -> HydroResult<f64>;
    fn all_reduce_max(&self, v: f64) -> HydroResult<f64>;
    fn all_reduce_sum(&self, v: f64) -> HydroResult<f64>;
}

/// The whole mesh in one process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl<const D: usize> Communicator<D> for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn coords(&self) -> [usize; D] {
        [0; D]
    }

    fn neighbor(&self, _axis: usize, _side: Side) -> Option<usize> {
        None
    }

    fn send_ghosts(&self, to: usize, axis: usize, _side: Side, _cells: Vec<HydroState>) -> HydroResult<()> {
        Err(HydroError::Communication(format!(
            "single process has no peer {to} along axis {axis}"
        )))
    }

    fn recv_ghosts(&self, axis: usize, _side: Side) -> HydroResult<Vec<HydroState>> {
        Err(HydroError::Communication(format!(
            "single process has no peer along axis {axis}"
        )))
    }

    fn barrier(&self) -> HydroResult<()> {
        Ok(())
    }

    fn all_reduce_min(&self, v: f64) -> HydroResult<f64> {
        Ok(v)
    }

    fn all_reduce_max(&self, v: f64) -> HydroResult<f64> {
        Ok(v)
    }

    fn all_reduce_sum(&self, v: f64) -> HydroResult<f64> {
        Ok(v)
    }
}

#[derive(Debug)]
struct GhostMessage {
    axis: usize,
    side: Side,
    cells: Vec<HydroState>,
}

#[derive(Debug)]
enum Message {
    Ghosts(GhostMessage),
    /// The sending rank has left the cluster.
    Departed(usize),
}

fn departed(rank: usize) -> HydroError {
    HydroError::Communication(format!("rank {rank} left the cluster"))
}

#[derive(Default)]
struct RendezvousState {
    arrived: usize,
    generation: u64,
    departed: Option<usize>,
}

/// Reusable barrier that fails, rather than hangs, once a rank is gone.
struct Rendezvous {
    size: usize,
    state: Mutex<RendezvousState>,
    cond: Condvar,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RendezvousState::default()),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) -> HydroResult<()> {
        let mut s = self.state.lock();
        if let Some(rank) = s.departed {
            return Err(departed(rank));
        }
        let generation = s.generation;
        s.arrived += 1;
        if s.arrived == self.size {
            s.arrived = 0;
            s.generation = s.generation.wrapping_add(1);
            self.cond.notify_all();
            return Ok(());
        }
        // a completed generation wins over a later departure
        while s.generation == generation {
            if let Some(rank) = s.departed {
                return Err(departed(rank));
            }
            self.cond.wait(&mut s);
        }
        Ok(())
    }

    fn depart(&self, rank: usize) {
        let mut s = self.state.lock();
        s.departed.get_or_insert(rank);
        self.cond.notify_all();
    }
}

struct Shared {
    rendezvous: Rendezvous,
    slots: Mutex<Vec<f64>>,
}

/// One rank of a [`ThreadCluster`].
pub struct ThreadComm<const D: usize> {
    rank: usize,
    procs: [usize; D],
    coords: [usize; D],
    periodic: [bool; D],
    inbox: Receiver<Message>,
    outboxes: Vec<Sender<Message>>,
    stash: Mutex<Vec<GhostMessage>>,
    shared: Arc<Shared>,
}

impl<const D: usize> ThreadComm<D> {
    fn rank_of(procs: &[usize; D], coords: &[usize; D]) -> usize {
        let mut rank = 0;
        let mut stride = 1;
        for a in 0..D {
            rank += coords[a] * stride;
            stride *= procs[a];
        }
        rank
    }

    fn reduce(&self, v: f64, op: fn(f64, f64) -> f64) -> HydroResult<f64> {
        self.shared.slots.lock()[self.rank] = v;
        self.shared.rendezvous.wait()?;
        let out = self
            .shared
            .slots
            .lock()
            .iter()
            .copied()
            .reduce(op)
            .unwrap_or(v);
        // nobody may overwrite a slot before every rank has read them all
        self.shared.rendezvous.wait()?;
        Ok(out)
    }
}

impl<const D: usize> Communicator<D> for ThreadComm<D> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn coords(&self) -> [usize; D] {
        self.coords
    }

    fn neighbor(&self, axis: usize, side: Side) -> Option<usize> {
        let p = self.procs[axis];
        let c = self.coords[axis];
        let next = match side {
            Side::Low if c > 0 => c - 1,
            Side::Low if self.periodic[axis] => p - 1,
            Side::High if c + 1 < p => c + 1,
            Side::High if self.periodic[axis] => 0,
            _ => return None,
        };
        let mut coords = self.coords;
        coords[axis] = next;
        Some(Self::rank_of(&self.procs, &coords))
    }

    fn send_ghosts(&self, to: usize, axis: usize, side: Side, cells: Vec<HydroState>) -> HydroResult<()> {
        self.outboxes
            .get(to)
            .ok_or_else(|| HydroError::Communication(format!("no rank {to}")))?
            .send(Message::Ghosts(GhostMessage { axis, side, cells }))
            .map_err(|_| HydroError::Communication(format!("rank {to} hung up")))
    }

    fn recv_ghosts(&self, axis: usize, side: Side) -> HydroResult<Vec<HydroState>> {
        {
            let mut stash = self.stash.lock();
            if let Some(pos) = stash.iter().position(|m| m.axis == axis && m.side == side) {
                return Ok(stash.swap_remove(pos).cells);
            }
        }
        loop {
            let msg = self
                .inbox
                .recv()
                .map_err(|_| HydroError::Communication("all peers hung up".into()))?;
            match msg {
                Message::Ghosts(m) if m.axis == axis && m.side == side => return Ok(m.cells),
                Message::Ghosts(m) => self.stash.lock().push(m),
                Message::Departed(rank) => return Err(departed(rank)),
            }
        }
    }

    fn barrier(&self) -> HydroResult<()> {
        self.shared.rendezvous.wait()
    }

    fn all_reduce_min(&self, v: f64) -> HydroResult<f64> {
        self.reduce(v, f64::min)
    }

    fn all_reduce_max(&self, v: f64) -> HydroResult<f64> {
        self.reduce(v, f64::max)
    }

    fn all_reduce_sum(&self, v: f64) -> HydroResult<f64> {
        self.reduce(v, |a, b| a + b)
    }
}

/// Leaving the cluster, by return or by panic, releases every peer blocked
/// on this rank.
impl<const D: usize> Drop for ThreadComm<D> {
    fn drop(&mut self) {
        self.shared.rendezvous.depart(self.rank);
        for (rank, outbox) in self.outboxes.iter().enumerate() {
            if rank != self.rank {
                // a peer that is already gone has nothing left to wake
                let _ = outbox.send(Message::Departed(self.rank));
            }
        }
    }
}

/// Runs one closure per rank on scoped threads.
pub struct ThreadCluster;

impl ThreadCluster {
    /// Build the communicators for a `procs` process grid and run `f` on
    /// each of them concurrently. Results are returned in rank order.
    pub fn run<const D: usize, R, F>(procs: [usize; D], periodic: [bool; D], f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(ThreadComm<D>) -> R + Sync,
    {
        let size: usize = procs.iter().product();
        let shared = Arc::new(Shared {
            rendezvous: Rendezvous::new(size),
            slots: Mutex::new(vec![0.0; size]),
        });
        let (outboxes, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

        let comms: Vec<ThreadComm<D>> = inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                let mut coords = [0usize; D];
                let mut rest = rank;
                for a in 0..D {
                    coords[a] = rest % procs[a];
                    rest /= procs[a];
                }
                ThreadComm {
                    rank,
                    procs,
                    coords,
                    periodic,
                    inbox,
                    outboxes: outboxes.clone(),
                    stash: Mutex::new(Vec::new()),
                    shared: Arc::clone(&shared),
                }
            })
            .collect();
        drop(outboxes);

        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| s.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_wrap_only_when_periodic() {
        let out = ThreadCluster::run([3, 2], [true, false], |comm| {
            (
                comm.rank(),
                comm.neighbor(0, Side::Low),
                comm.neighbor(1, Side::High),
            )
        });
        assert_eq!(out[0], (0, Some(2), Some(3)));
        assert_eq!(out[4], (4, Some(3), None));
    }

    #[test]
    fn reductions_agree_on_every_rank() {
        let out = ThreadCluster::run([4], [false], |comm| {
            let r = comm.rank() as f64;
            (
                comm.all_reduce_min(r + 1.0).unwrap(),
                comm.all_reduce_max(r).unwrap(),
                comm.all_reduce_sum(r).unwrap(),
            )
        });
        assert!(out.iter().all(|&v| v == (1.0, 3.0, 6.0)));
    }

    #[test]
    fn ghost_messages_are_matched_by_tag() {
        let out = ThreadCluster::run([2], [true], |comm| {
            let me = comm.rank() as f64;
            let peer = comm.neighbor(0, Side::High).unwrap();
            let payload = |tag: f64| vec![HydroState([me, tag, 0.0, 0.0, 0.0])];
            comm.send_ghosts(peer, 0, Side::High, payload(1.0)).unwrap();
            comm.send_ghosts(peer, 0, Side::Low, payload(2.0)).unwrap();
            let low = comm.recv_ghosts(0, Side::Low).unwrap();
            let high = comm.recv_ghosts(0, Side::High).unwrap();
            (low[0][1], high[0][1], low[0][0])
        });
        assert_eq!(out[0], (2.0, 1.0, 1.0));
        assert_eq!(out[1], (2.0, 1.0, 0.0));
    }

    #[test]
    fn departed_rank_fails_pending_collectives() {
        let out = ThreadCluster::run([3], [false], |comm| {
            if comm.rank() == 1 {
                return None;
            }
            let sum = comm.all_reduce_sum(1.0);
            let ghosts = comm.recv_ghosts(0, Side::High);
            Some((sum.is_err(), ghosts.is_err()))
        });
        assert_eq!(out, vec![Some((true, true)), None, Some((true, true))]);
    }
}

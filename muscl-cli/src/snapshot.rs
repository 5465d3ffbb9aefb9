use muscl_core::{ID, IE, StateView, nbvar};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of `meta.jsonl`, describing the matching block of `state.bin`.
#[derive(Serialize)]
struct MetaRow<'a> {
    snapshot_idx: u64,
    iteration: u64,
    time: f64,

    rank: usize,
    dimension: usize,
    n: Vec<usize>,
    offset: Vec<usize>,
    nbvar: usize,

    problem: &'a str,
    gamma: f64,

    mass: f64,
    energy: f64,
}

/// Appends interior conserved variables (variable-major, x fastest, f64
/// little-endian) to `state.bin` and one metadata row per snapshot.
pub struct SnapshotWriter {
    state: BufWriter<File>,
    meta: BufWriter<File>,
    count: u64,
    problem: String,
    gamma: f64,
}

impl SnapshotWriter {
    /// `suffix` distinguishes the files of each rank in a decomposed run.
    pub fn create(dir: &Path, suffix: &str, problem: &str, gamma: f64) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let state = BufWriter::new(File::create(dir.join(format!("state{suffix}.bin")))?);
        let meta = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(dir.join(format!("meta{suffix}.jsonl")))?,
        );
        Ok(Self {
            state,
            meta,
            count: 0,
            problem: problem.to_string(),
            gamma,
        })
    }

    /// Collective when the run is distributed (domain totals are reduced).
    pub fn write<const D: usize>(&mut self, view: &StateView<'_, D>) -> std::io::Result<()> {
        for var in 0..nbvar(D) {
            write_f64_vec(&mut self.state, &view.conserved_variable(var))?;
        }

        let totals = view.totals().map_err(std::io::Error::other)?;
        let grid = view.grid();
        let row = MetaRow {
            snapshot_idx: self.count,
            iteration: view.iteration(),
            time: view.time(),
            rank: view.rank(),
            dimension: D,
            n: grid.n().to_vec(),
            offset: grid.offset().to_vec(),
            nbvar: nbvar(D),
            problem: &self.problem,
            gamma: self.gamma,
            mass: totals[ID],
            energy: totals[IE],
        };
        serde_json::to_writer(&mut self.meta, &row)?;
        self.meta.write_all(b"\n")?;

        self.count += 1;
        Ok(())
    }

    pub fn finish(mut self) -> std::io::Result<u64> {
        self.state.flush()?;
        self.meta.flush()?;
        Ok(self.count)
    }
}

fn write_f64_vec<W: Write>(w: &mut W, v: &[f64]) -> std::io::Result<()> {
    for &x in v {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_values_are_little_endian() {
        let mut buf = Vec::new();
        write_f64_vec(&mut buf, &[1.0, -2.5]).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..8], &1.0f64.to_le_bytes());
        assert_eq!(f64::from_le_bytes(buf[8..].try_into().unwrap()), -2.5);
    }
}

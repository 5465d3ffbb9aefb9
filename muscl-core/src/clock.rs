//! Simulation time and termination bookkeeping.

/// Time, step count and stop conditions of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationClock {
    time: f64,
    iteration: u64,
    t_end: f64,
    max_steps: u64,
    output_every: u64,
}

impl SimulationClock {
    pub fn new(t_end: f64, max_steps: u64, output_every: u64) -> Self {
        Self {
            time: 0.0,
            iteration: 0,
            t_end,
            max_steps,
            output_every,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.t_end || self.iteration >= self.max_steps
    }

    /// Time left before `t_end`.
    pub fn remaining(&self) -> f64 {
        (self.t_end - self.time).max(0.0)
    }

    /// Shorten `dt` so that the step lands exactly on `t_end`.
    pub fn clip(&self, dt: f64) -> f64 {
        dt.min(self.remaining())
    }

    /// Commit a completed step.
    pub fn advance(&mut self, dt: f64) {
        let remaining = self.remaining();
        if dt >= remaining {
            self.time = self.t_end;
        } else {
            self.time += dt;
        }
        self.iteration += 1;
    }

    /// Whether a snapshot is due after the current iteration.
    pub fn should_output(&self) -> bool {
        self.output_every > 0 && self.iteration > 0 && self.iteration % self.output_every == 0
    }
}

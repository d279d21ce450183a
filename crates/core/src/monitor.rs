//! Wall-clock monitoring of the stepping loop.

use std::time::Instant;

use tracing::info;

/// Accumulates wall-clock time across steps and reports progress on rank 0.
pub struct TimeMonitor {
    rank: usize,
    num_steps: usize,
    last_tick: Instant,
    interval_elapsed: f64,
    total_elapsed: f64,
}

impl TimeMonitor {
    pub fn new(rank: usize, num_steps: usize) -> Self {
        TimeMonitor {
            rank,
            num_steps,
            last_tick: Instant::now(),
            interval_elapsed: 0.0,
            total_elapsed: 0.0,
        }
    }

    /// Fold the time since the previous tick into the running totals.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        self.interval_elapsed += elapsed;
        self.total_elapsed += elapsed;
        self.last_tick = now;
    }

    /// Report progress at `step` and reset the interval accumulator.
    pub fn write(&mut self, step: usize) {
        if self.rank == 0 {
            info!(
                "Time Step: {}/{}, Elapsed: {:.6} seconds, Total: {:.6} seconds",
                step, self.num_steps, self.interval_elapsed, self.total_elapsed
            );
        }
        self.interval_elapsed = 0.0;
    }

    pub fn total_elapsed(&self) -> f64 {
        self.total_elapsed
    }
}

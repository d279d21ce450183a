//! Time-stepping orchestration for one simulated layer.
//!
//! A layer run advances the temperature field step by step: query the beam,
//! copy the field into the previous-step buffer, run the FTCS update, make
//! the ghost layer authoritative again (physical boundaries, then halos),
//! and scan for solidification events. Snapshots and monitor entries are
//! emitted at their configured intervals and always at the final step.

use tracing::debug;

use crate::beam::MovingBeam;
use crate::comm::Communicator;
use crate::config::{Config, RunParams};
use crate::error::Result;
use crate::grid::LocalGrid;
use crate::monitor::TimeMonitor;
use crate::solidification::{SolidificationData, EVENT_COMPONENTS};
use crate::solver::Solver;

/// Whether a periodic emission is due at `step`. The final step always
/// emits, unless the channel is suppressed outright (interval beyond the
/// end of the run).
fn due(step: usize, interval: usize, last: bool, num_steps: usize) -> bool {
    step % interval == 0 || (last && interval <= num_steps)
}

/// One simulated layer: the stepping loop plus the optional solidification
/// recorder.
pub struct Layer {
    sampler: Option<SolidificationData>,
}

impl Layer {
    /// Create the layer, constructing the solidification recorder when the
    /// configuration enables sampling.
    pub fn new(config: &Config, grid: &LocalGrid) -> Self {
        let sampler = config.sampling.as_ref().map(|sampling| {
            SolidificationData::new(
                sampling,
                config.properties.liquidus,
                config.run_params().dt,
                grid,
            )
        });
        Layer { sampler }
    }

    /// Run the full stepping loop.
    pub fn run(
        &mut self,
        config: &Config,
        params: &RunParams,
        grid: &mut LocalGrid,
        beam: &mut MovingBeam,
        solver: &Solver,
    ) -> Result<()> {
        let mut monitor = TimeMonitor::new(grid.rank(), params.num_steps);
        let mut time = config.time.start_time;

        for n in 0..params.num_steps {
            monitor.tick();
            time += params.dt;

            self.step(grid, beam, solver, time);

            let step = n + 1;
            let last = step == params.num_steps;
            if due(step, params.monitor_interval, last, params.num_steps) {
                monitor.write(step);
            }
            if due(step, params.output_interval, last, params.num_steps) {
                grid.output(step, step as f64 * params.dt)?;
            }
        }
        Ok(())
    }

    /// Advance one step to simulated time `time`.
    pub fn step(&mut self, grid: &mut LocalGrid, beam: &mut MovingBeam, solver: &Solver, time: f64) {
        beam.move_to(time);
        let power = beam.power();
        let position = beam.position();
        debug!(
            "step to t={time:.6e}: beam at ({:.4e}, {:.4e}, {:.4e}), power {power}",
            position[0], position[1], position[2]
        );

        grid.store_previous();

        let (block, t, t0) = grid.step_views();
        solver.step(block, t, t0, power, position);

        grid.update_boundaries();
        grid.gather();

        if let Some(sampler) = &mut self.sampler {
            sampler.update(grid, time);
        }
    }

    pub fn solidification_data(&self) -> Option<&SolidificationData> {
        self.sampler.as_ref()
    }

    /// All recorded event rows, or an empty list when sampling is disabled.
    pub fn get_solidification_data(&self) -> Vec<[f64; EVENT_COMPONENTS]> {
        self.sampler.as_ref().map(|s| s.get()).unwrap_or_default()
    }

    /// Write the per-rank event files. A no-op when sampling is disabled.
    pub fn write_solidification_data(&self) -> Result<()> {
        match &self.sampler {
            Some(sampler) => sampler.write(),
            None => Ok(()),
        }
    }

    pub fn lower_solidification_bounds(&self, comm: &dyn Communicator) -> [f64; 3] {
        match &self.sampler {
            Some(sampler) => sampler.lower_bounds(comm),
            None => comm.all_reduce_min([f64::INFINITY; 3]),
        }
    }

    pub fn upper_solidification_bounds(&self, comm: &dyn Communicator) -> [f64; 3] {
        match &self.sampler {
            Some(sampler) => sampler.upper_bounds(comm),
            None => comm.all_reduce_max([f64::NEG_INFINITY; 3]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::due;

    #[test]
    fn test_emission_schedule() {
        // Interval 3 over 10 steps: periodic plus the terminal step.
        let steps: Vec<usize> = (1..=10).filter(|&s| due(s, 3, s == 10, 10)).collect();
        assert_eq!(steps, vec![3, 6, 9, 10]);

        // Suppressed channel (interval N + 1) never emits, not even at the
        // final step.
        assert!((1..=10).all(|s| !due(s, 11, s == 10, 10)));

        // An interval that divides the step count emits no duplicate at the
        // end.
        let steps: Vec<usize> = (1..=10).filter(|&s| due(s, 5, s == 10, 10)).collect();
        assert_eq!(steps, vec![5, 10]);
    }
}

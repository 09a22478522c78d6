//! Simulation driver.
//!
//! Ties the model to an outer time loop: scheduled particle releases,
//! per-step updates, and an optional callback for output writers. The loop
//! advances t := t + dt until the configured duration is reached; a
//! negative duration (end before start) runs the clock backwards against a
//! backward-bracketing mediator.

use std::time::Instant;

use crate::model::{Model, StepError};
use crate::reader::Mediator;
use crate::seeding::SeedError;

/// Result of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    /// Final simulation time reached (seconds from start).
    pub final_time: f64,
    /// Number of time steps taken.
    pub n_steps: usize,
    /// Number of particle releases performed.
    pub n_releases: u32,
    /// Total wall-clock time in seconds.
    pub wall_time: f64,
    /// Whether the run completed.
    pub success: bool,
    /// Error message if the run failed.
    pub error: Option<String>,
}

impl SimulationResult {
    fn success(final_time: f64, n_steps: usize, n_releases: u32, wall_time: f64) -> Self {
        Self {
            final_time,
            n_steps,
            n_releases,
            wall_time,
            success: true,
            error: None,
        }
    }

    fn failure(final_time: f64, n_steps: usize, n_releases: u32, error: String) -> Self {
        Self {
            final_time,
            n_steps,
            n_releases,
            wall_time: 0.0,
            success: false,
            error: Some(error),
        }
    }
}

/// High-level driver owning a model.
pub struct Simulation<M: Mediator> {
    model: Model<M>,
}

impl<M: Mediator> Simulation<M> {
    pub fn new(model: Model<M>) -> Self {
        Self { model }
    }

    /// The model, for inspection after a run.
    pub fn model(&self) -> &Model<M> {
        &self.model
    }

    /// Run without a callback.
    pub fn run(&mut self) -> SimulationResult {
        self.run_with_callback(|_, _| {})
    }

    /// Run, invoking `callback(t, model)` after every committed step.
    pub fn run_with_callback(
        &mut self,
        mut callback: impl FnMut(f64, &Model<M>),
    ) -> SimulationResult {
        let started = Instant::now();

        let sim = self.model.config().simulation.clone();
        let duration = self.model.config().duration_seconds();
        let sign = if duration < 0.0 { -1.0 } else { 1.0 };
        let dt = sim.time_step * sign;
        let n_steps = (duration.abs() / sim.time_step).round() as usize;

        let release_interval = sim.particle_release_interval_in_hours * 3600.0 * sign;
        let n_releases = sim.number_of_particle_releases.max(1);
        let mut next_release: u32 = 0;

        if let Err(e) = self.model.setup_data_access(0.0, duration) {
            return SimulationResult::failure(0.0, 0, 0, e.to_string());
        }

        let mut t = 0.0;
        for step in 0..n_steps {
            t = step as f64 * dt;

            while next_release < n_releases && release_due(t, next_release, release_interval, dt) {
                if let Err(e) = self.release(t) {
                    return SimulationResult::failure(t, step, next_release, e.to_string());
                }
                next_release += 1;
            }

            if let Err(e) = self.step(t) {
                return SimulationResult::failure(t, step, next_release, e.to_string());
            }
            t += dt;
            callback(t, &self.model);
        }

        SimulationResult::success(t, n_steps, next_release, started.elapsed().as_secs_f64())
    }

    fn release(&mut self, t: f64) -> Result<(), SeedError> {
        self.model.release_particles(t)
    }

    fn step(&mut self, t: f64) -> Result<(), StepError> {
        self.model.update(t)
    }
}

/// Whether release `index` falls on the step starting at `t`. Release
/// intervals are validated to be whole multiples of the time step, so a
/// half-step window suffices.
fn release_due(t: f64, index: u32, interval: f64, dt: f64) -> bool {
    let due_at = index as f64 * interval;
    (t - due_at).abs() < 0.5 * dt.abs()
}

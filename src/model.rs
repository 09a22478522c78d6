//! Offline particle-tracking model.
//!
//! [`Model`] owns the active particle vector, an immutable copy of the seed
//! (so the population can be re-released for ensemble runs), one RNG stream
//! per particle, and the strategy objects built once from configuration.
//! Per step it runs the pipeline: advect, random-walk, propose, arbitrate
//! boundaries, commit.
//!
//! Within a step the grid and bracket frames are read-only and every
//! particle owns its mutable state, so the loop is embarrassingly parallel;
//! the `parallel` feature runs it under rayon. Per-particle RNG streams
//! make trajectories independent of particle ordering and of the thread
//! partition.

use rand::SeedableRng;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::boundary::{
    BoundaryError, HorizontalBoundary, VerticalBoundary, VerticalOutcome, LAND_REFLECTION_CAP,
};
use crate::config::ModelConfig;
use crate::integrator::{AdvectionError, Delta, NumIntegrator, StandardIntegrator};
use crate::particle::Particle;
use crate::random_walk::{
    HorizontalRandomWalk, ModelRng, StandardHorizRandomWalk, StandardVertRandomWalk,
    VerticalRandomWalk,
};
use crate::reader::{DataReader, Mediator, MeshDataReader, ReaderError};
use crate::seeding::{self, ParticleSeed, SeedError};
use crate::types::HostStatus;

/// Error type for a model step. Only mesh inconsistencies are fatal;
/// domain escapes and beaching are particle state, not errors.
#[derive(Debug, Error)]
pub enum StepError {
    /// Host search failed in a way that indicates inconsistent input.
    #[error("host search failed for particle {id}: mesh inconsistency")]
    HostSearchFailure { id: i32 },

    /// Field access failed.
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Boundary-condition application failed.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
}

/// Per-step particle diagnostics in particle-index order, consumed by
/// output writers.
#[derive(Clone, Debug, Default)]
pub struct ParticleSnapshot {
    pub x_positions: Vec<f64>,
    pub y_positions: Vec<f64>,
    pub z_positions: Vec<f64>,
    pub bathymetry: Vec<f64>,
    pub zeta: Vec<f64>,
    pub in_domain: Vec<bool>,
}

/// The step kernel: strategy set applied to one particle. Shared read-only
/// across worker threads.
struct StepKernel<'a, M: Mediator> {
    reader: &'a MeshDataReader<M>,
    integrator: Option<&'a StandardIntegrator>,
    horizontal_random_walk: Option<&'a StandardHorizRandomWalk>,
    vertical_random_walk: Option<&'a StandardVertRandomWalk>,
    horizontal_boundary: HorizontalBoundary,
    vertical_boundary: VerticalBoundary,
    dt: f64,
}

impl<M: Mediator> StepKernel<'_, M> {
    /// Advance one particle from `t` to `t + dt`.
    fn step(&self, t: f64, particle: &mut Particle, rng: &mut ModelRng) -> Result<(), StepError> {
        if !particle.in_domain {
            return Ok(());
        }

        let mut delta = Delta::default();

        if let Some(integrator) = self.integrator {
            match integrator.advect(t, particle, self.reader, &mut delta) {
                Ok(()) => {}
                Err(AdvectionError::DomainExit) => {
                    particle.in_domain = false;
                    return Ok(());
                }
                Err(AdvectionError::Reader(e)) => return Err(e.into()),
            }
        }
        if let Some(model) = self.vertical_random_walk {
            model.random_walk(t, particle, self.reader, rng, &mut delta)?;
        }
        if let Some(model) = self.horizontal_random_walk {
            model.random_walk(t, particle, self.reader, rng, &mut delta)?;
        }

        // Proposed position.
        let mut proposed = particle.clone();
        proposed.x1 = particle.x1 + delta.x;
        proposed.x2 = particle.x2 + delta.y;
        proposed.x3 = particle.x3 + delta.z;

        let mut flag = self.reader.find_host(particle, &mut proposed);

        let mut reflections = 0;
        while flag == HostStatus::LandBoundary {
            match self.horizontal_boundary {
                HorizontalBoundary::Reflecting(bc) => {
                    if reflections >= LAND_REFLECTION_CAP {
                        // Corner trap: give up and park the particle on the
                        // centroid of its last interior element. Logged once
                        // per particle.
                        if !particle.land_reflection_warning_issued {
                            log::warn!(
                                "particle {}: land-reflection cap exceeded, snapping to centroid",
                                particle.id
                            );
                            particle.land_reflection_warning_issued = true;
                        }
                        self.reader.set_default_location(&mut proposed);
                        flag = HostStatus::InDomain;
                        break;
                    }
                    bc.apply(self.reader, particle, &mut proposed)?;
                    flag = self.reader.find_host(particle, &mut proposed);
                    reflections += 1;
                }
                HorizontalBoundary::Restoring => {
                    proposed.x1 = particle.x1;
                    proposed.x2 = particle.x2;
                    proposed.host_horizontal_elem = particle.host_horizontal_elem;
                    proposed.phi = particle.phi;
                    flag = HostStatus::InDomain;
                }
                HorizontalBoundary::None => {
                    flag = HostStatus::OpenBoundary;
                }
            }
        }

        match flag {
            HostStatus::OpenBoundary => {
                // Position stays frozen at the last commit.
                particle.in_domain = false;
                Ok(())
            }
            HostStatus::BoundaryError => {
                particle.flag_error();
                Err(StepError::HostSearchFailure { id: particle.id })
            }
            HostStatus::InDomain => {
                particle.x1 = proposed.x1;
                particle.x2 = proposed.x2;
                particle.host_horizontal_elem = proposed.host_horizontal_elem;
                self.reader.set_local_coordinates(particle);

                let t_next = t + self.dt;
                let zmin = self.reader.get_zmin(t_next, particle);
                let zmax = self.reader.get_zmax(t_next, particle);
                match self.vertical_boundary.apply(proposed.x3, zmin, zmax) {
                    VerticalOutcome::InColumn(z) => {
                        particle.x3 = z;
                        self.reader.set_vertical_grid_vars(t_next, particle)?;
                        particle.is_beached =
                            if self.reader.is_wet(t_next, particle) { 0 } else { 1 };
                        Ok(())
                    }
                    VerticalOutcome::OutOfDomain => {
                        particle.in_domain = false;
                        Ok(())
                    }
                }
            }
            HostStatus::LandBoundary => {
                // The retry loop only exits with another flag.
                particle.flag_error();
                Err(StepError::HostSearchFailure { id: particle.id })
            }
        }
    }
}

/// Offline particle-tracking model over a mesh data reader.
pub struct Model<M: Mediator> {
    config: ModelConfig,
    reader: MeshDataReader<M>,
    integrator: Option<StandardIntegrator>,
    horizontal_random_walk: Option<StandardHorizRandomWalk>,
    vertical_random_walk: Option<StandardVertRandomWalk>,
    horizontal_boundary: HorizontalBoundary,
    vertical_boundary: VerticalBoundary,
    seed: ParticleSeed,
    particles: Vec<Particle>,
    rngs: Vec<ModelRng>,
    master_seed: u64,
}

impl<M: Mediator> Model<M> {
    /// Build a model from a validated configuration, a reader, and the seed
    /// population. The strategy objects are constructed here, once.
    pub fn new(
        config: ModelConfig,
        reader: MeshDataReader<M>,
        seed: ParticleSeed,
        master_seed: u64,
    ) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        let dt = config.simulation.time_step;

        let integrator = StandardIntegrator::from_config(&config.numerics, dt);
        let horizontal_random_walk = StandardHorizRandomWalk::from_config(&config.numerics, dt);
        let vertical_random_walk = StandardVertRandomWalk::from_config(&config.numerics, dt);
        let horizontal_boundary = HorizontalBoundary::from_config(&config.boundary_conditions);
        let vertical_boundary = VerticalBoundary::from_config(&config.boundary_conditions);

        if let Some(integrator) = &integrator {
            log::info!("advection scheme: {}", integrator.name());
        }

        Ok(Self {
            config,
            reader,
            integrator,
            horizontal_random_walk,
            vertical_random_walk,
            horizontal_boundary,
            vertical_boundary,
            seed,
            particles: Vec::new(),
            rngs: Vec::new(),
            master_seed,
        })
    }

    /// The active particle population, in release order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The run configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The data reader.
    pub fn reader(&self) -> &MeshDataReader<M> {
        &self.reader
    }

    /// Prepare field access for the run's time span.
    pub fn setup_data_access(&mut self, t_start: f64, t_end: f64) -> Result<(), ReaderError> {
        self.reader.setup_data_access(t_start, t_end)
    }

    /// Release one copy of the seed population at time `t`, appending to
    /// the active set. Each new particle gets its own RNG stream derived
    /// from the master seed.
    pub fn release_particles(&mut self, t: f64) -> Result<(), SeedError> {
        self.reader.read_data(t)?;
        let id_offset = self.particles.len() as i32;
        let released = seeding::release(
            &self.seed,
            &self.reader,
            t,
            self.config.simulation.depth_coordinates,
            id_offset,
        )?;
        for particle in &released {
            let mut rng = ModelRng::seed_from_u64(self.master_seed);
            rng.set_stream(particle.id as u64);
            self.rngs.push(rng);
        }
        self.particles.extend(released);
        Ok(())
    }

    /// Advance every in-domain particle from `t` to `t + dt`.
    pub fn update(&mut self, t: f64) -> Result<(), StepError> {
        self.reader.read_data(t)?;

        let kernel = StepKernel {
            reader: &self.reader,
            integrator: self.integrator.as_ref(),
            horizontal_random_walk: self.horizontal_random_walk.as_ref(),
            vertical_random_walk: self.vertical_random_walk.as_ref(),
            horizontal_boundary: self.horizontal_boundary,
            vertical_boundary: self.vertical_boundary,
            dt: self.config.simulation.time_step,
        };

        #[cfg(feature = "parallel")]
        {
            self.particles
                .par_iter_mut()
                .zip(self.rngs.par_iter_mut())
                .try_for_each(|(particle, rng)| kernel.step(t, particle, rng))
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.particles
                .iter_mut()
                .zip(self.rngs.iter_mut())
                .try_for_each(|(particle, rng)| kernel.step(t, particle, rng))
        }
    }

    /// Per-particle diagnostics at time `t`, in particle-index order.
    /// Out-of-domain particles report NaN for the field values.
    pub fn snapshot(&self, t: f64) -> ParticleSnapshot {
        let n = self.particles.len();
        let mut snap = ParticleSnapshot {
            x_positions: Vec::with_capacity(n),
            y_positions: Vec::with_capacity(n),
            z_positions: Vec::with_capacity(n),
            bathymetry: Vec::with_capacity(n),
            zeta: Vec::with_capacity(n),
            in_domain: Vec::with_capacity(n),
        };
        for particle in &self.particles {
            snap.x_positions.push(particle.x1);
            snap.y_positions.push(particle.x2);
            snap.z_positions.push(particle.x3);
            snap.in_domain.push(particle.in_domain);
            if particle.in_domain {
                snap.bathymetry.push(-self.reader.get_zmin(t, particle));
                snap.zeta.push(self.reader.get_zmax(t, particle));
            } else {
                snap.bathymetry.push(f64::NAN);
                snap.zeta.push(f64::NAN);
            }
        }
        snap
    }
}

//! Numerical integration of the advective displacement.
//!
//! An integrator composes velocity samples into a single position increment
//! written into a [`Delta`]; it never mutates the particle itself. Schemes
//! are selected once from configuration and dispatched through
//! [`StandardIntegrator`].
//!
//! Multi-stage schemes re-locate their intermediate positions through the
//! data reader. A stage that leaves the domain aborts the step with
//! [`AdvectionError::DomainExit`]; the orchestrator then flags the particle
//! out of the domain without committing a displacement.

use thiserror::Error;

use crate::boundary::reflect_into_range;
use crate::config::{IntegratorScheme, NumericsSection};
use crate::particle::Particle;
use crate::reader::{DataReader, ReaderError};
use crate::types::HostStatus;

/// Position increment accumulated over one time step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Delta {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Delta {
    /// Zero all components.
    #[inline]
    pub fn reset(&mut self) {
        *self = Delta::default();
    }
}

/// Error type for advection.
#[derive(Debug, Error)]
pub enum AdvectionError {
    /// An intermediate stage left the model domain. Non-fatal: the particle
    /// is flagged out of the domain.
    #[error("particle left the domain during integration")]
    DomainExit,

    /// Field access failed (mesh inconsistency). Fatal for the step.
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

/// Advection scheme contract.
pub trait NumIntegrator {
    /// Accumulate the advective displacement over `[t, t + dt]` into
    /// `delta`.
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError>;
}

/// Move a cloned stage particle and re-locate it on the grid.
///
/// Vertical excursions beyond the water column at the stage time are
/// reflected back inside before the velocity is sampled.
fn locate_stage(
    t_stage: f64,
    origin: &Particle,
    dx: f64,
    dy: f64,
    dz: Option<f64>,
    reader: &dyn DataReader,
) -> Result<Particle, AdvectionError> {
    let mut probe = origin.clone();
    probe.x1 = origin.x1 + dx;
    probe.x2 = origin.x2 + dy;

    if reader.find_host(origin, &mut probe) != HostStatus::InDomain {
        return Err(AdvectionError::DomainExit);
    }

    if let Some(dz) = dz {
        probe.x3 = origin.x3 + dz;
        let zmin = reader.get_zmin(t_stage, &probe);
        let zmax = reader.get_zmax(t_stage, &probe);
        probe.x3 = reflect_into_range(probe.x3, zmin, zmax);
        reader.set_vertical_grid_vars(t_stage, &mut probe)?;
    }
    Ok(probe)
}

// =============================================================================
// Euler
// =============================================================================

/// Forward Euler in three dimensions: Δx = u(t, x)·dt.
#[derive(Clone, Copy, Debug)]
pub struct EulerIntegrator {
    dt: f64,
}

impl EulerIntegrator {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl NumIntegrator for EulerIntegrator {
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError> {
        let [u, v, w] = reader.get_velocity(t, particle);
        delta.x += u * self.dt;
        delta.y += v * self.dt;
        delta.z += w * self.dt;
        Ok(())
    }
}

// =============================================================================
// RK4, horizontal plane
// =============================================================================

/// Classical four-stage Runge-Kutta on (u, v); the vertical position is
/// untouched. For depth-averaged runs and operator-split composition.
#[derive(Clone, Copy, Debug)]
pub struct Rk4Integrator2D {
    dt: f64,
}

impl Rk4Integrator2D {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl NumIntegrator for Rk4Integrator2D {
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError> {
        let dt = self.dt;
        let t_mid = t + 0.5 * dt;
        let t_end = t + dt;

        let [u1, v1, _] = reader.get_velocity(t, particle);

        let p2 = locate_stage(t_mid, particle, 0.5 * dt * u1, 0.5 * dt * v1, None, reader)?;
        let [u2, v2, _] = reader.get_velocity(t_mid, &p2);

        let p3 = locate_stage(t_mid, particle, 0.5 * dt * u2, 0.5 * dt * v2, None, reader)?;
        let [u3, v3, _] = reader.get_velocity(t_mid, &p3);

        let p4 = locate_stage(t_end, particle, dt * u3, dt * v3, None, reader)?;
        let [u4, v4, _] = reader.get_velocity(t_end, &p4);

        delta.x += dt * (u1 + 2.0 * u2 + 2.0 * u3 + u4) / 6.0;
        delta.y += dt * (v1 + 2.0 * v2 + 2.0 * v3 + v4) / 6.0;
        Ok(())
    }
}

// =============================================================================
// RK4, three dimensions
// =============================================================================

/// Classical four-stage Runge-Kutta on (u, v, w) with intermediate host
/// lookups and vertical re-location.
#[derive(Clone, Copy, Debug)]
pub struct Rk4Integrator3D {
    dt: f64,
}

impl Rk4Integrator3D {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl NumIntegrator for Rk4Integrator3D {
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError> {
        let dt = self.dt;
        let t_mid = t + 0.5 * dt;
        let t_end = t + dt;

        let [u1, v1, w1] = reader.get_velocity(t, particle);

        let p2 = locate_stage(
            t_mid,
            particle,
            0.5 * dt * u1,
            0.5 * dt * v1,
            Some(0.5 * dt * w1),
            reader,
        )?;
        let [u2, v2, w2] = reader.get_velocity(t_mid, &p2);

        let p3 = locate_stage(
            t_mid,
            particle,
            0.5 * dt * u2,
            0.5 * dt * v2,
            Some(0.5 * dt * w2),
            reader,
        )?;
        let [u3, v3, w3] = reader.get_velocity(t_mid, &p3);

        let p4 = locate_stage(t_end, particle, dt * u3, dt * v3, Some(dt * w3), reader)?;
        let [u4, v4, w4] = reader.get_velocity(t_end, &p4);

        delta.x += dt * (u1 + 2.0 * u2 + 2.0 * u3 + u4) / 6.0;
        delta.y += dt * (v1 + 2.0 * v2 + 2.0 * v3 + v4) / 6.0;
        delta.z += dt * (w1 + 2.0 * w2 + 2.0 * w3 + w4) / 6.0;
        Ok(())
    }
}

// =============================================================================
// Operator-split: RK4 horizontal + Euler vertical
// =============================================================================

/// RK4 in the horizontal plane composed with forward Euler in the vertical.
#[derive(Clone, Copy, Debug)]
pub struct Rk4EulerSplitIntegrator {
    horizontal: Rk4Integrator2D,
    dt: f64,
}

impl Rk4EulerSplitIntegrator {
    pub fn new(dt: f64) -> Self {
        Self {
            horizontal: Rk4Integrator2D::new(dt),
            dt,
        }
    }
}

impl NumIntegrator for Rk4EulerSplitIntegrator {
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError> {
        self.horizontal.advect(t, particle, reader, delta)?;
        let [_, _, w] = reader.get_velocity(t, particle);
        delta.z += w * self.dt;
        Ok(())
    }
}

// =============================================================================
// Standard Integrator Enum (configuration-driven dispatch)
// =============================================================================

/// Enum wrapper over the built-in schemes, constructed once from
/// configuration.
#[derive(Clone, Copy, Debug)]
pub enum StandardIntegrator {
    Euler(EulerIntegrator),
    Rk4TwoD(Rk4Integrator2D),
    Rk4ThreeD(Rk4Integrator3D),
    Rk4EulerSplit(Rk4EulerSplitIntegrator),
}

impl StandardIntegrator {
    /// Build the configured scheme; `None` when advection is disabled.
    pub fn from_config(numerics: &NumericsSection, dt: f64) -> Option<Self> {
        match numerics.num_integrator {
            IntegratorScheme::None => None,
            IntegratorScheme::Euler => Some(Self::Euler(EulerIntegrator::new(dt))),
            IntegratorScheme::Rk4TwoD => Some(Self::Rk4TwoD(Rk4Integrator2D::new(dt))),
            IntegratorScheme::Rk4ThreeD => Some(Self::Rk4ThreeD(Rk4Integrator3D::new(dt))),
            IntegratorScheme::Rk4EulerSplit => {
                Some(Self::Rk4EulerSplit(Rk4EulerSplitIntegrator::new(dt)))
            }
        }
    }

    /// Human-readable scheme name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euler(_) => "euler",
            Self::Rk4TwoD(_) => "rk4_2d",
            Self::Rk4ThreeD(_) => "rk4_3d",
            Self::Rk4EulerSplit(_) => "rk4_euler_split",
        }
    }
}

impl NumIntegrator for StandardIntegrator {
    fn advect(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        delta: &mut Delta,
    ) -> Result<(), AdvectionError> {
        match self {
            Self::Euler(s) => s.advect(t, particle, reader, delta),
            Self::Rk4TwoD(s) => s.advect(t, particle, reader, delta),
            Self::Rk4ThreeD(s) => s.advect(t, particle, reader, delta),
            Self::Rk4EulerSplit(s) => s.advect(t, particle, reader, delta),
        }
    }
}

//! Stochastic sub-grid displacement models.
//!
//! Horizontal models sample the eddy viscosity A_h; vertical models sample
//! the eddy diffusivity K_h. The Visser vertical scheme adds the drift
//! term K_h′·dt and evaluates K_h at the drift-corrected offset
//! z + ½·K_h′·dt, which preserves the well-mixed condition in spatially
//! varying diffusivity. Gaussian deviates come from an explicit,
//! deterministically seeded generator threaded in by the orchestrator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::boundary::reflect_into_range;
use crate::config::{
    HorizontalRandomWalkScheme, NumericsSection, VerticalRandomWalkScheme,
};
use crate::integrator::Delta;
use crate::particle::Particle;
use crate::reader::{DataReader, ReaderError};

/// The crate's random number generator.
///
/// A counter-based generator with cheap, independent streams: each particle
/// draws from its own stream derived from the master seed, which makes
/// trajectories reproducible and independent of particle ordering and of
/// the worker-thread partition.
pub type ModelRng = ChaCha8Rng;

/// Horizontal stochastic displacement contract.
pub trait HorizontalRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError>;
}

/// Vertical stochastic displacement contract.
pub trait VerticalRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError>;
}

// =============================================================================
// Horizontal models
// =============================================================================

/// Diffusion-only horizontal walk: Δx = √(2·A_h·dt)·ξ per axis.
#[derive(Clone, Copy, Debug)]
pub struct NaiveHorizRandomWalk {
    dt: f64,
}

impl NaiveHorizRandomWalk {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl HorizontalRandomWalk for NaiveHorizRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        let ah = reader.get_horizontal_eddy_viscosity(t, particle);
        let amplitude = (2.0 * ah * self.dt).sqrt();
        let xi_x: f64 = rng.sample(StandardNormal);
        let xi_y: f64 = rng.sample(StandardNormal);
        delta.x += amplitude * xi_x;
        delta.y += amplitude * xi_y;
        Ok(())
    }
}

/// Drift-corrected horizontal walk:
/// Δx = (∂A_h/∂x)·dt + √(2·A_h·dt)·ξ, and the same along y.
#[derive(Clone, Copy, Debug)]
pub struct VisserHorizRandomWalk {
    dt: f64,
}

impl VisserHorizRandomWalk {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl HorizontalRandomWalk for VisserHorizRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        let ah = reader.get_horizontal_eddy_viscosity(t, particle);
        let (dah_dx, dah_dy) = reader.get_horizontal_eddy_viscosity_derivative(t, particle);
        let amplitude = (2.0 * ah * self.dt).sqrt();
        let xi_x: f64 = rng.sample(StandardNormal);
        let xi_y: f64 = rng.sample(StandardNormal);
        delta.x += dah_dx * self.dt + amplitude * xi_x;
        delta.y += dah_dy * self.dt + amplitude * xi_y;
        Ok(())
    }
}

// =============================================================================
// Vertical models
// =============================================================================

/// Diffusion-only vertical walk: Δz = √(2·K_h·dt)·ξ.
#[derive(Clone, Copy, Debug)]
pub struct NaiveVertRandomWalk {
    dt: f64,
}

impl NaiveVertRandomWalk {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl VerticalRandomWalk for NaiveVertRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        let kh = reader.get_vertical_eddy_diffusivity(t, particle);
        let xi: f64 = rng.sample(StandardNormal);
        delta.z += (2.0 * kh * self.dt).sqrt() * xi;
        Ok(())
    }
}

/// Visser's drift-corrected vertical walk:
/// Δz = K_h′(z)·dt + √(2·K_h(z + ½·K_h′·dt)·dt)·ξ.
///
/// K_h MUST be sampled at the half-drift offset; evaluating it at z breaks
/// the well-mixed condition. The offset probe is reflected back inside the
/// water column before sampling.
#[derive(Clone, Copy, Debug)]
pub struct VisserVertRandomWalk {
    dt: f64,
}

impl VisserVertRandomWalk {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl VerticalRandomWalk for VisserVertRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        let dkh_dz = reader.get_vertical_eddy_diffusivity_derivative(t, particle);

        let mut probe = particle.clone();
        probe.x3 = particle.x3 + 0.5 * dkh_dz * self.dt;
        let zmin = reader.get_zmin(t, &probe);
        let zmax = reader.get_zmax(t, &probe);
        probe.x3 = reflect_into_range(probe.x3, zmin, zmax);
        reader.set_vertical_grid_vars(t, &mut probe)?;
        let kh = reader.get_vertical_eddy_diffusivity(t, &probe);

        let xi: f64 = rng.sample(StandardNormal);
        delta.z += dkh_dz * self.dt + (2.0 * kh * self.dt).sqrt() * xi;
        Ok(())
    }
}

/// Milstein scheme for the vertical diffusion SDE:
/// Δz = √(2·K_h·dt)·ξ + ½·K_h′·dt·(ξ² + 1).
#[derive(Clone, Copy, Debug)]
pub struct MilsteinVertRandomWalk {
    dt: f64,
}

impl MilsteinVertRandomWalk {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl VerticalRandomWalk for MilsteinVertRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        let kh = reader.get_vertical_eddy_diffusivity(t, particle);
        let dkh_dz = reader.get_vertical_eddy_diffusivity_derivative(t, particle);
        let xi: f64 = rng.sample(StandardNormal);
        delta.z += (2.0 * kh * self.dt).sqrt() * xi + 0.5 * dkh_dz * self.dt * (xi * xi + 1.0);
        Ok(())
    }
}

// =============================================================================
// Configuration-driven dispatch
// =============================================================================

/// Horizontal model selected from configuration.
#[derive(Clone, Copy, Debug)]
pub enum StandardHorizRandomWalk {
    Naive(NaiveHorizRandomWalk),
    Visser(VisserHorizRandomWalk),
}

impl StandardHorizRandomWalk {
    /// Build the configured model; `None` when disabled.
    pub fn from_config(numerics: &NumericsSection, dt: f64) -> Option<Self> {
        match numerics.horizontal_random_walk_model {
            HorizontalRandomWalkScheme::None => None,
            HorizontalRandomWalkScheme::Naive => {
                Some(Self::Naive(NaiveHorizRandomWalk::new(dt)))
            }
            HorizontalRandomWalkScheme::Visser => {
                Some(Self::Visser(VisserHorizRandomWalk::new(dt)))
            }
        }
    }
}

impl HorizontalRandomWalk for StandardHorizRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        match self {
            Self::Naive(m) => m.random_walk(t, particle, reader, rng, delta),
            Self::Visser(m) => m.random_walk(t, particle, reader, rng, delta),
        }
    }
}

/// Vertical model selected from configuration.
#[derive(Clone, Copy, Debug)]
pub enum StandardVertRandomWalk {
    Naive(NaiveVertRandomWalk),
    Visser(VisserVertRandomWalk),
    Milstein(MilsteinVertRandomWalk),
}

impl StandardVertRandomWalk {
    /// Build the configured model; `None` when disabled.
    pub fn from_config(numerics: &NumericsSection, dt: f64) -> Option<Self> {
        match numerics.vertical_random_walk_model {
            VerticalRandomWalkScheme::None => None,
            VerticalRandomWalkScheme::Naive => Some(Self::Naive(NaiveVertRandomWalk::new(dt))),
            VerticalRandomWalkScheme::Visser => {
                Some(Self::Visser(VisserVertRandomWalk::new(dt)))
            }
            VerticalRandomWalkScheme::Milstein => {
                Some(Self::Milstein(MilsteinVertRandomWalk::new(dt)))
            }
        }
    }
}

impl VerticalRandomWalk for StandardVertRandomWalk {
    fn random_walk(
        &self,
        t: f64,
        particle: &Particle,
        reader: &dyn DataReader,
        rng: &mut ModelRng,
        delta: &mut Delta,
    ) -> Result<(), ReaderError> {
        match self {
            Self::Naive(m) => m.random_walk(t, particle, reader, rng, delta),
            Self::Visser(m) => m.random_walk(t, particle, reader, rng, delta),
            Self::Milstein(m) => m.random_walk(t, particle, reader, rng, delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::analytic::{LinearKhReader, UniformFlowReader};
    use rand::SeedableRng;

    fn rng(seed: u64) -> ModelRng {
        ModelRng::seed_from_u64(seed)
    }

    #[test]
    fn test_zero_diffusivity_gives_zero_displacement() {
        let reader = UniformFlowReader::new(0.0, 0.0, 0.0);
        let p = Particle::new(0, 0, 0.0, 0.0, -10.0);
        let mut r = rng(1);
        let mut delta = Delta::default();

        NaiveHorizRandomWalk::new(10.0)
            .random_walk(0.0, &p, &reader, &mut r, &mut delta)
            .unwrap();
        NaiveVertRandomWalk::new(10.0)
            .random_walk(0.0, &p, &reader, &mut r, &mut delta)
            .unwrap();
        assert_eq!(delta, Delta::default());
    }

    #[test]
    fn test_same_seed_reproduces_displacement() {
        let reader = LinearKhReader::constant(0.01, -100.0, 0.0);
        let p = Particle::new(0, 0, 0.0, 0.0, -50.0);
        let model = VisserVertRandomWalk::new(10.0);

        let mut d1 = Delta::default();
        let mut d2 = Delta::default();
        model
            .random_walk(0.0, &p, &reader, &mut rng(42), &mut d1)
            .unwrap();
        model
            .random_walk(0.0, &p, &reader, &mut rng(42), &mut d2)
            .unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_naive_vertical_variance() {
        // Var[Δz] = 2·K_h·dt.
        let kh = 0.01;
        let dt = 10.0;
        let reader = LinearKhReader::constant(kh, -100.0, 0.0);
        let p = Particle::new(0, 0, 0.0, 0.0, -50.0);
        let model = NaiveVertRandomWalk::new(dt);
        let mut r = rng(7);

        let n = 20_000;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let mut delta = Delta::default();
            model
                .random_walk(0.0, &p, &reader, &mut r, &mut delta)
                .unwrap();
            sum_sq += delta.z * delta.z;
        }
        let variance = sum_sq / n as f64;
        let expected = 2.0 * kh * dt;
        assert!(
            (variance - expected).abs() < 0.05 * expected,
            "variance {} vs expected {}",
            variance,
            expected
        );
    }

    #[test]
    fn test_visser_drift_matches_gradient() {
        // With K_h linear in z the ensemble-mean displacement is K_h′·dt.
        let slope = 0.05;
        let dt = 1.0;
        let reader = LinearKhReader::new(0.01, slope, -100.0, 0.0);
        // Near the floor K_h is small, so the drift dominates the noise in
        // the ensemble mean.
        let p = Particle::new(0, 0, 0.0, 0.0, -99.0);
        let model = VisserVertRandomWalk::new(dt);
        let mut r = rng(11);

        let n = 200_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let mut delta = Delta::default();
            model
                .random_walk(0.0, &p, &reader, &mut r, &mut delta)
                .unwrap();
            sum += delta.z;
        }
        let mean = sum / n as f64;
        let expected = slope * dt;
        assert!(
            (mean - expected).abs() < 0.1 * expected,
            "mean {} vs expected {}",
            mean,
            expected
        );
    }

    #[test]
    fn test_milstein_drift_matches_gradient() {
        // E[Δz] = ½·K_h′·dt·(E[ξ²] + 1) = K_h′·dt.
        let slope = 0.05;
        let dt = 1.0;
        let reader = LinearKhReader::new(0.01, slope, -100.0, 0.0);
        let p = Particle::new(0, 0, 0.0, 0.0, -99.0);
        let model = MilsteinVertRandomWalk::new(dt);
        let mut r = rng(13);

        let n = 200_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let mut delta = Delta::default();
            model
                .random_walk(0.0, &p, &reader, &mut r, &mut delta)
                .unwrap();
            sum += delta.z;
        }
        let mean = sum / n as f64;
        let expected = slope * dt;
        assert!(
            (mean - expected).abs() < 0.1 * expected,
            "mean {} vs expected {}",
            mean,
            expected
        );
    }

    #[test]
    fn test_from_config_none_disables() {
        let numerics = NumericsSection::default();
        assert!(StandardHorizRandomWalk::from_config(&numerics, 10.0).is_none());
        assert!(StandardVertRandomWalk::from_config(&numerics, 10.0).is_none());
    }
}

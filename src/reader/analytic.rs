//! Analytic data readers for verification.
//!
//! These serve closed-form fields over an unbounded horizontal domain so
//! integrator and random-walk behaviour can be checked against exact
//! solutions, independent of any grid.

use super::{DataReader, ReaderError};
use crate::grid::{EdgeIntersection, GridError};
use crate::particle::Particle;
use crate::types::HostStatus;

/// Spatially uniform, steady velocity field.
#[derive(Clone, Copy, Debug)]
pub struct UniformFlowReader {
    pub u: f64,
    pub v: f64,
    pub w: f64,
    pub zmin: f64,
    pub zmax: f64,
}

impl UniformFlowReader {
    pub fn new(u: f64, v: f64, w: f64) -> Self {
        Self {
            u,
            v,
            w,
            zmin: -4000.0,
            zmax: 0.0,
        }
    }
}

impl DataReader for UniformFlowReader {
    fn find_host(&self, _old: &Particle, particle_new: &mut Particle) -> HostStatus {
        particle_new.host_horizontal_elem = 0;
        HostStatus::InDomain
    }

    fn set_local_coordinates(&self, _particle: &mut Particle) {}

    fn set_vertical_grid_vars(&self, _t: f64, _particle: &mut Particle) -> Result<(), ReaderError> {
        Ok(())
    }

    fn get_zmin(&self, _t: f64, _particle: &Particle) -> f64 {
        self.zmin
    }

    fn get_zmax(&self, _t: f64, _particle: &Particle) -> f64 {
        self.zmax
    }

    fn get_velocity(&self, _t: f64, _particle: &Particle) -> [f64; 3] {
        [self.u, self.v, self.w]
    }

    fn get_horizontal_eddy_viscosity(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_horizontal_eddy_viscosity_derivative(
        &self,
        _t: f64,
        _particle: &Particle,
    ) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn get_vertical_eddy_diffusivity(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_vertical_eddy_diffusivity_derivative(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError> {
        Err(GridError::NoBoundaryIntersection {
            elem: 0,
            x_old: particle_old.x1,
            y_old: particle_old.x2,
            x_new: particle_new.x1,
            y_new: particle_new.x2,
        })
    }

    fn set_default_location(&self, _particle: &mut Particle) {}
}

/// Solid-body rotation about the origin: u = −Ω y, v = Ω x.
///
/// Trajectories are circles; [`Self::position_analytic`] gives the exact
/// particle position, which integrator tests compare against.
#[derive(Clone, Copy, Debug)]
pub struct RotatingFlowReader {
    pub omega: f64,
}

impl RotatingFlowReader {
    pub fn new(omega: f64) -> Self {
        Self { omega }
    }

    /// Exact position at time `t` of a particle released at `(x0, y0)` at
    /// t = 0.
    pub fn position_analytic(&self, x0: f64, y0: f64, t: f64) -> (f64, f64) {
        let (sin, cos) = (self.omega * t).sin_cos();
        (x0 * cos - y0 * sin, x0 * sin + y0 * cos)
    }
}

impl DataReader for RotatingFlowReader {
    fn find_host(&self, _old: &Particle, particle_new: &mut Particle) -> HostStatus {
        particle_new.host_horizontal_elem = 0;
        HostStatus::InDomain
    }

    fn set_local_coordinates(&self, _particle: &mut Particle) {}

    fn set_vertical_grid_vars(&self, _t: f64, _particle: &mut Particle) -> Result<(), ReaderError> {
        Ok(())
    }

    fn get_zmin(&self, _t: f64, _particle: &Particle) -> f64 {
        -4000.0
    }

    fn get_zmax(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_velocity(&self, _t: f64, particle: &Particle) -> [f64; 3] {
        [
            -self.omega * particle.x2,
            self.omega * particle.x1,
            0.0,
        ]
    }

    fn get_horizontal_eddy_viscosity(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_horizontal_eddy_viscosity_derivative(
        &self,
        _t: f64,
        _particle: &Particle,
    ) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn get_vertical_eddy_diffusivity(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_vertical_eddy_diffusivity_derivative(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError> {
        Err(GridError::NoBoundaryIntersection {
            elem: 0,
            x_old: particle_old.x1,
            y_old: particle_old.x2,
            x_new: particle_new.x1,
            y_new: particle_new.x2,
        })
    }

    fn set_default_location(&self, _particle: &mut Particle) {}
}

/// Water column with a linear vertical diffusivity profile:
/// K_h(z) = kh0 + slope × (z − zmin). Horizontal motion is unforced.
#[derive(Clone, Copy, Debug)]
pub struct LinearKhReader {
    pub kh0: f64,
    pub slope: f64,
    pub zmin: f64,
    pub zmax: f64,
}

impl LinearKhReader {
    pub fn new(kh0: f64, slope: f64, zmin: f64, zmax: f64) -> Self {
        Self {
            kh0,
            slope,
            zmin,
            zmax,
        }
    }

    /// Constant-diffusivity column.
    pub fn constant(kh: f64, zmin: f64, zmax: f64) -> Self {
        Self::new(kh, 0.0, zmin, zmax)
    }
}

impl DataReader for LinearKhReader {
    fn find_host(&self, _old: &Particle, particle_new: &mut Particle) -> HostStatus {
        particle_new.host_horizontal_elem = 0;
        HostStatus::InDomain
    }

    fn set_local_coordinates(&self, _particle: &mut Particle) {}

    fn set_vertical_grid_vars(&self, _t: f64, _particle: &mut Particle) -> Result<(), ReaderError> {
        Ok(())
    }

    fn get_zmin(&self, _t: f64, _particle: &Particle) -> f64 {
        self.zmin
    }

    fn get_zmax(&self, _t: f64, _particle: &Particle) -> f64 {
        self.zmax
    }

    fn get_velocity(&self, _t: f64, _particle: &Particle) -> [f64; 3] {
        [0.0, 0.0, 0.0]
    }

    fn get_horizontal_eddy_viscosity(&self, _t: f64, _particle: &Particle) -> f64 {
        0.0
    }

    fn get_horizontal_eddy_viscosity_derivative(
        &self,
        _t: f64,
        _particle: &Particle,
    ) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn get_vertical_eddy_diffusivity(&self, _t: f64, particle: &Particle) -> f64 {
        self.kh0 + self.slope * (particle.x3 - self.zmin)
    }

    fn get_vertical_eddy_diffusivity_derivative(&self, _t: f64, _particle: &Particle) -> f64 {
        self.slope
    }

    fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError> {
        Err(GridError::NoBoundaryIntersection {
            elem: 0,
            x_old: particle_old.x1,
            y_old: particle_old.x2,
            x_new: particle_new.x1,
            y_new: particle_new.x2,
        })
    }

    fn set_default_location(&self, _particle: &mut Particle) {}
}

//! Field access at particle positions.
//!
//! The data reader owns a reference frame pair ("last"/"next") served by an
//! external [`Mediator`] and answers all field queries the integrators,
//! random-walk models and boundary calculators make: velocity, eddy
//! diffusivities and their derivatives, bathymetry, free-surface elevation,
//! and the particle's vertical placement within the sigma discretisation.
//!
//! Interpolation is linear in time between the bracket frames, barycentric
//! in the horizontal plane for nodal fields, Shepard (inverse-distance²)
//! for cell-centred velocities, and linear in sigma in the vertical.

pub mod analytic;
pub mod mediator;

pub use mediator::{FieldFrame, InMemoryMediator, Mediator, MediatorError};

use thiserror::Error;

use crate::grid::{EdgeIntersection, GridError, UnstructuredGrid};
use crate::interp::{
    cartesian_to_sigma, interpolate_within_element, linear_fraction, linear_fraction_safe,
    linear_interp, shepard_interpolation, sigma_to_cartesian,
};
use crate::particle::Particle;
use crate::types::{HostStatus, TimeDirection};

/// Slack applied when testing sigma against the outermost levels; the
/// vertical boundary conditions keep z within [zmin, zmax], so anything
/// beyond this is an input inconsistency.
const SIGMA_TOL: f64 = 1.0e-9;

/// Error type for data-reader operations.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Propagated unchanged from the external frame provider.
    #[error(transparent)]
    Mediator(#[from] MediatorError),

    /// The particle's sigma coordinate is bracketed by no layer.
    #[error("no sigma bracket for particle {id}: z = {z}, sigma = {sigma}")]
    NoSigmaBracket { id: i32, z: f64, sigma: f64 },

    /// An environmental variable is missing from the loaded frames.
    #[error("unknown environmental variable: {0}")]
    UnknownVariable(String),
}

/// Field access interface consumed by integrators, random-walk models and
/// boundary-condition calculators.
///
/// [`MeshDataReader`] is the production implementation; the
/// [`analytic`] readers provide closed-form fields for verification.
pub trait DataReader {
    /// Classify a proposed move and update the new particle's host.
    fn find_host(&self, particle_old: &Particle, particle_new: &mut Particle) -> HostStatus;

    /// Recompute barycentric coordinates from the particle's position.
    fn set_local_coordinates(&self, particle: &mut Particle);

    /// Locate the particle within the vertical discretisation: host layer,
    /// bounding layers, and the interpolation fractions.
    fn set_vertical_grid_vars(&self, t: f64, particle: &mut Particle) -> Result<(), ReaderError>;

    /// Sea-floor elevation −h(x, y) at the particle (negative).
    fn get_zmin(&self, t: f64, particle: &Particle) -> f64;

    /// Free-surface elevation ζ(t, x, y) at the particle.
    fn get_zmax(&self, t: f64, particle: &Particle) -> f64;

    /// Velocity (u, v, w) at the particle.
    fn get_velocity(&self, t: f64, particle: &Particle) -> [f64; 3];

    /// Horizontal eddy viscosity A_h at the particle.
    fn get_horizontal_eddy_viscosity(&self, t: f64, particle: &Particle) -> f64;

    /// Horizontal gradient (∂A_h/∂x, ∂A_h/∂y) at the particle.
    fn get_horizontal_eddy_viscosity_derivative(&self, t: f64, particle: &Particle)
        -> (f64, f64);

    /// Vertical eddy diffusivity K_h at the particle.
    fn get_vertical_eddy_diffusivity(&self, t: f64, particle: &Particle) -> f64;

    /// Vertical gradient ∂K_h/∂z at the particle.
    fn get_vertical_eddy_diffusivity_derivative(&self, t: f64, particle: &Particle) -> f64;

    /// Endpoints of the boundary edge crossed by the move old→new, and the
    /// intersection point.
    fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError>;

    /// Snap the particle onto its host element's centroid.
    fn set_default_location(&self, particle: &mut Particle);

    /// Whether the particle's host element is wet. Conservative: dry in
    /// either bracket frame counts as dry. A flag only; it does not by
    /// itself arrest motion.
    fn is_wet(&self, _t: f64, _particle: &Particle) -> bool {
        true
    }

    /// Generic interpolator for nodal sigma-layer tracer fields.
    fn get_environmental_variable(
        &self,
        name: &str,
        _t: f64,
        _particle: &Particle,
    ) -> Result<f64, ReaderError> {
        Err(ReaderError::UnknownVariable(name.to_string()))
    }
}

/// Data reader over an unstructured grid and a mediator-backed frame pair.
pub struct MeshDataReader<M: Mediator> {
    grid: UnstructuredGrid,
    mediator: M,
    t_last: f64,
    t_next: f64,
    has_kh: bool,
    has_ah: bool,
    has_is_wet: bool,
}

impl<M: Mediator> MeshDataReader<M> {
    /// Create a reader. The `has_*` switches mirror the circulation-model
    /// capability flags: a disabled field reads as zero (diffusivities) or
    /// always-wet.
    pub fn new(grid: UnstructuredGrid, mediator: M, has_kh: bool, has_ah: bool, has_is_wet: bool) -> Self {
        Self {
            grid,
            mediator,
            t_last: f64::NAN,
            t_next: f64::NAN,
            has_kh,
            has_ah,
            has_is_wet,
        }
    }

    /// The underlying grid.
    #[inline]
    pub fn grid(&self) -> &UnstructuredGrid {
        &self.grid
    }

    /// Direction implied by the current bracket ordering.
    #[inline]
    pub fn time_direction(&self) -> TimeDirection {
        if self.t_next >= self.t_last {
            TimeDirection::Forward
        } else {
            TimeDirection::Backward
        }
    }

    /// Prepare the mediator for the run's time span and load the first
    /// bracket.
    pub fn setup_data_access(&mut self, t_start: f64, t_end: f64) -> Result<(), ReaderError> {
        self.mediator.setup_data_access(t_start, t_end)?;
        self.t_last = self.mediator.t_last();
        self.t_next = self.mediator.t_next();
        Ok(())
    }

    /// Ensure the bracket frames cover `t`, advancing through the mediator
    /// when the interpolation fraction falls outside [0, 1). This is the
    /// engine's only suspension point and is called outside the
    /// per-particle loop.
    pub fn read_data(&mut self, t: f64) -> Result<(), ReaderError> {
        let tau = linear_fraction(t, self.t_last, self.t_next);
        if !(0.0..1.0).contains(&tau) {
            self.mediator.update_reading_frames(t)?;
            self.t_last = self.mediator.t_last();
            self.t_next = self.mediator.t_next();
        }
        Ok(())
    }

    /// Place a seed particle with no prior host via global search.
    /// Returns false when the position lies outside the domain.
    pub fn find_host_using_global_search(&self, particle: &mut Particle) -> bool {
        match self
            .grid
            .find_host_using_global_search(particle.x1, particle.x2)
        {
            Some(elem) => {
                particle.host_horizontal_elem = elem as i32;
                self.grid.set_local_coordinates(particle);
                true
            }
            None => {
                particle.host_horizontal_elem = -1;
                false
            }
        }
    }

    // =========================================================================
    // Interpolation internals
    // =========================================================================

    /// Clamped time-interpolation fraction for the current bracket.
    #[inline]
    fn fraction(&self, t: f64) -> f64 {
        linear_fraction_safe(t, self.t_last, self.t_next)
    }

    /// Time + barycentric interpolation of one row of a `(n_k, n_nodes)`
    /// field pair.
    fn time_space_value(
        &self,
        last: &[f64],
        next: &[f64],
        tau: f64,
        k: usize,
        elem: usize,
        phi: &[f64; 3],
    ) -> f64 {
        let l = self.grid.nodal_values(last, k, elem);
        let n = self.grid.nodal_values(next, k, elem);
        let vals = [
            linear_interp(tau, l[0], n[0]),
            linear_interp(tau, l[1], n[1]),
            linear_interp(tau, l[2], n[2]),
        ];
        interpolate_within_element(&vals, phi)
    }

    /// Sigma at level interface `k`, interpolated to the particle's phi.
    fn sigma_level(&self, k: usize, elem: usize, phi: &[f64; 3]) -> f64 {
        let vals = [
            self.grid.siglev_at(k, self.grid.element_nodes(elem)[0]),
            self.grid.siglev_at(k, self.grid.element_nodes(elem)[1]),
            self.grid.siglev_at(k, self.grid.element_nodes(elem)[2]),
        ];
        interpolate_within_element(&vals, phi)
    }

    /// Sigma at layer midpoint `k`, interpolated to the particle's phi.
    fn sigma_layer(&self, k: usize, elem: usize, phi: &[f64; 3]) -> f64 {
        let vals = [
            self.grid.siglay_at(k, self.grid.element_nodes(elem)[0]),
            self.grid.siglay_at(k, self.grid.element_nodes(elem)[1]),
            self.grid.siglay_at(k, self.grid.element_nodes(elem)[2]),
        ];
        interpolate_within_element(&vals, phi)
    }

    /// Bathymetry (positive depth) at the particle.
    fn bathymetry(&self, elem: usize, phi: &[f64; 3]) -> f64 {
        interpolate_within_element(&self.grid.bathymetry_values(elem), phi)
    }

    /// Free-surface elevation at the particle.
    fn zeta(&self, tau: f64, elem: usize, phi: &[f64; 3]) -> f64 {
        let last = self.grid.surface_values(&self.mediator.frame_last().zeta, elem);
        let next = self.grid.surface_values(&self.mediator.frame_next().zeta, elem);
        let vals = [
            linear_interp(tau, last[0], next[0]),
            linear_interp(tau, last[1], next[1]),
            linear_interp(tau, last[2], next[2]),
        ];
        interpolate_within_element(&vals, phi)
    }

    /// Shepard-interpolated velocity on one sigma layer, from the host
    /// centre and its valid neighbours.
    fn layer_velocity(&self, tau: f64, k: usize, elem: usize, x: f64, y: f64) -> [f64; 3] {
        let n_elems = self.grid.n_elems();
        let row = k * n_elems;
        let last = self.mediator.frame_last();
        let next = self.mediator.frame_next();

        let mut xs = [0.0; 4];
        let mut ys = [0.0; 4];
        let mut us = [0.0; 4];
        let mut vs = [0.0; 4];
        let mut ws = [0.0; 4];
        let mut n = 0;

        let mut push = |e: usize| {
            let (cx, cy) = self.grid.element_centre(e);
            xs[n] = cx;
            ys[n] = cy;
            us[n] = linear_interp(tau, last.u[row + e], next.u[row + e]);
            vs[n] = linear_interp(tau, last.v[row + e], next.v[row + e]);
            ws[n] = linear_interp(tau, last.w[row + e], next.w[row + e]);
            n += 1;
        };

        push(elem);
        for &neighbour in &self.grid.element_neighbours(elem) {
            if neighbour >= 0 {
                push(neighbour as usize);
            }
        }

        [
            shepard_interpolation(x, y, &xs[..n], &ys[..n], &us[..n]),
            shepard_interpolation(x, y, &xs[..n], &ys[..n], &vs[..n]),
            shepard_interpolation(x, y, &xs[..n], &ys[..n], &ws[..n]),
        ]
    }

    /// Interpolate a nodal sigma-layer field pair to the particle,
    /// blending the bounding layers (or collapsing to the boundary layer).
    fn layer_field_value(&self, last: &[f64], next: &[f64], tau: f64, particle: &Particle) -> f64 {
        let elem = particle.host_horizontal_elem as usize;
        if particle.in_vertical_boundary_layer {
            return self.time_space_value(last, next, tau, particle.k_layer as usize, elem, &particle.phi);
        }
        let lower = self.time_space_value(
            last,
            next,
            tau,
            particle.k_lower_layer as usize,
            elem,
            &particle.phi,
        );
        let upper = self.time_space_value(
            last,
            next,
            tau,
            particle.k_upper_layer as usize,
            elem,
            &particle.phi,
        );
        linear_interp(particle.omega_layers, lower, upper)
    }

    /// In-plane gradient of a nodal sigma-layer field pair at the particle.
    fn layer_field_gradient(
        &self,
        last: &[f64],
        next: &[f64],
        tau: f64,
        particle: &Particle,
    ) -> (f64, f64) {
        let elem = particle.host_horizontal_elem as usize;
        let (dphi_dx, dphi_dy) = self.grid.grad_phi(elem);

        let gradient_on_layer = |k: usize| -> (f64, f64) {
            let l = self.grid.nodal_values(last, k, elem);
            let n = self.grid.nodal_values(next, k, elem);
            let mut gx = 0.0;
            let mut gy = 0.0;
            for i in 0..3 {
                let v = linear_interp(tau, l[i], n[i]);
                gx += v * dphi_dx[i];
                gy += v * dphi_dy[i];
            }
            (gx, gy)
        };

        if particle.in_vertical_boundary_layer {
            return gradient_on_layer(particle.k_layer as usize);
        }
        let (lx, ly) = gradient_on_layer(particle.k_lower_layer as usize);
        let (ux, uy) = gradient_on_layer(particle.k_upper_layer as usize);
        (
            linear_interp(particle.omega_layers, lx, ux),
            linear_interp(particle.omega_layers, ly, uy),
        )
    }
}

impl<M: Mediator> DataReader for MeshDataReader<M> {
    fn find_host(&self, particle_old: &Particle, particle_new: &mut Particle) -> HostStatus {
        // Local walk first: O(1) in the steady case with correct neighbour
        // information. An apparent exit is re-examined by tracing the
        // pathline, which distinguishes true boundary crossings from walk
        // failures through concave neighbourhoods.
        let first_guess = particle_old.host_horizontal_elem.max(0) as usize;
        let flag = self
            .grid
            .find_host_using_barycentric_walk(particle_new, first_guess);
        if flag == HostStatus::InDomain {
            return flag;
        }
        self.grid
            .find_host_using_particle_tracing(particle_old, particle_new)
    }

    fn set_local_coordinates(&self, particle: &mut Particle) {
        self.grid.set_local_coordinates(particle);
    }

    fn set_vertical_grid_vars(&self, t: f64, particle: &mut Particle) -> Result<(), ReaderError> {
        let elem = particle.host_horizontal_elem as usize;
        let tau = self.fraction(t);
        let h = self.bathymetry(elem, &particle.phi);
        let zeta = self.zeta(tau, elem, &particle.phi);
        let mut sigma = cartesian_to_sigma(particle.x3, h, zeta);

        let n_siglay = self.grid.n_siglay();
        let sigma_top = self.sigma_level(0, elem, &particle.phi);
        let sigma_bottom = self.sigma_level(n_siglay, elem, &particle.phi);
        if sigma > sigma_top + SIGMA_TOL || sigma < sigma_bottom - SIGMA_TOL {
            return Err(ReaderError::NoSigmaBracket {
                id: particle.id,
                z: particle.x3,
                sigma,
            });
        }
        sigma = sigma.clamp(sigma_bottom, sigma_top);

        // Find the layer whose bounding levels bracket sigma.
        let mut k_host = None;
        for k in 0..n_siglay {
            let upper = self.sigma_level(k, elem, &particle.phi);
            let lower = self.sigma_level(k + 1, elem, &particle.phi);
            if sigma <= upper && sigma >= lower {
                particle.k_layer = k as i32;
                particle.omega_interfaces = linear_fraction_safe(sigma, lower, upper);
                k_host = Some(k);
                break;
            }
        }
        let k = k_host.ok_or(ReaderError::NoSigmaBracket {
            id: particle.id,
            z: particle.x3,
            sigma,
        })?;

        // Position relative to the layer midpoints.
        let mid = self.sigma_layer(k, elem, &particle.phi);
        if (k == 0 && sigma >= mid) || (k == n_siglay - 1 && sigma <= mid) {
            particle.in_vertical_boundary_layer = true;
            particle.k_lower_layer = -1;
            particle.k_upper_layer = -1;
            particle.omega_layers = 0.0;
        } else if sigma >= mid {
            let upper_mid = self.sigma_layer(k - 1, elem, &particle.phi);
            particle.in_vertical_boundary_layer = false;
            particle.k_upper_layer = k as i32 - 1;
            particle.k_lower_layer = k as i32;
            particle.omega_layers = linear_fraction_safe(sigma, mid, upper_mid);
        } else {
            let lower_mid = self.sigma_layer(k + 1, elem, &particle.phi);
            particle.in_vertical_boundary_layer = false;
            particle.k_upper_layer = k as i32;
            particle.k_lower_layer = k as i32 + 1;
            particle.omega_layers = linear_fraction_safe(sigma, lower_mid, mid);
        }
        Ok(())
    }

    fn get_zmin(&self, _t: f64, particle: &Particle) -> f64 {
        let elem = particle.host_horizontal_elem as usize;
        -self.bathymetry(elem, &particle.phi)
    }

    fn get_zmax(&self, t: f64, particle: &Particle) -> f64 {
        let elem = particle.host_horizontal_elem as usize;
        self.zeta(self.fraction(t), elem, &particle.phi)
    }

    fn get_velocity(&self, t: f64, particle: &Particle) -> [f64; 3] {
        let elem = particle.host_horizontal_elem as usize;
        let tau = self.fraction(t);
        if particle.in_vertical_boundary_layer {
            return self.layer_velocity(tau, particle.k_layer as usize, elem, particle.x1, particle.x2);
        }
        let lower = self.layer_velocity(
            tau,
            particle.k_lower_layer as usize,
            elem,
            particle.x1,
            particle.x2,
        );
        let upper = self.layer_velocity(
            tau,
            particle.k_upper_layer as usize,
            elem,
            particle.x1,
            particle.x2,
        );
        [
            linear_interp(particle.omega_layers, lower[0], upper[0]),
            linear_interp(particle.omega_layers, lower[1], upper[1]),
            linear_interp(particle.omega_layers, lower[2], upper[2]),
        ]
    }

    fn get_horizontal_eddy_viscosity(&self, t: f64, particle: &Particle) -> f64 {
        if !self.has_ah {
            return 0.0;
        }
        let tau = self.fraction(t);
        self.layer_field_value(
            &self.mediator.frame_last().viscofh,
            &self.mediator.frame_next().viscofh,
            tau,
            particle,
        )
    }

    fn get_horizontal_eddy_viscosity_derivative(
        &self,
        t: f64,
        particle: &Particle,
    ) -> (f64, f64) {
        if !self.has_ah {
            return (0.0, 0.0);
        }
        let tau = self.fraction(t);
        self.layer_field_gradient(
            &self.mediator.frame_last().viscofh,
            &self.mediator.frame_next().viscofh,
            tau,
            particle,
        )
    }

    fn get_vertical_eddy_diffusivity(&self, t: f64, particle: &Particle) -> f64 {
        if !self.has_kh {
            return 0.0;
        }
        let elem = particle.host_horizontal_elem as usize;
        let tau = self.fraction(t);
        let k = particle.k_layer as usize;
        let last = &self.mediator.frame_last().kh;
        let next = &self.mediator.frame_next().kh;
        let upper = self.time_space_value(last, next, tau, k, elem, &particle.phi);
        let lower = self.time_space_value(last, next, tau, k + 1, elem, &particle.phi);
        linear_interp(particle.omega_interfaces, lower, upper)
    }

    fn get_vertical_eddy_diffusivity_derivative(&self, t: f64, particle: &Particle) -> f64 {
        if !self.has_kh {
            return 0.0;
        }
        let elem = particle.host_horizontal_elem as usize;
        let tau = self.fraction(t);
        let phi = &particle.phi;
        let h = self.bathymetry(elem, phi);
        let zeta = self.zeta(tau, elem, phi);
        let last = &self.mediator.frame_last().kh;
        let next = &self.mediator.frame_next().kh;

        let kh_at = |lev: usize| self.time_space_value(last, next, tau, lev, elem, phi);
        let z_at = |lev: usize| sigma_to_cartesian(self.sigma_level(lev, elem, phi), h, zeta);

        let k = particle.k_layer as usize;
        let n_siglev = self.grid.n_siglev();

        // Central differences at the bracketing levels, one-sided at the
        // outermost ones.
        let d_upper = if k == 0 {
            (kh_at(0) - kh_at(1)) / (z_at(0) - z_at(1))
        } else {
            (kh_at(k - 1) - kh_at(k + 1)) / (z_at(k - 1) - z_at(k + 1))
        };
        let d_lower = if k + 1 == n_siglev - 1 {
            (kh_at(k) - kh_at(k + 1)) / (z_at(k) - z_at(k + 1))
        } else {
            (kh_at(k) - kh_at(k + 2)) / (z_at(k) - z_at(k + 2))
        };

        linear_interp(particle.omega_interfaces, d_lower, d_upper)
    }

    fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError> {
        self.grid.get_boundary_intersection(particle_old, particle_new)
    }

    fn set_default_location(&self, particle: &mut Particle) {
        self.grid.set_default_location(particle);
    }

    fn is_wet(&self, _t: f64, particle: &Particle) -> bool {
        if !self.has_is_wet {
            return true;
        }
        let elem = particle.host_horizontal_elem as usize;
        let wet_in = |frame: &FieldFrame| match &frame.wet_cells {
            Some(mask) => mask[elem] != 0,
            None => true,
        };
        wet_in(self.mediator.frame_last()) && wet_in(self.mediator.frame_next())
    }

    fn get_environmental_variable(
        &self,
        name: &str,
        t: f64,
        particle: &Particle,
    ) -> Result<f64, ReaderError> {
        let last = self
            .mediator
            .frame_last()
            .tracers
            .get(name)
            .ok_or_else(|| ReaderError::UnknownVariable(name.to_string()))?;
        let next = self
            .mediator
            .frame_next()
            .tracers
            .get(name)
            .ok_or_else(|| ReaderError::UnknownVariable(name.to_string()))?;
        let tau = self.fraction(t);
        Ok(self.layer_field_value(last, next, tau, particle))
    }
}

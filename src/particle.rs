//! Particle state.
//!
//! A particle is an independent record of position and local grid metadata.
//! It carries its global position, barycentric coordinates within its host
//! triangle, and the vertical-layer bookkeeping the interpolation layer
//! needs. Particles are mutated only by the step orchestrator; copies are
//! deep (no field aliases another particle).

/// Status value for a healthy particle.
pub const STATUS_OK: i32 = 0;

/// Status value for a particle that hit a fatal per-step error.
pub const STATUS_ERROR: i32 = 1;

/// A single Lagrangian particle.
///
/// `x3` is geometric depth (upward-positive, metres), not sigma. The
/// barycentric triple `phi` sums to 1 whenever `in_domain` is true and
/// `host_horizontal_elem` is valid.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Particle group ID (set by the seeder; groups share release metadata).
    pub group_id: i32,

    /// Unique particle ID.
    pub id: i32,

    /// Status flag (0 = okay, 1 = errored).
    pub status: i32,

    /// Global x1-position (offset-corrected in cartesian mode).
    pub x1: f64,

    /// Global x2-position (offset-corrected in cartesian mode).
    pub x2: f64,

    /// Global x3-position: geometric depth, upward-positive.
    pub x3: f64,

    /// Barycentric coordinates within the host element.
    pub phi: [f64; 3],

    /// Vertical interpolation fraction between the two sigma levels
    /// bracketing the particle.
    pub omega_interfaces: f64,

    /// Vertical interpolation fraction between the two sigma-layer
    /// midpoints bracketing the particle. Only meaningful when
    /// `in_vertical_boundary_layer` is false.
    pub omega_layers: f64,

    /// Whether the particle resides within the model domain.
    pub in_domain: bool,

    /// Beaching flag (0 = afloat, 1 = host element dry).
    pub is_beached: i32,

    /// The host horizontal element, valid when `in_domain` is true.
    pub host_horizontal_elem: i32,

    /// The sigma layer containing the particle.
    pub k_layer: i32,

    /// Whether the particle sits above the top mid-layer or below the
    /// bottom mid-layer, where layer interpolation collapses to the
    /// boundary layer's value.
    pub in_vertical_boundary_layer: bool,

    /// Layer immediately below the particle. Only set when not in a
    /// vertical boundary layer.
    pub k_lower_layer: i32,

    /// Layer immediately above the particle. Only set when not in a
    /// vertical boundary layer.
    pub k_upper_layer: i32,

    /// Set once the land-reflection cap warning has been logged for this
    /// particle; the corner-trap event is reported once per particle.
    pub land_reflection_warning_issued: bool,
}

impl Particle {
    /// Create a particle at the given position.
    ///
    /// Grid metadata (host element, `phi`, layer indices) is left unset;
    /// the seeder fills it in through the data reader before first use.
    pub fn new(group_id: i32, id: i32, x1: f64, x2: f64, x3: f64) -> Self {
        Self {
            group_id,
            id,
            status: STATUS_OK,
            x1,
            x2,
            x3,
            phi: [0.0; 3],
            omega_interfaces: 0.0,
            omega_layers: 0.0,
            in_domain: false,
            is_beached: 0,
            host_horizontal_elem: -1,
            k_layer: -1,
            in_vertical_boundary_layer: false,
            k_lower_layer: -1,
            k_upper_layer: -1,
            land_reflection_warning_issued: false,
        }
    }

    /// Sum of the barycentric coordinates (1 to roundoff when set).
    #[inline]
    pub fn phi_sum(&self) -> f64 {
        self.phi[0] + self.phi[1] + self.phi[2]
    }

    /// Index of the most negative barycentric coordinate.
    ///
    /// Identifies the edge across which the particle left its host when
    /// any component is negative.
    #[inline]
    pub fn most_negative_phi(&self) -> usize {
        let mut idx = 0;
        for i in 1..3 {
            if self.phi[i] < self.phi[idx] {
                idx = i;
            }
        }
        idx
    }

    /// Mark the particle as errored and out of the domain.
    pub fn flag_error(&mut self) {
        self.status = STATUS_ERROR;
        self.in_domain = false;
    }
}

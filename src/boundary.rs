//! Boundary-condition calculators.
//!
//! Horizontal: a proposed move that crosses a land edge is mirrored across
//! that edge; the orchestrator retries the host classification and repeats
//! under a bounded iteration cap. Vertical: positions beyond the free
//! surface or sea floor are either reflected back into the water column or
//! absorbed (the particle leaves the domain).

use thiserror::Error;

use crate::config::{BoundarySection, HorizontalBoundaryScheme, VerticalBoundaryScheme};
use crate::grid::GridError;
use crate::particle::Particle;
use crate::reader::DataReader;

/// Iteration cap for the land-reflection retry loop (corner traps).
pub const LAND_REFLECTION_CAP: usize = 10;

/// Mirror-operation cap for a single vertical reflection call.
const VERTICAL_MIRROR_CAP: usize = 100;

/// Error type for boundary-condition application.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The crossed edge could not be identified.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Reflect `z` into `[zmin, zmax]` by repeated mirroring.
///
/// Idempotent: a value already in range is returned unchanged, so a second
/// application is a no-op. Values many column-heights out of range converge
/// through successive mirrors; a degenerate column collapses to `zmin`.
pub fn reflect_into_range(mut z: f64, zmin: f64, zmax: f64) -> f64 {
    if !(zmax > zmin) {
        return zmin;
    }
    for _ in 0..VERTICAL_MIRROR_CAP {
        if z < zmin {
            z = 2.0 * zmin - z;
        } else if z > zmax {
            z = 2.0 * zmax - z;
        } else {
            return z;
        }
    }
    z.clamp(zmin, zmax)
}

// =============================================================================
// Horizontal boundary conditions
// =============================================================================

/// Reflecting land boundary: mirrors the proposed end point across the
/// crossed edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefHorizBoundary;

impl RefHorizBoundary {
    /// Mirror `particle_new`'s horizontal position across the boundary edge
    /// crossed by the move old→new.
    ///
    /// The component of the motion parallel to the edge is conserved; only
    /// the normal component is reversed.
    pub fn apply(
        &self,
        reader: &dyn DataReader,
        particle_old: &Particle,
        particle_new: &mut Particle,
    ) -> Result<(), BoundaryError> {
        let hit = reader.get_boundary_intersection(particle_old, particle_new)?;

        let ex = hit.x2 - hit.x1;
        let ey = hit.y2 - hit.y1;
        let len_sq = ex * ex + ey * ey;

        let px = particle_new.x1 - hit.xi;
        let py = particle_new.x2 - hit.yi;
        let along = (px * ex + py * ey) / len_sq;

        particle_new.x1 = hit.xi + 2.0 * along * ex - px;
        particle_new.x2 = hit.yi + 2.0 * along * ey - py;
        Ok(())
    }
}

/// Horizontal land-boundary policy, constructed once from configuration.
#[derive(Clone, Copy, Debug)]
pub enum HorizontalBoundary {
    /// Mirror across the crossed edge and retry.
    Reflecting(RefHorizBoundary),
    /// Restore the pre-step position; the particle holds station.
    Restoring,
    /// No treatment: a land crossing removes the particle from the domain.
    None,
}

impl HorizontalBoundary {
    pub fn from_config(section: &BoundarySection) -> Self {
        match section.horizontal {
            HorizontalBoundaryScheme::Reflecting => Self::Reflecting(RefHorizBoundary),
            HorizontalBoundaryScheme::Restoring => Self::Restoring,
            HorizontalBoundaryScheme::None => Self::None,
        }
    }
}

// =============================================================================
// Vertical boundary conditions
// =============================================================================

/// Result of applying a vertical boundary condition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VerticalOutcome {
    /// The (possibly reflected) position within the water column.
    InColumn(f64),
    /// The particle is absorbed and leaves the domain.
    OutOfDomain,
}

/// Vertical policy at the sea floor and free surface.
#[derive(Clone, Copy, Debug)]
pub enum VerticalBoundary {
    Reflecting,
    Absorbing,
}

impl VerticalBoundary {
    pub fn from_config(section: &BoundarySection) -> Self {
        match section.vertical {
            VerticalBoundaryScheme::Reflecting => Self::Reflecting,
            VerticalBoundaryScheme::Absorbing => Self::Absorbing,
        }
    }

    /// Arbitrate a vertical position against the column bounds.
    pub fn apply(&self, z: f64, zmin: f64, zmax: f64) -> VerticalOutcome {
        if (zmin..=zmax).contains(&z) {
            return VerticalOutcome::InColumn(z);
        }
        match self {
            Self::Reflecting => VerticalOutcome::InColumn(reflect_into_range(z, zmin, zmax)),
            Self::Absorbing => VerticalOutcome::OutOfDomain,
        }
    }
}

//! Particle seeding.
//!
//! Seed input arrives as parallel arrays of (group, x, y, z). Each position
//! is offset-corrected to match the grid, placed with a warm-started host
//! search (the previous particle's host seeds the next search, which is
//! fast for co-located release sites), and its depth interpreted per the
//! configured depth-coordinate convention. A seed outside the horizontal
//! domain is flagged out of domain, not an error; a depth outside the water
//! column at an in-domain site is fatal and surfaces the offending
//! coordinates.

use thiserror::Error;

use crate::config::DepthCoordinates;
use crate::interp::sigma_to_cartesian;
use crate::particle::Particle;
use crate::reader::{DataReader, Mediator, MeshDataReader, ReaderError};
use crate::types::HostStatus;

/// Error type for particle seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The parallel seed arrays disagree on length.
    #[error("seed arrays have mismatched lengths: group_ids {groups}, x {xs}, y {ys}, z {zs}")]
    MismatchedLengths {
        groups: usize,
        xs: usize,
        ys: usize,
        zs: usize,
    },

    /// A depth lies above the free surface or below the sea bed at an
    /// in-domain release site.
    #[error(
        "seed particle {id} (group {group_id}) at ({x}, {y}): depth {z} \
         outside the water column [{zmin}, {zmax}]"
    )]
    DepthOutOfColumn {
        id: i32,
        group_id: i32,
        x: f64,
        y: f64,
        z: f64,
        zmin: f64,
        zmax: f64,
    },

    /// Field access failed while initialising a particle.
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

/// Seed input: parallel arrays of release positions.
#[derive(Clone, Debug, Default)]
pub struct ParticleSeed {
    pub group_ids: Vec<i32>,
    pub x_positions: Vec<f64>,
    pub y_positions: Vec<f64>,
    pub z_positions: Vec<f64>,
}

impl ParticleSeed {
    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }

    fn check_lengths(&self) -> Result<(), SeedError> {
        let n = self.group_ids.len();
        if self.x_positions.len() != n
            || self.y_positions.len() != n
            || self.z_positions.len() != n
        {
            return Err(SeedError::MismatchedLengths {
                groups: n,
                xs: self.x_positions.len(),
                ys: self.y_positions.len(),
                zs: self.z_positions.len(),
            });
        }
        Ok(())
    }
}

/// Create one release of particles at time `t`.
///
/// `id_offset` keeps IDs unique across repeated releases of the same seed.
/// Particles landing outside the domain are returned with
/// `in_domain = false` and are skipped by the stepper thereafter.
pub fn release<M: Mediator>(
    seed: &ParticleSeed,
    reader: &MeshDataReader<M>,
    t: f64,
    depth_coordinates: DepthCoordinates,
    id_offset: i32,
) -> Result<Vec<Particle>, SeedError> {
    seed.check_lengths()?;

    let (x_offset, y_offset) = reader.grid().offsets();
    let mut particles = Vec::with_capacity(seed.len());
    let mut guess: Option<usize> = None;
    let mut n_in_domain = 0usize;

    for i in 0..seed.len() {
        let id = id_offset + i as i32;
        let mut particle = Particle::new(
            seed.group_ids[i],
            id,
            seed.x_positions[i] - x_offset,
            seed.y_positions[i] - y_offset,
            0.0,
        );

        // Warm start from the previous particle's host, falling back to the
        // global scan.
        let walked = match guess {
            Some(first_guess) => {
                reader
                    .grid()
                    .find_host_using_barycentric_walk(&mut particle, first_guess)
                    == HostStatus::InDomain
            }
            None => false,
        };
        let in_domain = walked || reader.find_host_using_global_search(&mut particle);

        if !in_domain {
            particle.in_domain = false;
            particle.host_horizontal_elem = -1;
            particles.push(particle);
            continue;
        }

        let zmin = reader.get_zmin(t, &particle);
        let zmax = reader.get_zmax(t, &particle);
        particle.x3 = match depth_coordinates {
            // z is given as depth below the moving free surface.
            DepthCoordinates::Cartesian => seed.z_positions[i] + zmax,
            // z is given as sigma in [-1, 0].
            DepthCoordinates::Sigma => {
                sigma_to_cartesian(seed.z_positions[i], -zmin, zmax)
            }
        };

        if particle.x3 < zmin || particle.x3 > zmax {
            return Err(SeedError::DepthOutOfColumn {
                id,
                group_id: particle.group_id,
                x: seed.x_positions[i],
                y: seed.y_positions[i],
                z: particle.x3,
                zmin,
                zmax,
            });
        }

        reader.set_vertical_grid_vars(t, &mut particle)?;
        particle.in_domain = true;
        guess = Some(particle.host_horizontal_elem as usize);
        n_in_domain += 1;
        particles.push(particle);
    }

    log::info!(
        "{} of {} particles are located in the model domain",
        n_in_domain,
        particles.len()
    );
    Ok(particles)
}

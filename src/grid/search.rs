//! Host-element search.
//!
//! Three search strategies with different cost/robustness trade-offs:
//!
//! - **Barycentric walk**: O(1) per step for small moves; steps from a first
//!   guess towards the target through the adjacency graph, following the most
//!   negative barycentric coordinate.
//! - **Global scan**: linear scan over all elements; used to place seed
//!   particles with no prior host.
//! - **Pathline tracing**: parametrises the move as a segment and crosses
//!   edges in path order. The walk can report a spurious exit when the move
//!   passes through a concave neighbourhood; tracing resolves whether the
//!   path truly leaves the domain and through which edge.

use super::{GridError, UnstructuredGrid, LAND_EDGE, OPEN_EDGE};
use crate::particle::Particle;
use crate::types::HostStatus;

/// Tolerance on the pathline parameter when ordering edge crossings.
const S_TOL: f64 = 1.0e-12;

/// Endpoints of a crossed boundary edge and the parametric intersection
/// point of the pathline with it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeIntersection {
    /// First endpoint of the crossed edge.
    pub x1: f64,
    pub y1: f64,
    /// Second endpoint of the crossed edge.
    pub x2: f64,
    pub y2: f64,
    /// Intersection of the pathline with the edge.
    pub xi: f64,
    pub yi: f64,
}

/// A candidate edge crossing along a pathline.
#[derive(Clone, Copy)]
struct Crossing {
    /// Pathline parameter in [0, 1].
    s: f64,
    /// Local edge index (opposite the vertex with the same index).
    edge: usize,
}

impl UnstructuredGrid {
    /// Walk from `first_guess` towards the particle's position through the
    /// adjacency graph.
    ///
    /// On success the particle's host element and `phi` are set. When a
    /// boundary edge is reached, the host is left at the last interior
    /// element and the corresponding flag is returned. The walk is capped at
    /// `n_elems` hops; exceeding the cap indicates inconsistent input.
    pub fn find_host_using_barycentric_walk(
        &self,
        particle: &mut Particle,
        first_guess: usize,
    ) -> HostStatus {
        let mut elem = first_guess;

        for _ in 0..=self.n_elems {
            let phi = self.barycentric_coords(particle.x1, particle.x2, elem);
            let mut min_idx = 0;
            for i in 1..3 {
                if phi[i] < phi[min_idx] {
                    min_idx = i;
                }
            }

            if phi[min_idx] >= -self.phi_tol[elem] {
                particle.host_horizontal_elem = elem as i32;
                particle.phi = phi;
                return HostStatus::InDomain;
            }

            match self.nbe[elem][min_idx] {
                LAND_EDGE => {
                    particle.host_horizontal_elem = elem as i32;
                    return HostStatus::LandBoundary;
                }
                OPEN_EDGE => {
                    particle.host_horizontal_elem = elem as i32;
                    return HostStatus::OpenBoundary;
                }
                neighbour => elem = neighbour as usize,
            }
        }

        HostStatus::BoundaryError
    }

    /// Linear scan over all elements; returns the first element containing
    /// `(x, y)`, or `None` if the point lies outside the domain.
    pub fn find_host_using_global_search(&self, x: f64, y: f64) -> Option<usize> {
        (0..self.n_elems).find(|&elem| {
            let phi = self.barycentric_coords(x, y, elem);
            phi.iter().all(|&p| p >= -self.phi_tol[elem])
        })
    }

    /// Trace the segment from the old to the new position through adjacent
    /// elements, crossing the earliest-parameter edge each time.
    ///
    /// Returns [`HostStatus::InDomain`] with the containing element set on
    /// `particle_new` when the segment ends inside the domain; otherwise the
    /// boundary flag for the first land/open edge the path crosses, with the
    /// last interior element set as host.
    pub fn find_host_using_particle_tracing(
        &self,
        particle_old: &Particle,
        particle_new: &mut Particle,
    ) -> HostStatus {
        let (xs, ys) = (particle_old.x1, particle_old.x2);
        let (xe, ye) = (particle_new.x1, particle_new.x2);
        let mut elem = particle_old.host_horizontal_elem as usize;
        let mut s_entry = 0.0_f64;
        let mut entry_edge: Option<usize> = None;

        for _ in 0..=self.n_elems {
            match self.next_crossing(elem, entry_edge, xs, ys, xe, ye, s_entry) {
                None => {
                    particle_new.host_horizontal_elem = elem as i32;
                    self.set_local_coordinates(particle_new);
                    return HostStatus::InDomain;
                }
                Some(crossing) => match self.nbe[elem][crossing.edge] {
                    LAND_EDGE => {
                        particle_new.host_horizontal_elem = elem as i32;
                        return HostStatus::LandBoundary;
                    }
                    OPEN_EDGE => {
                        particle_new.host_horizontal_elem = elem as i32;
                        return HostStatus::OpenBoundary;
                    }
                    neighbour => {
                        let neighbour = neighbour as usize;
                        entry_edge = self.nbe[neighbour]
                            .iter()
                            .position(|&n| n == elem as i32);
                        s_entry = crossing.s;
                        elem = neighbour;
                    }
                },
            }
        }

        HostStatus::BoundaryError
    }

    /// Endpoints of the boundary edge the segment old→new crosses, plus the
    /// intersection point. The host element is taken from `particle_new`,
    /// which after a failed host search holds the last interior element.
    pub fn get_boundary_intersection(
        &self,
        particle_old: &Particle,
        particle_new: &Particle,
    ) -> Result<EdgeIntersection, GridError> {
        let elem = particle_new.host_horizontal_elem as usize;
        let (xs, ys) = (particle_old.x1, particle_old.x2);
        let (xe, ye) = (particle_new.x1, particle_new.x2);
        let dx = xe - xs;
        let dy = ye - ys;

        // A wider parameter window than the tracing tolerance: after a
        // reflection retry the start point can sit marginally outside the
        // element, pushing s slightly past the nominal [0, 1] range.
        const S_SLACK: f64 = 1.0e-9;

        let mut best: Option<(f64, usize)> = None;
        for i in 0..3 {
            if self.nbe[elem][i] >= 0 {
                continue;
            }
            if let Some((s, u)) = self.edge_intersection_params(elem, i, xs, ys, dx, dy) {
                if !(-S_TOL..=1.0 + S_TOL).contains(&u) {
                    continue;
                }
                if !(-S_SLACK..=1.0 + S_SLACK).contains(&s) {
                    continue;
                }
                if best.map_or(true, |(r, _)| s < r) {
                    best = Some((s, i));
                }
            }
        }

        let (s, edge) = best.ok_or(GridError::NoBoundaryIntersection {
            elem,
            x_old: xs,
            y_old: ys,
            x_new: xe,
            y_new: ye,
        })?;

        let na = self.nv[elem][(edge + 1) % 3];
        let nb = self.nv[elem][(edge + 2) % 3];
        let (x1, y1) = (self.x[na], self.y[na]);
        let (x2, y2) = (self.x[nb], self.y[nb]);
        Ok(EdgeIntersection {
            x1,
            y1,
            x2,
            y2,
            xi: xs + s * dx,
            yi: ys + s * dy,
        })
    }

    /// Earliest edge crossing of the segment within an element, excluding
    /// the entry edge and any crossing at or before `s_entry`.
    ///
    /// Tie-breaking for coincident parameters: an edge whose neighbour is
    /// not a boundary wins; between two boundary edges, land takes
    /// precedence over open.
    fn next_crossing(
        &self,
        elem: usize,
        skip_edge: Option<usize>,
        xs: f64,
        ys: f64,
        xe: f64,
        ye: f64,
        s_entry: f64,
    ) -> Option<Crossing> {
        let dx = xe - xs;
        let dy = ye - ys;

        let mut candidates: [Crossing; 3] = [Crossing { s: 0.0, edge: 0 }; 3];
        let mut n_candidates = 0;

        for i in 0..3 {
            if skip_edge == Some(i) {
                continue;
            }
            if let Some((s, u)) = self.edge_intersection_params(elem, i, xs, ys, dx, dy) {
                if s > s_entry + S_TOL
                    && s <= 1.0 + S_TOL
                    && (-S_TOL..=1.0 + S_TOL).contains(&u)
                {
                    candidates[n_candidates] = Crossing { s, edge: i };
                    n_candidates += 1;
                }
            }
        }

        let candidates = &candidates[..n_candidates];
        let first = candidates
            .iter()
            .copied()
            .min_by(|a, b| a.s.total_cmp(&b.s))?;

        let tied: Vec<Crossing> = candidates
            .iter()
            .copied()
            .filter(|c| (c.s - first.s).abs() <= S_TOL)
            .collect();
        if tied.len() == 1 {
            return Some(first);
        }

        // Coincident crossings (the path exits through a vertex).
        if let Some(interior) = tied.iter().find(|c| self.nbe[elem][c.edge] >= 0) {
            return Some(*interior);
        }
        if let Some(land) = tied.iter().find(|c| self.nbe[elem][c.edge] == LAND_EDGE) {
            return Some(*land);
        }
        Some(first)
    }

    /// Intersection parameters of the pathline `P(s) = start + s·d` with
    /// edge `i` of an element, `A + u·(B − A)`. `None` when parallel.
    fn edge_intersection_params(
        &self,
        elem: usize,
        edge: usize,
        xs: f64,
        ys: f64,
        dx: f64,
        dy: f64,
    ) -> Option<(f64, f64)> {
        let na = self.nv[elem][(edge + 1) % 3];
        let nb = self.nv[elem][(edge + 2) % 3];
        let (ax, ay) = (self.x[na], self.y[na]);
        let (bx, by) = (self.x[nb], self.y[nb]);
        let ex = bx - ax;
        let ey = by - ay;

        let denom = dx * ey - dy * ex;
        if denom == 0.0 {
            return None;
        }
        let s = ((ax - xs) * ey - (ay - ys) * ex) / denom;
        let u = ((ax - xs) * dy - (ay - ys) * dx) / denom;
        Some((s, u))
    }
}

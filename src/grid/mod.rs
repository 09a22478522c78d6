//! Unstructured triangular grid.
//!
//! The grid stores:
//! - Node coordinates and element centres (offset-corrected in cartesian mode)
//! - Element-node connectivity `nv` and element adjacency `nbe`
//! - Terrain-following vertical coordinates (sigma levels and layers) at nodes
//! - Bathymetry at nodes
//!
//! Adjacency convention: `nbe[elem][i]` is the neighbour across the edge
//! OPPOSITE vertex `i`, i.e. the edge joining vertices `(i+1) % 3` and
//! `(i+2) % 3`. The sentinel values −1 (land edge) and −2 (open-boundary
//! edge) are part of the input format and are stored bit-exactly.
//!
//! The grid is immutable after construction. Host-element search routines
//! live in [`search`] (same type, separate file).

mod search;

pub use search::EdgeIntersection;

use thiserror::Error;

use crate::config::CoordinateSystem;
use crate::particle::Particle;
use crate::types::GEOM_EPSILON;

/// Sentinel marking a land (closed) edge in the adjacency array.
pub const LAND_EDGE: i32 = -1;

/// Sentinel marking an open-boundary edge in the adjacency array.
pub const OPEN_EDGE: i32 = -2;

/// Error type for grid construction and geometric queries.
#[derive(Debug, Error)]
pub enum GridError {
    /// An input array has the wrong length.
    #[error("shape mismatch for {name}: expected {expected}, got {got}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    /// A connectivity entry references a node that does not exist.
    #[error("element {elem} references node {node}, but the grid has {n_nodes} nodes")]
    NodeIndexOutOfRange {
        elem: usize,
        node: i32,
        n_nodes: usize,
    },

    /// An adjacency entry references an element that does not exist.
    #[error("element {elem} lists neighbour {neighbour}, but the grid has {n_elems} elements")]
    NeighbourOutOfRange {
        elem: usize,
        neighbour: i32,
        n_elems: usize,
    },

    /// Sigma levels must decrease monotonically from 0 to −1.
    #[error("sigma levels at node {node} are not monotonically decreasing")]
    InvalidSigmaProfile { node: usize },

    /// A degenerate (zero-area) triangle was found.
    #[error("element {elem} is degenerate (zero area)")]
    DegenerateElement { elem: usize },

    /// The grid has no elements or no nodes.
    #[error("empty grid: {0}")]
    Empty(&'static str),

    /// No boundary edge of the host element is crossed by the pathline.
    #[error("pathline from ({x_old}, {y_old}) to ({x_new}, {y_new}) crosses no boundary edge of element {elem}")]
    NoBoundaryIntersection {
        elem: usize,
        x_old: f64,
        y_old: f64,
        x_new: f64,
        y_new: f64,
    },
}

/// Immutable unstructured triangular grid with sigma vertical coordinates.
#[derive(Clone, Debug)]
pub struct UnstructuredGrid {
    n_nodes: usize,
    n_elems: usize,
    n_siglay: usize,
    n_siglev: usize,

    /// Element-node connectivity, three node indices per element.
    nv: Vec<[usize; 3]>,

    /// Element adjacency across the edge opposite each vertex;
    /// −1 = land edge, −2 = open-boundary edge.
    nbe: Vec<[i32; 3]>,

    /// Node coordinates (offset-corrected in cartesian mode).
    x: Vec<f64>,
    y: Vec<f64>,

    /// Element centres (offset-corrected in cartesian mode).
    xc: Vec<f64>,
    yc: Vec<f64>,

    /// Sigma at level interfaces, level-major: `siglev[k * n_nodes + node]`.
    siglev: Vec<f64>,

    /// Sigma at layer midpoints, layer-major: `siglay[k * n_nodes + node]`.
    siglay: Vec<f64>,

    /// Bathymetry at nodes (positive depth).
    h: Vec<f64>,

    /// Barycentric containment tolerance per element: [`GEOM_EPSILON`]
    /// scaled by the triangle's characteristic size.
    phi_tol: Vec<f64>,

    /// Offset subtracted from all x coordinates (zero in spherical mode).
    xmin: f64,

    /// Offset subtracted from all y coordinates (zero in spherical mode).
    ymin: f64,
}

impl UnstructuredGrid {
    /// Build a grid from the circulation model's flattened arrays.
    ///
    /// Shapes follow the input format: `nv` and `nbe` are `(3, n_elems)` in
    /// row-major order, `siglev` is `(n_siglev, n_nodes)`, `siglay` is
    /// `(n_siglev − 1, n_nodes)`. In cartesian mode a uniform offset
    /// `(xmin, ymin)` is subtracted from node and centre coordinates for
    /// floating-point conditioning; in spherical mode offsets are zero.
    #[allow(clippy::too_many_arguments)]
    pub fn from_arrays(
        nv: &[i32],
        nbe: &[i32],
        x: &[f64],
        y: &[f64],
        xc: &[f64],
        yc: &[f64],
        siglev: &[f64],
        siglay: &[f64],
        h: &[f64],
        coordinate_system: CoordinateSystem,
    ) -> Result<Self, GridError> {
        let n_nodes = x.len();
        let n_elems = xc.len();
        if n_nodes == 0 {
            return Err(GridError::Empty("no nodes"));
        }
        if n_elems == 0 {
            return Err(GridError::Empty("no elements"));
        }

        check_len("y", y.len(), n_nodes)?;
        check_len("h", h.len(), n_nodes)?;
        check_len("yc", yc.len(), n_elems)?;
        check_len("nv", nv.len(), 3 * n_elems)?;
        check_len("nbe", nbe.len(), 3 * n_elems)?;
        if siglev.len() % n_nodes != 0 || siglev.len() < 2 * n_nodes {
            return Err(GridError::ShapeMismatch {
                name: "siglev",
                expected: 2 * n_nodes,
                got: siglev.len(),
            });
        }
        let n_siglev = siglev.len() / n_nodes;
        let n_siglay = n_siglev - 1;
        check_len("siglay", siglay.len(), n_siglay * n_nodes)?;

        // Connectivity arrays arrive as (3, n_elems): row i holds entry i
        // for every element.
        let mut nv_elems = Vec::with_capacity(n_elems);
        let mut nbe_elems = Vec::with_capacity(n_elems);
        for e in 0..n_elems {
            let mut nodes = [0usize; 3];
            for i in 0..3 {
                let node = nv[i * n_elems + e];
                if node < 0 || node as usize >= n_nodes {
                    return Err(GridError::NodeIndexOutOfRange {
                        elem: e,
                        node,
                        n_nodes,
                    });
                }
                nodes[i] = node as usize;
            }
            nv_elems.push(nodes);

            let mut neighbours = [0i32; 3];
            for i in 0..3 {
                let nb = nbe[i * n_elems + e];
                if nb >= 0 && nb as usize >= n_elems {
                    return Err(GridError::NeighbourOutOfRange {
                        elem: e,
                        neighbour: nb,
                        n_elems,
                    });
                }
                neighbours[i] = nb;
            }
            nbe_elems.push(neighbours);
        }

        // Sigma levels decrease from 0 (surface) to −1 (seabed) along axis 0.
        for node in 0..n_nodes {
            for k in 1..n_siglev {
                if siglev[k * n_nodes + node] >= siglev[(k - 1) * n_nodes + node] {
                    return Err(GridError::InvalidSigmaProfile { node });
                }
            }
        }

        let (xmin, ymin) = match coordinate_system {
            CoordinateSystem::Cartesian => (
                x.iter().copied().fold(f64::INFINITY, f64::min),
                y.iter().copied().fold(f64::INFINITY, f64::min),
            ),
            CoordinateSystem::Spherical => (0.0, 0.0),
        };

        let mut grid = Self {
            n_nodes,
            n_elems,
            n_siglay,
            n_siglev,
            nv: nv_elems,
            nbe: nbe_elems,
            x: x.iter().map(|&v| v - xmin).collect(),
            y: y.iter().map(|&v| v - ymin).collect(),
            xc: xc.iter().map(|&v| v - xmin).collect(),
            yc: yc.iter().map(|&v| v - ymin).collect(),
            siglev: siglev.to_vec(),
            siglay: siglay.to_vec(),
            h: h.to_vec(),
            phi_tol: Vec::new(),
            xmin,
            ymin,
        };

        let mut phi_tol = Vec::with_capacity(n_elems);
        for e in 0..n_elems {
            let det = grid.element_determinant(e);
            if det == 0.0 {
                return Err(GridError::DegenerateElement { elem: e });
            }
            // |det| is twice the triangle area, so its square root is an
            // edge-scale characteristic length.
            phi_tol.push(GEOM_EPSILON * det.abs().sqrt());
        }
        grid.phi_tol = phi_tol;

        Ok(grid)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Number of elements.
    #[inline]
    pub fn n_elems(&self) -> usize {
        self.n_elems
    }

    /// Number of sigma layers (midpoints).
    #[inline]
    pub fn n_siglay(&self) -> usize {
        self.n_siglay
    }

    /// Number of sigma levels (interfaces) = n_siglay + 1.
    #[inline]
    pub fn n_siglev(&self) -> usize {
        self.n_siglev
    }

    /// Node indices of an element.
    #[inline]
    pub fn element_nodes(&self, elem: usize) -> [usize; 3] {
        self.nv[elem]
    }

    /// Adjacency entries of an element (−1 land, −2 open).
    #[inline]
    pub fn element_neighbours(&self, elem: usize) -> [i32; 3] {
        self.nbe[elem]
    }

    /// Element centre coordinates.
    #[inline]
    pub fn element_centre(&self, elem: usize) -> (f64, f64) {
        (self.xc[elem], self.yc[elem])
    }

    /// Node coordinates.
    #[inline]
    pub fn node_position(&self, node: usize) -> (f64, f64) {
        (self.x[node], self.y[node])
    }

    /// Bathymetry (positive depth) at a node.
    #[inline]
    pub fn bathymetry_at_node(&self, node: usize) -> f64 {
        self.h[node]
    }

    /// Sigma at level interface `k` for a node.
    #[inline]
    pub fn siglev_at(&self, k: usize, node: usize) -> f64 {
        self.siglev[k * self.n_nodes + node]
    }

    /// Sigma at layer midpoint `k` for a node.
    #[inline]
    pub fn siglay_at(&self, k: usize, node: usize) -> f64 {
        self.siglay[k * self.n_nodes + node]
    }

    /// The coordinate offset applied at construction.
    #[inline]
    pub fn offsets(&self) -> (f64, f64) {
        (self.xmin, self.ymin)
    }

    /// Barycentric containment tolerance for an element:
    /// [`GEOM_EPSILON`] scaled by the triangle's characteristic size, so
    /// the accepted roundoff slack tracks the local mesh resolution.
    #[inline]
    pub fn phi_tolerance(&self, elem: usize) -> f64 {
        self.phi_tol[elem]
    }

    // =========================================================================
    // Barycentric Geometry
    // =========================================================================

    /// Twice the signed area of an element. The sign encodes vertex
    /// orientation; barycentric coordinates divide it out, so both
    /// orderings are handled.
    #[inline]
    fn element_determinant(&self, elem: usize) -> f64 {
        let [a, b, c] = self.nv[elem];
        let (x0, y0) = (self.x[a], self.y[a]);
        let (x1, y1) = (self.x[b], self.y[b]);
        let (x2, y2) = (self.x[c], self.y[c]);
        (y1 - y2) * (x0 - x2) + (x2 - x1) * (y0 - y2)
    }

    /// Barycentric coordinates of `(x, y)` within an element.
    ///
    /// The triple sums to 1 exactly (the third component is computed as the
    /// complement). Components are negative when the point lies outside the
    /// element, with the most negative one identifying the exit edge.
    pub fn barycentric_coords(&self, x: f64, y: f64, elem: usize) -> [f64; 3] {
        let [a, b, c] = self.nv[elem];
        let (x1, y1) = (self.x[b], self.y[b]);
        let (x2, y2) = (self.x[c], self.y[c]);
        let det = self.element_determinant(elem);

        let phi0 = ((y1 - y2) * (x - x2) + (x2 - x1) * (y - y2)) / det;
        let phi1 = ((y2 - self.y[a]) * (x - x2) + (self.x[a] - x2) * (y - y2)) / det;
        [phi0, phi1, 1.0 - phi0 - phi1]
    }

    /// Analytic gradients of the barycentric basis functions, constant per
    /// element: `(dphi_dx, dphi_dy)`.
    pub fn grad_phi(&self, elem: usize) -> ([f64; 3], [f64; 3]) {
        let [a, b, c] = self.nv[elem];
        let (x0, y0) = (self.x[a], self.y[a]);
        let (x1, y1) = (self.x[b], self.y[b]);
        let (x2, y2) = (self.x[c], self.y[c]);
        let det = self.element_determinant(elem);

        let dphi_dx = [(y1 - y2) / det, (y2 - y0) / det, (y0 - y1) / det];
        let dphi_dy = [(x2 - x1) / det, (x0 - x2) / det, (x1 - x0) / det];
        (dphi_dx, dphi_dy)
    }

    /// Recompute a particle's barycentric coordinates from its position in
    /// its current host element. Components that come out marginally
    /// negative through roundoff are clamped to zero and the triple is
    /// renormalised to sum to 1.
    pub fn set_local_coordinates(&self, particle: &mut Particle) {
        let elem = particle.host_horizontal_elem as usize;
        let mut phi = self.barycentric_coords(particle.x1, particle.x2, elem);

        if phi.iter().any(|&p| p < 0.0) {
            for p in phi.iter_mut() {
                if *p < 0.0 {
                    *p = 0.0;
                }
            }
            let sum = phi[0] + phi[1] + phi[2];
            for p in phi.iter_mut() {
                *p /= sum;
            }
        }
        particle.phi = phi;
    }

    /// Snap a particle onto its host element's centroid. Used when
    /// reflection would otherwise leave it marginally outside the domain.
    pub fn set_default_location(&self, particle: &mut Particle) {
        let elem = particle.host_horizontal_elem as usize;
        particle.x1 = self.xc[elem];
        particle.x2 = self.yc[elem];
        self.set_local_coordinates(particle);
    }

    /// Interpolate a nodal value set to a particle's position on one sigma
    /// level or layer row of a `(n_k, n_nodes)` field.
    #[inline]
    pub fn nodal_values(&self, field: &[f64], k: usize, elem: usize) -> [f64; 3] {
        let [a, b, c] = self.nv[elem];
        let row = k * self.n_nodes;
        [field[row + a], field[row + b], field[row + c]]
    }

    /// Nodal bathymetry values for an element.
    #[inline]
    pub fn bathymetry_values(&self, elem: usize) -> [f64; 3] {
        let [a, b, c] = self.nv[elem];
        [self.h[a], self.h[b], self.h[c]]
    }

    /// Nodal values of a flat `(n_nodes,)` field for an element.
    #[inline]
    pub fn surface_values(&self, field: &[f64], elem: usize) -> [f64; 3] {
        let [a, b, c] = self.nv[elem];
        [field[a], field[b], field[c]]
    }
}

fn check_len(name: &'static str, got: usize, expected: usize) -> Result<(), GridError> {
    if got != expected {
        return Err(GridError::ShapeMismatch {
            name,
            expected,
            got,
        });
    }
    Ok(())
}

/// Sort a raw adjacency array into the opposite-vertex convention.
///
/// Circulation models do not necessarily order `nbe` relative to `nv`. This
/// produces `nbe_sorted` where entry `i` of each element is the neighbour
/// sharing the edge opposite vertex `i`. Sides without a matching neighbour
/// receive the land sentinel −1; open-boundary tagging is applied by the
/// caller afterwards. Both arrays are `(3, n_elems)` row-major.
pub fn sort_adjacency(nv: &[i32], nbe: &[i32]) -> Result<Vec<i32>, GridError> {
    if nv.len() != nbe.len() || nv.len() % 3 != 0 {
        return Err(GridError::ShapeMismatch {
            name: "nbe",
            expected: nv.len(),
            got: nbe.len(),
        });
    }
    let n_elems = nv.len() / 3;
    let nodes_of = |e: usize| -> [i32; 3] { [nv[e], nv[n_elems + e], nv[2 * n_elems + e]] };

    let mut sorted = vec![LAND_EDGE; 3 * n_elems];
    for e in 0..n_elems {
        let nodes = nodes_of(e);
        for i in 0..3 {
            // Edge opposite vertex i
            let va = nodes[(i + 1) % 3];
            let vb = nodes[(i + 2) % 3];
            for j in 0..3 {
                let nb = nbe[j * n_elems + e];
                if nb < 0 {
                    continue;
                }
                let nb_nodes = nodes_of(nb as usize);
                if nb_nodes.contains(&va) && nb_nodes.contains(&vb) {
                    sorted[i * n_elems + e] = nb;
                    break;
                }
            }
        }
    }
    Ok(sorted)
}

#[cfg(test)]
pub(crate) mod test_grids {
    //! Small hand-built grids shared by unit tests.

    use super::UnstructuredGrid;
    use crate::config::CoordinateSystem;

    /// Two right triangles tiling the unit square:
    ///
    /// ```text
    /// 3 ---- 2
    /// | e1 / |
    /// |  /   |
    /// | / e0 |
    /// 0 ---- 1
    /// ```
    ///
    /// Element 0 = (0, 1, 2), element 1 = (0, 2, 3). They share the edge
    /// (0, 2). All outer edges are land except where overridden.
    pub fn unit_square(n_levels: usize) -> UnstructuredGrid {
        unit_square_with_boundaries(n_levels, [-1, -1, -1, -1])
    }

    /// Unit square with configurable outer-edge sentinels:
    /// `[south, east, north, west]`.
    pub fn unit_square_with_boundaries(
        n_levels: usize,
        outer: [i32; 4],
    ) -> UnstructuredGrid {
        let x = [0.0, 1.0, 1.0, 0.0];
        let y = [0.0, 0.0, 1.0, 1.0];
        // (3, n_elems) row-major: row i holds vertex i of each element.
        let nv = [0, 0, 1, 2, 2, 3];
        // Element 0 edges: opp v0 = (1,2) east; opp v1 = (2,0) shared; opp v2 = (0,1) south.
        // Element 1 edges: opp v0 = (2,3) north; opp v1 = (3,0) west; opp v2 = (0,2) shared.
        let [south, east, north, west] = outer;
        let nbe = [east, north, 1, west, south, 0];
        let xc = [2.0 / 3.0, 1.0 / 3.0];
        let yc = [1.0 / 3.0, 2.0 / 3.0];
        let (siglev, siglay) = uniform_sigma(n_levels, 4);
        let h = [10.0; 4];

        UnstructuredGrid::from_arrays(
            &nv,
            &nbe,
            &x,
            &y,
            &xc,
            &yc,
            &siglev,
            &siglay,
            &h,
            CoordinateSystem::Cartesian,
        )
        .expect("unit square grid is valid")
    }

    /// Uniform sigma levels/layers for `n_nodes` nodes.
    pub fn uniform_sigma(n_siglay: usize, n_nodes: usize) -> (Vec<f64>, Vec<f64>) {
        let n_siglev = n_siglay + 1;
        let mut siglev = Vec::with_capacity(n_siglev * n_nodes);
        for k in 0..n_siglev {
            let s = -(k as f64) / n_siglay as f64;
            siglev.extend(std::iter::repeat(s).take(n_nodes));
        }
        let mut siglay = Vec::with_capacity(n_siglay * n_nodes);
        for k in 0..n_siglay {
            let s = -(k as f64 + 0.5) / n_siglay as f64;
            siglay.extend(std::iter::repeat(s).take(n_nodes));
        }
        (siglev, siglay)
    }
}

//! Shared mesh fixtures for integration tests.

use drift_rs::{sort_adjacency, CoordinateSystem, FieldFrame, UnstructuredGrid};

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

/// A single-row strip mesh covering [0, length] × [0, 1], two triangles per
/// unit square, 10 m deep. Outer edges are land except where
/// `open_east` marks the x = length edges open.
pub fn strip_grid(length: usize, open_east: bool) -> UnstructuredGrid {
    let n_cols = length + 1;
    let n_nodes = 2 * n_cols;
    let n_elems = 2 * length;

    // Bottom row of nodes first (y = 0), then the top row (y = 1).
    let mut x = Vec::with_capacity(n_nodes);
    let mut y = Vec::with_capacity(n_nodes);
    for row in 0..2 {
        for i in 0..n_cols {
            x.push(i as f64);
            y.push(row as f64);
        }
    }

    // Square i: lower triangle (a, b, c), upper triangle (a, c, d) with
    // a = (i, 0), b = (i+1, 0), c = (i+1, 1), d = (i, 1).
    let mut elems: Vec<[i32; 3]> = Vec::with_capacity(n_elems);
    for i in 0..length {
        let a = i as i32;
        let b = (i + 1) as i32;
        let c = (n_cols + i + 1) as i32;
        let d = (n_cols + i) as i32;
        elems.push([a, b, c]);
        elems.push([a, c, d]);
    }

    // Flatten to (3, n_elems) and find neighbours by shared-edge matching;
    // sort_adjacency puts them into the opposite-vertex convention.
    let mut nv = vec![0i32; 3 * n_elems];
    for (e, tri) in elems.iter().enumerate() {
        for i in 0..3 {
            nv[i * n_elems + e] = tri[i];
        }
    }
    let mut raw_nbe = vec![-1i32; 3 * n_elems];
    for e in 0..n_elems {
        let mut slot = 0;
        for other in 0..n_elems {
            if other == e {
                continue;
            }
            let shared = elems[e]
                .iter()
                .filter(|n| elems[other].contains(n))
                .count();
            if shared == 2 {
                raw_nbe[slot * n_elems + e] = other as i32;
                slot += 1;
            }
        }
    }
    let mut nbe = sort_adjacency(&nv, &raw_nbe).unwrap();

    if open_east {
        // Mark land slots whose edge lies on x = length as open.
        for e in 0..n_elems {
            for i in 0..3 {
                if nbe[i * n_elems + e] != -1 {
                    continue;
                }
                let va = nv[((i + 1) % 3) * n_elems + e] as usize;
                let vb = nv[((i + 2) % 3) * n_elems + e] as usize;
                if x[va] == length as f64 && x[vb] == length as f64 {
                    nbe[i * n_elems + e] = -2;
                }
            }
        }
    }

    let mut xc = Vec::with_capacity(n_elems);
    let mut yc = Vec::with_capacity(n_elems);
    for tri in &elems {
        xc.push(tri.iter().map(|&n| x[n as usize]).sum::<f64>() / 3.0);
        yc.push(tri.iter().map(|&n| y[n as usize]).sum::<f64>() / 3.0);
    }

    let (siglev, siglay) = uniform_sigma(5, n_nodes);
    let h = vec![10.0; n_nodes];

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
    .expect("strip grid is valid")
}

/// Two steady, identical frames at t = 0 and `t_end` with the given
/// uniform velocity and vertical diffusivity.
pub fn steady_frames(
    grid: &UnstructuredGrid,
    t_end: f64,
    u: f64,
    v: f64,
    w: f64,
    kh: f64,
) -> Vec<FieldFrame> {
    let mut frames = vec![
        FieldFrame::zeros(0.0, grid),
        FieldFrame::zeros(t_end, grid),
    ];
    for frame in frames.iter_mut() {
        frame.u.iter_mut().for_each(|val| *val = u);
        frame.v.iter_mut().for_each(|val| *val = v);
        frame.w.iter_mut().for_each(|val| *val = w);
        frame.kh.iter_mut().for_each(|val| *val = kh);
    }
    frames
}

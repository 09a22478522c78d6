//! Interpolation primitives.
//!
//! Small, allocation-free building blocks shared by the data-reader layer:
//! - Linear interpolation in time and in sigma
//! - Barycentric interpolation over a triangle
//! - Shepard (inverse-distance-squared) interpolation over a small point set
//! - Sigma ↔ cartesian vertical coordinate transforms
//!
//! # Coordinate Transform
//!
//! The terrain-following vertical coordinate satisfies
//!
//! ```text
//! σ = (z − ζ) / (ζ + h),    z = ζ + (ζ + h) × σ,    σ ∈ [−1, 0]
//! ```
//!
//! where ζ is the free-surface elevation and h the (positive) bathymetric
//! depth, so σ = 0 at the surface and σ = −1 at the seabed.

use crate::types::POS_EPSILON_SQ;

/// Fractional position of `t` between `t_a` and `t_b`.
///
/// Unclamped; callers that interpolate field values use
/// [`linear_fraction_safe`] instead.
#[inline]
pub fn linear_fraction(t: f64, t_a: f64, t_b: f64) -> f64 {
    (t - t_a) / (t_b - t_a)
}

/// Fractional position of `t` between `t_a` and `t_b`, clamped to [0, 1].
///
/// Works unchanged for reversed intervals (t_a > t_b), which is how
/// backward-in-time runs bracket their frames.
#[inline]
pub fn linear_fraction_safe(t: f64, t_a: f64, t_b: f64) -> f64 {
    linear_fraction(t, t_a, t_b).clamp(0.0, 1.0)
}

/// Linear interpolation: a + τ(b − a).
#[inline]
pub fn linear_interp(tau: f64, a: f64, b: f64) -> f64 {
    a + tau * (b - a)
}

/// Barycentric interpolation of nodal values within a triangle: Σ valsᵢ φᵢ.
#[inline]
pub fn interpolate_within_element(vals: &[f64; 3], phi: &[f64; 3]) -> f64 {
    vals[0] * phi[0] + vals[1] * phi[1] + vals[2] * phi[2]
}

/// Shepard interpolation with exponent 2 over a small set of reference
/// points.
///
/// Weights are wᵢ = 1/rᵢ² with rᵢ² = (x−xᵢ)² + (y−yᵢ)². If the target
/// coincides with a reference point to machine scale, that point's value is
/// returned directly. The slices carry an explicit count; no sentinel
/// padding is used.
pub fn shepard_interpolation(x: f64, y: f64, xs: &[f64], ys: &[f64], vals: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert_eq!(xs.len(), vals.len());
    debug_assert!(!xs.is_empty());

    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..xs.len() {
        let dx = x - xs[i];
        let dy = y - ys[i];
        let r_sq = dx * dx + dy * dy;
        if r_sq < POS_EPSILON_SQ {
            return vals[i];
        }
        let w = 1.0 / r_sq;
        num += w * vals[i];
        den += w;
    }
    num / den
}

/// Convert sigma to geometric depth: z = ζ + (ζ + h) σ.
///
/// `h` is positive depth; the result is negative below the reference
/// surface.
#[inline]
pub fn sigma_to_cartesian(sigma: f64, h: f64, zeta: f64) -> f64 {
    zeta + (zeta + h) * sigma
}

/// Convert geometric depth to sigma: σ = (z − ζ) / (ζ + h).
#[inline]
pub fn cartesian_to_sigma(z: f64, h: f64, zeta: f64) -> f64 {
    (z - zeta) / (zeta + h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1.0e-12;

    #[test]
    fn test_linear_fraction() {
        assert!((linear_fraction(5.0, 0.0, 10.0) - 0.5).abs() < TOL);
        assert!((linear_fraction(-5.0, 0.0, 10.0) - (-0.5)).abs() < TOL);
    }

    #[test]
    fn test_linear_fraction_safe_clamps() {
        assert_eq!(linear_fraction_safe(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(linear_fraction_safe(11.0, 0.0, 10.0), 1.0);
        assert!((linear_fraction_safe(2.5, 0.0, 10.0) - 0.25).abs() < TOL);
    }

    #[test]
    fn test_linear_fraction_safe_reversed_interval() {
        // Backward-in-time bracketing: t_a > t_b
        let tau = linear_fraction_safe(7.5, 10.0, 0.0);
        assert!((tau - 0.25).abs() < TOL);
        assert_eq!(linear_fraction_safe(11.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_linear_interp_exact_for_linear_fields() {
        // u_last = u_next + α (t_next − t_last) must reproduce the exact
        // linear value at any τ.
        let (t_last, t_next) = (0.0, 3600.0);
        let alpha = -2.5e-4;
        let u_next = 0.8;
        let u_last = u_next + alpha * (t_next - t_last);
        for &t in &[0.0, 450.0, 1800.0, 3599.0] {
            let tau = linear_fraction_safe(t, t_last, t_next);
            let u = linear_interp(tau, u_last, u_next);
            let exact = u_next + alpha * (t_next - t);
            assert!(
                (u - exact).abs() < TOL,
                "t={}: interpolated {} != exact {}",
                t,
                u,
                exact
            );
        }
    }

    #[test]
    fn test_barycentric_at_vertex() {
        let vals = [3.0, -1.0, 7.5];
        assert_eq!(interpolate_within_element(&vals, &[1.0, 0.0, 0.0]), 3.0);
        assert_eq!(interpolate_within_element(&vals, &[0.0, 1.0, 0.0]), -1.0);
        assert_eq!(interpolate_within_element(&vals, &[0.0, 0.0, 1.0]), 7.5);
    }

    #[test]
    fn test_shepard_constant_field() {
        let xs = [0.0, 1.0, 0.0, 1.0];
        let ys = [0.0, 0.0, 1.0, 1.0];
        let vals = [4.2; 4];
        let v = shepard_interpolation(0.3, 0.7, &xs, &ys, &vals);
        assert!((v - 4.2).abs() < TOL);
    }

    #[test]
    fn test_shepard_at_reference_point() {
        let xs = [0.0, 1.0];
        let ys = [0.0, 0.0];
        let vals = [1.0, 2.0];
        // Exactly on the second point: no division, direct return.
        assert_eq!(shepard_interpolation(1.0, 0.0, &xs, &ys, &vals), 2.0);
    }

    #[test]
    fn test_shepard_inverse_distance_weighting() {
        let xs = [0.0, 2.0];
        let ys = [0.0, 0.0];
        let vals = [0.0, 1.0];
        // At x = 0.5: r0² = 0.25, r1² = 2.25 → w0 = 4, w1 = 4/9.
        let v = shepard_interpolation(0.5, 0.0, &xs, &ys, &vals);
        let expected = (4.0 / 9.0) / (4.0 + 4.0 / 9.0);
        assert!((v - expected).abs() < TOL);
    }

    #[test]
    fn test_sigma_cartesian_roundtrip() {
        for &h in &[5.0, 100.0, 4000.0] {
            for &zeta in &[-0.8, 0.0, 1.5] {
                for &sigma in &[-1.0, -0.75, -0.5, -0.1, 0.0] {
                    let z = sigma_to_cartesian(sigma, h, zeta);
                    assert!(z >= -h - TOL && z <= zeta + TOL);
                    let back = cartesian_to_sigma(z, h, zeta);
                    assert!(
                        (back - sigma).abs() < TOL,
                        "h={} zeta={} sigma={}: roundtrip gave {}",
                        h,
                        zeta,
                        sigma,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn test_sigma_endpoints() {
        // σ = 0 → surface, σ = −1 → seabed.
        assert!((sigma_to_cartesian(0.0, 50.0, 0.4) - 0.4).abs() < TOL);
        assert!((sigma_to_cartesian(-1.0, 50.0, 0.4) - (-50.0)).abs() < TOL);
    }
}

//! Helix pre-fit: algebraic circle fit in xy plus a straight line in s-z.
//!
//! The circle is written as `A(x² + y²) + Bx + Cy + D = 0` and normalized so
//! that `B² + C² - 4AD = 1`. With that normalization `|2A|` is the curvature
//! and a straight line is just `A = 0`, so both cases share one code path.

use nalgebra::{Matrix4, Vector4};

use crate::criteria::geometry::Point;

/// Result of the helix pre-fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelixPrefit {
    /// Normalized circle coefficients `[A, B, C, D]`.
    pub coeffs: [f64; 4],
    /// Signed curvature along the direction of flight (1/mm, positive = counterclockwise).
    pub kappa: f64,
    /// Azimuth of the flight direction at the outermost hit.
    pub phi_outer: f64,
    /// `dz/ds` with `s` the transverse arc length in the direction of flight.
    pub tan_lambda: f64,
    pub chi2: f64,
    pub ndf: usize,
}

impl HelixPrefit {
    pub fn chi2_ndf(&self) -> f64 {
        if self.ndf == 0 {
            return f64::INFINITY;
        }
        self.chi2 / self.ndf as f64
    }

    /// Signed geometric distance of an xy point from the fitted circle.
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d] = self.coeffs;
        let p = a * (x * x + y * y) + b * x + c * y + d;
        let disc = 1.0 + 4.0 * a * p;
        if disc <= 0.0 {
            return p;
        }
        2.0 * p / (1.0 + disc.sqrt())
    }
}

/// Shift to the centroid and scale to a mean distance of √2.
fn normalization_params(points: &[Point]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| (p[0] - mean_x).hypot(p[1] - mean_y))
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mean_x, mean_y, scale)
}

/// Algebraic circle (or line) fit. Returns normalized `[A, B, C, D]`.
pub(crate) fn fit_circle(points: &[Point]) -> Option<[f64; 4]> {
    if points.len() < 3 {
        return None;
    }
    let (mx, my, s) = normalization_params(points);

    let mut scatter = Matrix4::<f64>::zeros();
    for p in points {
        let u = (p[0] - mx) * s;
        let v = (p[1] - my) * s;
        let z = Vector4::new(u * u + v * v, u, v, 1.0);
        scatter += z * z.transpose();
    }
    let eig = scatter.symmetric_eigen();
    let (idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let w = eig.eigenvectors.column(idx);
    let (a_, b_, c_, d_) = (w[0], w[1], w[2], w[3]);

    // Back to unnormalized coordinates: u = s(x - mx), v = s(y - my).
    let s2 = s * s;
    let a = a_ * s2;
    let b = -2.0 * a_ * s2 * mx + b_ * s;
    let c = -2.0 * a_ * s2 * my + c_ * s;
    let d = a_ * s2 * (mx * mx + my * my) - b_ * s * mx - c_ * s * my + d_;

    let disc = b * b + c * c - 4.0 * a * d;
    if !(disc > 0.0) || !disc.is_finite() {
        return None;
    }
    let k = disc.sqrt();
    Some([a / k, b / k, c / k, d / k])
}

fn arc_length(kappa: f64, chord: f64) -> f64 {
    let half = 0.5 * kappa.abs() * chord;
    if half < 1e-9 {
        chord
    } else {
        2.0 * half.min(1.0).asin() / kappa.abs()
    }
}

/// Fit a helix to hits ordered outer → inner.
///
/// `sigma` is the transverse hit resolution used to scale the residuals.
pub fn fit_helix(points: &[Point], sigma: f64) -> Option<HelixPrefit> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let coeffs = fit_circle(points)?;
    let [a, b, c, _] = coeffs;

    let outer = points[0];
    let inner = points[n - 1];
    let travel = [outer[0] - inner[0], outer[1] - inner[1]];
    let normal = [2.0 * a * outer[0] + b, 2.0 * a * outer[1] + c];
    let tangent = [-normal[1], normal[0]];
    let sense = if tangent[0] * travel[0] + tangent[1] * travel[1] >= 0.0 {
        1.0
    } else {
        -1.0
    };
    let kappa = 2.0 * a * sense;
    let phi_outer = (sense * tangent[1]).atan2(sense * tangent[0]);

    // Transverse arc length from the innermost hit, then s = s0 + z / tanλ.
    let mut s = vec![0.0; n];
    for i in (0..n - 1).rev() {
        let chord = (points[i][0] - points[i + 1][0]).hypot(points[i][1] - points[i + 1][1]);
        s[i] = s[i + 1] + arc_length(kappa, chord);
    }
    let mean_z = points.iter().map(|p| p[2]).sum::<f64>() / n as f64;
    let mean_s = s.iter().sum::<f64>() / n as f64;
    let mut szz = 0.0;
    let mut szs = 0.0;
    for (p, si) in points.iter().zip(&s) {
        szz += (p[2] - mean_z).powi(2);
        szs += (p[2] - mean_z) * (si - mean_s);
    }
    if szz < 1e-12 {
        return None;
    }
    let slope = szs / szz;
    if slope.abs() < 1e-12 {
        return None;
    }
    let offset = mean_s - slope * mean_z;

    let prefit = HelixPrefit {
        coeffs,
        kappa,
        phi_outer,
        tan_lambda: 1.0 / slope,
        chi2: 0.0,
        ndf: 2 * n - 5,
    };
    let inv_var = 1.0 / (sigma * sigma);
    let chi2 = points
        .iter()
        .zip(&s)
        .map(|(p, si)| {
            let d = prefit.distance(p[0], p[1]);
            let r = si - offset - slope * p[2];
            (d * d + r * r) * inv_var
        })
        .sum();

    Some(HelixPrefit { chi2, ..prefit })
}

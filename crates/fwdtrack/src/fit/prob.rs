//! Chi-squared tail probability.

use statrs::function::gamma::checked_gamma_ur;

/// Probability of a chi-squared value at least `chi2` with `ndf` degrees of freedom.
///
/// Returns 0 for `ndf == 0` or non-finite `chi2`.
pub fn chi2_prob(chi2: f64, ndf: usize) -> f64 {
    if ndf == 0 || !chi2.is_finite() {
        return 0.0;
    }
    if chi2 <= 0.0 {
        return 1.0;
    }
    checked_gamma_ur(0.5 * ndf as f64, 0.5 * chi2)
        .map_or(0.0, |q| q.clamp(0.0, 1.0))
}

//! Extended Kalman filter with z as the running parameter.
//!
//! State vector `(x, y, φ, κ, tanλ)`: transverse position at the current z,
//! azimuth of the flight direction, signed curvature (1/mm, positive turns
//! counterclockwise) and `dz/ds`. Hits are filtered outer → inner, against the
//! flight direction, so material effects are added when crossing back through
//! a disk.

use nalgebra::{Matrix2, SMatrix, SVector, Vector2};

use super::helix::HelixPrefit;
use crate::criteria::geometry::{normalize_angle, Point};
use crate::criteria::pt_from_radius;

pub type StateVector = SVector<f64, 5>;
pub type Covariance = SMatrix<f64, 5, 5>;
type Gain = SMatrix<f64, 5, 2>;

const PHI: usize = 2;
const KAPPA: usize = 3;
const TAN_LAMBDA: usize = 4;

const P_MIN_GEV: f64 = 0.01;
const P_MAX_GEV: f64 = 1000.0;

/// Filter settings, extracted from the fit configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanSettings {
    pub bz: f64,
    pub sigma: f64,
    pub multiple_scattering: bool,
    pub energy_loss: bool,
    pub smoothing: bool,
    pub thickness_x0: f64,
    pub eloss_gev: f64,
}

impl From<&crate::config::FitConfig> for KalmanSettings {
    fn from(cfg: &crate::config::FitConfig) -> Self {
        Self {
            bz: cfg.bz,
            sigma: cfg.hit_resolution_mm,
            multiple_scattering: cfg.multiple_scattering,
            energy_loss: cfg.energy_loss,
            smoothing: cfg.smoothing,
            thickness_x0: cfg.layer_thickness_x0,
            eloss_gev: cfg.layer_energy_loss_gev,
        }
    }
}

/// Estimated state at one z plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSite {
    pub z: f64,
    pub state: StateVector,
    pub cov: Covariance,
}

/// Outcome of the full fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFit {
    /// One site per hit, outer → inner. Smoothed when smoothing is enabled,
    /// otherwise filtered (only the innermost site then uses every hit).
    pub sites: Vec<FitSite>,
    pub chi2: f64,
    pub ndf: usize,
    pub smoothed: bool,
}

fn sinc(u: f64) -> f64 {
    if u.abs() < 1e-8 {
        1.0 - u * u / 6.0
    } else {
        u.sin() / u
    }
}

/// Move the state by `dz` along the helix.
pub fn propagate(state: &StateVector, dz: f64) -> Option<StateVector> {
    let t = state[TAN_LAMBDA];
    if t.abs() < 1e-9 || !t.is_finite() {
        return None;
    }
    let ds = dz / t;
    let kappa = state[KAPPA];
    let half = 0.5 * kappa * ds;
    let dir = state[PHI] + half;
    let chord = ds * sinc(half);
    let mut out = *state;
    out[0] += chord * dir.cos();
    out[1] += chord * dir.sin();
    out[PHI] = normalize_angle(state[PHI] + kappa * ds);
    Some(out)
}

const JACOBIAN_STEPS: [f64; 5] = [1e-4, 1e-4, 1e-6, 1e-9, 1e-6];

/// Transport matrix of [`propagate`] by central differences.
pub fn jacobian(state: &StateVector, dz: f64) -> Option<Covariance> {
    let mut f = Covariance::zeros();
    for (j, h) in JACOBIAN_STEPS.iter().enumerate() {
        let mut plus = *state;
        let mut minus = *state;
        plus[j] += h;
        minus[j] -= h;
        let fp = propagate(&plus, dz)?;
        let fm = propagate(&minus, dz)?;
        let mut col = (fp - fm) / (2.0 * h);
        col[PHI] = normalize_angle(fp[PHI] - fm[PHI]) / (2.0 * h);
        f.set_column(j, &col);
    }
    Some(f)
}

/// Propagate state and covariance without material effects.
pub fn propagate_with_cov(
    state: &StateVector,
    cov: &Covariance,
    dz: f64,
) -> Option<(StateVector, Covariance)> {
    let f = jacobian(state, dz)?;
    let next = propagate(state, dz)?;
    Some((next, f * cov * f.transpose()))
}

/// Total momentum in GeV implied by the state, clamped to a sane range.
fn momentum(state: &StateVector, bz: f64) -> f64 {
    let kappa = state[KAPPA].abs();
    let t = state[TAN_LAMBDA];
    if kappa < 1e-12 || bz == 0.0 {
        return P_MAX_GEV;
    }
    let pt = pt_from_radius(1.0 / kappa, bz);
    (pt * (1.0 + t * t).sqrt()).clamp(P_MIN_GEV, P_MAX_GEV)
}

/// Highland multiple-scattering noise of one disk crossing.
fn scattering_noise(state: &StateVector, settings: &KalmanSettings) -> Covariance {
    let mut q = Covariance::zeros();
    let t = state[TAN_LAMBDA];
    if settings.thickness_x0 <= 0.0 || t.abs() < 1e-9 {
        return q;
    }
    let one_t2 = 1.0 + t * t;
    let x = settings.thickness_x0 * one_t2.sqrt() / t.abs();
    let p = momentum(state, settings.bz);
    let theta0 = 0.0136 / p * x.sqrt() * (1.0 + 0.038 * x.ln()).max(0.0);
    let theta2 = theta0 * theta0;
    q[(PHI, PHI)] = theta2 * one_t2;
    q[(TAN_LAMBDA, TAN_LAMBDA)] = theta2 * one_t2 * one_t2;
    q
}

/// Undo the energy lost in one disk: the particle was faster before it.
fn restore_energy(state: &mut StateVector, settings: &KalmanSettings) {
    if state[KAPPA] == 0.0 || settings.bz == 0.0 || settings.eloss_gev <= 0.0 {
        return;
    }
    let p = momentum(state, settings.bz);
    state[KAPPA] *= p / (p + settings.eloss_gev);
}

struct Step {
    predicted: StateVector,
    predicted_cov: Covariance,
    transport: Covariance,
}

/// Run the filter over hits ordered outer → inner, seeded by the pre-fit.
pub fn fit(points: &[Point], init: &HelixPrefit, settings: &KalmanSettings) -> Option<KalmanFit> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let first = points[0];
    let mut state = StateVector::from([
        first[0],
        first[1],
        init.phi_outer,
        init.kappa,
        init.tan_lambda,
    ]);
    let mut cov = Covariance::from_diagonal(&SVector::<f64, 5>::from([
        100.0, 100.0, 0.1, 1e-4, 1.0,
    ]));
    let r = Matrix2::identity() * (settings.sigma * settings.sigma);
    let h = SMatrix::<f64, 2, 5>::new(
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0,
    );

    let mut filtered: Vec<FitSite> = Vec::with_capacity(n);
    let mut steps: Vec<Step> = Vec::with_capacity(n);
    let mut chi2 = 0.0;

    for (k, p) in points.iter().enumerate() {
        if k > 0 {
            if settings.multiple_scattering {
                cov += scattering_noise(&state, settings);
            }
            if settings.energy_loss {
                restore_energy(&mut state, settings);
            }
            let dz = p[2] - points[k - 1][2];
            let f = jacobian(&state, dz)?;
            state = propagate(&state, dz)?;
            cov = f * cov * f.transpose();
            steps.push(Step {
                predicted: state,
                predicted_cov: cov,
                transport: f,
            });
        }

        let residual = Vector2::new(p[0] - state[0], p[1] - state[1]);
        let s = cov.fixed_view::<2, 2>(0, 0).into_owned() + r;
        let s_inv = s.try_inverse()?;
        let gain: Gain = cov.fixed_view::<5, 2>(0, 0).into_owned() * s_inv;
        state += gain * residual;
        state[PHI] = normalize_angle(state[PHI]);

        let i_kh = Covariance::identity() - gain * h;
        cov = i_kh * cov * i_kh.transpose() + gain * r * gain.transpose();
        chi2 += (residual.transpose() * s_inv * residual)[(0, 0)];

        filtered.push(FitSite {
            z: p[2],
            state,
            cov,
        });
    }

    if !chi2.is_finite() {
        return None;
    }

    let sites = if settings.smoothing {
        smooth(&filtered, &steps)?
    } else {
        filtered
    };
    Some(KalmanFit {
        sites,
        chi2,
        ndf: 2 * n - 5,
        smoothed: settings.smoothing,
    })
}

/// Rauch-Tung-Striebel smoother. `steps[k]` predicts site `k + 1` from site `k`.
fn smooth(filtered: &[FitSite], steps: &[Step]) -> Option<Vec<FitSite>> {
    let n = filtered.len();
    let mut out = filtered.to_vec();
    for k in (0..n - 1).rev() {
        let step = &steps[k];
        let p_pred_inv = step.predicted_cov.try_inverse()?;
        let c = filtered[k].cov * step.transport.transpose() * p_pred_inv;
        let mut diff = out[k + 1].state - step.predicted;
        diff[PHI] = normalize_angle(diff[PHI]);
        let mut state = filtered[k].state + c * diff;
        state[PHI] = normalize_angle(state[PHI]);
        let cov = filtered[k].cov + c * (out[k + 1].cov - step.predicted_cov) * c.transpose();
        out[k] = FitSite {
            z: filtered[k].z,
            state,
            cov,
        };
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::helix::fit_helix;
    use crate::test_utils::{helix_through_origin, line_through_origin, smear, sorted_outer_first};
    use approx::assert_relative_eq;
    use rand::prelude::*;

    fn settings() -> KalmanSettings {
        KalmanSettings {
            bz: 3.5,
            sigma: 0.01,
            multiple_scattering: false,
            energy_loss: false,
            smoothing: false,
            thickness_x0: 0.01,
            eloss_gev: 1e-4,
        }
    }

    #[test]
    fn propagation_is_reversible() {
        let s = StateVector::from([10.0, -3.0, 0.4, 1e-3, 3.0]);
        let there = propagate(&s, 500.0).unwrap();
        let back = propagate(&there, -500.0).unwrap();
        for i in 0..5 {
            assert_relative_eq!(back[i], s[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn propagation_follows_a_circle() {
        // kappa = 1/R; after a quarter turn the position moved by R in x and y.
        let r = 1000.0;
        let t = 2.0;
        let s = StateVector::from([0.0, 0.0, 0.0, 1.0 / r, t]);
        let dz = t * r * std::f64::consts::FRAC_PI_2;
        let out = propagate(&s, dz).unwrap();
        assert_relative_eq!(out[0], r, epsilon = 1e-9);
        assert_relative_eq!(out[1], r, epsilon = 1e-9);
        assert_relative_eq!(out[PHI], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn exact_line_has_vanishing_chi2() {
        let pts = sorted_outer_first(&line_through_origin([0.08, 0.03, 1.0], &[1, 2, 3, 4, 5]));
        let pre = fit_helix(&pts, 0.01).unwrap();
        let fit = fit(&pts, &pre, &settings()).unwrap();
        assert!(fit.chi2 < 1e-6, "chi2 = {}", fit.chi2);
        assert_eq!(fit.ndf, 5);
        let inner = fit.sites.last().unwrap();
        assert_relative_eq!(inner.state[KAPPA], 0.0, epsilon = 1e-9);
        assert_relative_eq!(inner.state[0], pts[4][0], epsilon = 1e-6);
    }

    #[test]
    fn smeared_helix_gives_reasonable_chi2() {
        let mut rng = StdRng::seed_from_u64(11);
        let truth = helix_through_origin(2.0, 3.5, 3.0, 1.1, -1.0, &[1, 2, 3, 4, 5, 6, 7]);
        let pts = sorted_outer_first(&smear(&truth, 0.01, &mut rng));
        let pre = fit_helix(&pts, 0.01).unwrap();
        let fit = fit(&pts, &pre, &settings()).unwrap();
        let prob = crate::fit::prob::chi2_prob(fit.chi2, fit.ndf);
        assert!(prob > 1e-4, "chi2 = {} ndf = {}", fit.chi2, fit.ndf);
        let kappa = fit.sites.last().unwrap().state[KAPPA];
        let r = 2.0 / (0.0003 * 3.5);
        assert_relative_eq!(kappa, -1.0 / r, max_relative = 0.05);
    }

    #[test]
    fn material_effects_keep_straight_tracks_straight() {
        let pts = sorted_outer_first(&line_through_origin([0.08, 0.03, 1.0], &[1, 2, 3, 4]));
        let pre = fit_helix(&pts, 0.01).unwrap();
        let cfg = KalmanSettings {
            multiple_scattering: true,
            energy_loss: true,
            smoothing: true,
            ..settings()
        };
        let fit = fit(&pts, &pre, &cfg).unwrap();
        assert!(fit.smoothed);
        assert!(fit.chi2 < 1e-6);
        for (site, p) in fit.sites.iter().zip(&pts) {
            assert_relative_eq!(site.state[0], p[0], epsilon = 1e-6);
            assert_relative_eq!(site.state[1], p[1], epsilon = 1e-6);
        }
    }
}

//! Track fitting and candidate finalization.
//!
//! A candidate is accepted when it has enough hits, its helix pre-fit is good
//! enough, and the chi² probability of the full Kalman fit passes the cut.
//! Rejections are reported as [`FitFailure`] values for bookkeeping; they are
//! part of normal operation.

pub mod helix;
pub mod kalman;
pub mod prob;

pub use prob::chi2_prob;

use crate::config::FitConfig;
use crate::criteria::pt_from_radius;
use crate::hits::{HitId, HitStore};
use kalman::{Covariance, KalmanSettings, StateVector};

/// Why a candidate was rejected by the finalizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitFailure {
    TooFewHits { n_hits: usize, min: usize },
    /// The pre-fit or the Kalman filter had no numerical solution.
    Degenerate,
    HelixChi2 { chi2_ndf: f64, max: f64 },
    Chi2Prob { prob: f64, min: f64 },
}

impl FitFailure {
    /// Short label for statistics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TooFewHits { .. } => "too_few_hits",
            Self::Degenerate => "degenerate",
            Self::HelixChi2 { .. } => "helix_chi2",
            Self::Chi2Prob { .. } => "chi2_prob",
        }
    }
}

impl std::fmt::Display for FitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewHits { n_hits, min } => {
                write!(f, "too few hits: {} < {}", n_hits, min)
            }
            Self::Degenerate => write!(f, "degenerate fit"),
            Self::HelixChi2 { chi2_ndf, max } => {
                write!(f, "helix chi2/ndf {:.3} > {:.3}", chi2_ndf, max)
            }
            Self::Chi2Prob { prob, min } => {
                write!(f, "chi2 probability {:.3e} < {:.3e}", prob, min)
            }
        }
    }
}

impl std::error::Error for FitFailure {}

/// Curvature (1/mm) below which a track counts as straight.
const STRAIGHT_KAPPA: f64 = 1e-12;

/// Where a track state is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStateLocation {
    AtIp,
    AtFirstHit,
    AtLastHit,
    AtCalorimeter,
}

/// Track parameters at a z plane.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackState {
    pub location: TrackStateLocation,
    /// Reference point `[x, y, z]` in mm.
    pub reference_point: [f64; 3],
    /// Azimuth of the flight direction.
    pub phi: f64,
    /// Signed curvature in 1/mm.
    pub kappa: f64,
    pub tan_lambda: f64,
    /// Lower triangle of the `(x, y, φ, κ, tanλ)` covariance, row-major.
    pub covariance: [f64; 15],
}

impl TrackState {
    fn new(location: TrackStateLocation, z: f64, state: &StateVector, cov: &Covariance) -> Self {
        let mut lower = [0.0; 15];
        let mut k = 0;
        for i in 0..5 {
            for j in 0..=i {
                lower[k] = cov[(i, j)];
                k += 1;
            }
        }
        Self {
            location,
            reference_point: [state[0], state[1], z],
            phi: state[2],
            kappa: state[3],
            tan_lambda: state[4],
            covariance: lower,
        }
    }

    /// Transverse momentum in GeV for field `bz`; infinite for a straight track.
    pub fn pt(&self, bz: f64) -> f64 {
        if self.kappa.abs() < STRAIGHT_KAPPA {
            return f64::INFINITY;
        }
        pt_from_radius(1.0 / self.kappa.abs(), bz)
    }
}

/// An accepted track before conversion to the output format.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedTrack {
    /// Hits ordered outer → inner.
    pub hits: Vec<HitId>,
    pub chi2: f64,
    pub ndf: usize,
    pub chi2_prob: f64,
    pub states: Vec<TrackState>,
    /// Hit count per input collection index.
    pub hits_per_collection: Vec<usize>,
    /// Transverse radius of the innermost hit.
    pub innermost_radius: f64,
}

impl FittedTrack {
    pub fn state(&self, location: TrackStateLocation) -> Option<&TrackState> {
        self.states.iter().find(|s| s.location == location)
    }
}

/// Fit a candidate and decide whether it becomes a track.
pub fn finalize_candidate(
    hits: &[HitId],
    store: &HitStore,
    cfg: &FitConfig,
) -> Result<FittedTrack, FitFailure> {
    let min = cfg.hits_per_track_min;
    if hits.len() < min {
        return Err(FitFailure::TooFewHits {
            n_hits: hits.len(),
            min,
        });
    }

    let points = store.positions(hits);
    let prefit =
        helix::fit_helix(&points, cfg.hit_resolution_mm).ok_or(FitFailure::Degenerate)?;
    if prefit.chi2_ndf() > cfg.helix_fit_max {
        return Err(FitFailure::HelixChi2 {
            chi2_ndf: prefit.chi2_ndf(),
            max: cfg.helix_fit_max,
        });
    }

    let settings = KalmanSettings::from(cfg);
    let fit = kalman::fit(&points, &prefit, &settings).ok_or(FitFailure::Degenerate)?;
    let prob = chi2_prob(fit.chi2, fit.ndf);
    if prob < cfg.chi2_prob_cut {
        return Err(FitFailure::Chi2Prob {
            prob,
            min: cfg.chi2_prob_cut,
        });
    }

    let states = track_states(&fit, cfg).ok_or(FitFailure::Degenerate)?;

    let mut hits_per_collection = Vec::new();
    for &id in hits {
        if let Some(src) = store.hit(id).source {
            if hits_per_collection.len() <= src.collection {
                hits_per_collection.resize(src.collection + 1, 0);
            }
            hits_per_collection[src.collection] += 1;
        }
    }
    let innermost_radius = hits.last().map_or(0.0, |&id| store.hit(id).rho());

    Ok(FittedTrack {
        hits: hits.to_vec(),
        chi2: fit.chi2,
        ndf: fit.ndf,
        chi2_prob: prob,
        states,
        hits_per_collection,
        innermost_radius,
    })
}

fn track_states(fit: &kalman::KalmanFit, cfg: &FitConfig) -> Option<Vec<TrackState>> {
    let inner = fit.sites.last()?;
    let outer_site = fit.sites.first()?;
    use TrackStateLocation as L;

    let mut states = Vec::with_capacity(4);
    let (ip, ip_cov) = kalman::propagate_with_cov(&inner.state, &inner.cov, -inner.z)?;
    states.push(TrackState::new(L::AtIp, 0.0, &ip, &ip_cov));
    states.push(TrackState::new(L::AtFirstHit, inner.z, &inner.state, &inner.cov));

    // Without smoothing only the innermost site has seen every hit.
    let (outer, outer_cov) = if fit.smoothed {
        (outer_site.state, outer_site.cov)
    } else {
        kalman::propagate_with_cov(&inner.state, &inner.cov, outer_site.z - inner.z)?
    };
    states.push(TrackState::new(L::AtLastHit, outer_site.z, &outer, &outer_cov));

    if let Some(face) = cfg.calo_face_z {
        let z = face.copysign(outer_site.z);
        let (calo, calo_cov) = kalman::propagate_with_cov(&outer, &outer_cov, z - outer_site.z)?;
        states.push(TrackState::new(L::AtCalorimeter, z, &calo, &calo_cov));
    }
    Some(states)
}

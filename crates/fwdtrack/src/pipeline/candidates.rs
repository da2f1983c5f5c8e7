//! Candidate versions with overlap hits, fitted and scored.

use std::collections::BTreeSet;

use super::EventStats;
use crate::config::TrackingConfig;
use crate::fit::{finalize_candidate, FittedTrack};
use crate::hits::{expand_candidate, HitId, HitStore, OverlapMap};

/// A fitted candidate version together with its subset quality.
#[derive(Debug, Clone)]
pub(super) struct Scored {
    pub(super) track: FittedTrack,
    pub(super) quality: f64,
}

impl Scored {
    pub(super) fn shares_hit_with(&self, other: &Scored) -> bool {
        self.track.hits.iter().any(|h| other.track.hits.contains(h))
    }
}

/// Best version first: higher quality, then more hits, then lower version index.
fn better(a: &(usize, Scored), b: &(usize, Scored)) -> bool {
    let (ia, sa) = a;
    let (ib, sb) = b;
    sa.quality
        .total_cmp(&sb.quality)
        .then(sa.track.hits.len().cmp(&sb.track.hits.len()))
        .then(ib.cmp(ia))
        .is_gt()
}

/// Expand every candidate with its overlap hits and fit each version.
///
/// With `take_best_version` only the best accepted version of each candidate
/// is kept. Versions of one candidate with identical hit sets are fitted once.
pub(super) fn fit_candidates(
    candidates: &[Vec<HitId>],
    store: &HitStore,
    overlaps: &OverlapMap,
    cfg: &TrackingConfig,
    stats: &mut EventStats,
) -> Vec<Scored> {
    let mut out = Vec::new();

    for candidate in candidates {
        let mut seen: BTreeSet<Vec<HitId>> = BTreeSet::new();
        let versions = expand_candidate(candidate, overlaps, store, cfg.overlap.max_added_hits);
        stats.overlap_versions += versions.len() - 1;

        let mut best: Option<(usize, Scored)> = None;
        for (v, hits) in versions.into_iter().enumerate() {
            let mut key = hits.clone();
            key.sort_unstable();
            if !seen.insert(key) {
                continue;
            }
            let track = match finalize_candidate(&hits, store, &cfg.fit) {
                Ok(t) => t,
                Err(failure) => {
                    tracing::trace!(
                        version = v,
                        n_hits = hits.len(),
                        reason = failure.label(),
                        %failure,
                        "candidate rejected"
                    );
                    stats.fit_failures.record(&failure);
                    continue;
                }
            };
            let quality = cfg.subset.quality.score(track.chi2_prob, track.hits.len());
            let scored = (v, Scored { track, quality });
            if !cfg.overlap.take_best_version {
                out.push(scored.1);
                continue;
            }
            match &best {
                Some(current) if !better(&scored, current) => {}
                _ => best = Some(scored),
            }
        }
        if let Some((_, scored)) = best {
            out.push(scored);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::build_overlap_map;
    use crate::sector::SectorSystem;
    use crate::test_utils::{line_through_origin, store_with_ip};

    fn scored(n_hits: usize, quality: f64) -> Scored {
        Scored {
            track: FittedTrack {
                hits: (0..n_hits).map(HitId).collect(),
                chi2: 0.0,
                ndf: 1,
                chi2_prob: quality,
                states: Vec::new(),
                hits_per_collection: Vec::new(),
                innermost_radius: 0.0,
            },
            quality,
        }
    }

    #[test]
    fn best_version_ordering() {
        assert!(better(&(1, scored(3, 0.9)), &(0, scored(4, 0.5))));
        assert!(better(&(1, scored(4, 0.5)), &(0, scored(3, 0.5))));
        assert!(better(&(0, scored(3, 0.5)), &(1, scored(3, 0.5))));
        assert!(!better(&(1, scored(3, 0.5)), &(0, scored(3, 0.5))));
    }

    #[test]
    fn each_candidate_keeps_its_own_best_version() {
        let sys = SectorSystem::new(6, 4, 1);
        let store = store_with_ip(&sys, &line_through_origin([0.1, 0.05, 1.0], &[1, 2, 3, 4]));
        let cfg = TrackingConfig::default();
        let overlaps = build_overlap_map(&store, &sys, cfg.overlap.dist_max);
        let candidate = vec![HitId(3), HitId(2), HitId(1), HitId(0)];

        let mut stats = EventStats::default();
        let out = fit_candidates(
            &[candidate.clone(), candidate.clone()],
            &store,
            &overlaps,
            &cfg,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].track.hits, candidate);
        assert_eq!(out[1].track.hits, candidate);
    }
}

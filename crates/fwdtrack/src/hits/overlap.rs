//! Overlap-region hits.
//!
//! Neighbouring sensor modules overlap slightly, so a particle crossing such a
//! region leaves two close-by hits on the same disk. The automaton only ever
//! uses one hit per layer; the second one is added back afterwards as an
//! alternative candidate version.

use std::collections::{BTreeMap, BTreeSet};

use super::{HitId, HitStore};
use crate::sector::{SectorLocation, SectorSystem};

/// Front hit → back hits it overlaps with.
#[derive(Debug, Clone, Default)]
pub struct OverlapMap {
    edges: BTreeMap<HitId, Vec<HitId>>,
}

impl OverlapMap {
    pub fn back_hits(&self, front: HitId) -> &[HitId] {
        self.edges.get(&front).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of front → back edges.
    pub fn n_pairs(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn neighbouring(a: &SectorLocation, b: &SectorLocation, n_phi: u32) -> bool {
    if a.side != b.side || a.layer != b.layer {
        return false;
    }
    let dphi = a.phi.abs_diff(b.phi);
    let phi_ok = dphi <= 1 || dphi == n_phi - 1;
    phi_ok && a.theta.abs_diff(b.theta) <= 1
}

/// Find every pair of overlapping hits among the bucketed, non-virtual hits.
///
/// The hit with the smaller `|z|` is the front hit; on equal `|z|` the lower
/// arena index is.
pub fn build_overlap_map(store: &HitStore, sectors: &SectorSystem, dist_max: f64) -> OverlapMap {
    let mut by_disk: BTreeMap<(i8, u32), Vec<(HitId, SectorLocation)>> = BTreeMap::new();
    for (sector, ids) in store.sectors() {
        let Ok(loc) = sectors.locate(sector) else {
            continue;
        };
        for &id in ids {
            if store.hit(id).is_virtual() {
                continue;
            }
            by_disk.entry((loc.side, loc.layer)).or_default().push((id, loc));
        }
    }

    let mut edges: BTreeMap<HitId, Vec<HitId>> = BTreeMap::new();
    for hits in by_disk.values() {
        for (i, (a, loc_a)) in hits.iter().enumerate() {
            for (b, loc_b) in &hits[i + 1..] {
                if !neighbouring(loc_a, loc_b, sectors.n_divisions_phi()) {
                    continue;
                }
                let ha = store.hit(*a);
                let hb = store.hit(*b);
                if ha.distance_to(hb) > dist_max {
                    continue;
                }
                let a_front = (ha.z().abs(), *a) < (hb.z().abs(), *b);
                let (front, back) = if a_front { (*a, *b) } else { (*b, *a) };
                edges.entry(front).or_default().push(back);
            }
        }
    }
    for backs in edges.values_mut() {
        backs.sort_unstable();
    }

    tracing::debug!(
        n_pairs = edges.values().map(Vec::len).sum::<usize>(),
        "overlap map built"
    );
    OverlapMap { edges }
}

/// All versions of a candidate obtained by adding subsets of its overlap hits.
///
/// Version 0 is the unmodified candidate. At most `max_added` back hits are
/// considered (the first ones in outer → inner candidate order), giving
/// `2^k` versions. Every version is sorted outer → inner by `|z|`.
pub fn expand_candidate(
    candidate: &[HitId],
    map: &OverlapMap,
    store: &HitStore,
    max_added: usize,
) -> Vec<Vec<HitId>> {
    let present: BTreeSet<HitId> = candidate.iter().copied().collect();
    let mut extra: Vec<HitId> = Vec::new();
    for &id in candidate {
        for &back in map.back_hits(id) {
            if !present.contains(&back) && !extra.contains(&back) {
                extra.push(back);
            }
        }
    }
    if extra.len() > max_added {
        tracing::debug!(
            available = extra.len(),
            max_added,
            "capping overlap hits for candidate"
        );
        extra.truncate(max_added);
    }

    let n_versions = 1usize << extra.len();
    let mut versions = Vec::with_capacity(n_versions);
    for mask in 0..n_versions {
        let mut hits = candidate.to_vec();
        for (bit, &back) in extra.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                hits.push(back);
            }
        }
        if mask != 0 {
            sort_outer_to_inner(&mut hits, store);
        }
        versions.push(hits);
    }
    versions
}

fn sort_outer_to_inner(hits: &mut [HitId], store: &HitStore) {
    hits.sort_by(|a, b| {
        let za = store.hit(*a).z().abs();
        let zb = store.hit(*b).z().abs();
        zb.total_cmp(&za).then(a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::{Hit, HitRef};

    fn store_from(sys: &SectorSystem, points: &[(u32, [f64; 3])]) -> HitStore {
        let hits = points
            .iter()
            .enumerate()
            .map(|(i, &(layer, p))| Hit {
                position: p,
                sector: sys.sector_from_position(1, layer, p).unwrap(),
                source: Some(HitRef {
                    collection: 0,
                    index: i,
                }),
            })
            .collect();
        HitStore::build(hits, 100)
    }

    #[test]
    fn close_hits_on_one_disk_overlap_front_to_back() {
        let sys = SectorSystem::new(5, 8, 2);
        let store = store_from(
            &sys,
            &[
                (2, [50.0, 10.0, 400.0]),
                (2, [51.0, 10.5, 402.0]),
                (2, [-50.0, -10.0, 400.0]),
                (3, [50.0, 10.0, 500.0]),
            ],
        );
        let map = build_overlap_map(&store, &sys, 3.5);
        assert_eq!(map.n_pairs(), 1);
        assert_eq!(map.back_hits(HitId(0)), &[HitId(1)]);
        assert!(map.back_hits(HitId(1)).is_empty());
    }

    #[test]
    fn distance_cut_is_inclusive() {
        let sys = SectorSystem::new(3, 4, 1);
        let store = store_from(&sys, &[(1, [20.0, 0.0, 300.0]), (1, [20.0, 0.0, 303.0])]);
        assert_eq!(build_overlap_map(&store, &sys, 3.0).n_pairs(), 1);
        assert_eq!(build_overlap_map(&store, &sys, 2.9).n_pairs(), 0);
    }

    #[test]
    fn phi_adjacency_wraps_around() {
        let sys = SectorSystem::new(3, 8, 1);
        // Just below and just above phi = 0: divisions 7 and 0.
        let store = store_from(&sys, &[(1, [40.0, -0.5, 300.0]), (1, [40.0, 0.5, 301.0])]);
        let a = sys.phi(store.hit(HitId(0)).sector).unwrap();
        let b = sys.phi(store.hit(HitId(1)).sector).unwrap();
        assert_eq!((a, b), (7, 0));
        assert_eq!(build_overlap_map(&store, &sys, 3.5).n_pairs(), 1);
    }

    #[test]
    fn expansion_enumerates_all_subsets() {
        let sys = SectorSystem::new(5, 8, 2);
        let store = store_from(
            &sys,
            &[
                (3, [30.0, 0.0, 600.0]),
                (2, [20.0, 0.0, 400.0]),
                (1, [10.0, 0.0, 200.0]),
                (2, [20.5, 0.5, 401.0]),
            ],
        );
        let map = build_overlap_map(&store, &sys, 3.5);
        let candidate = vec![HitId(0), HitId(1), HitId(2)];
        let versions = expand_candidate(&candidate, &map, &store, 8);
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0], candidate);
        assert_eq!(versions[1], vec![HitId(0), HitId(3), HitId(1), HitId(2)]);
    }

    #[test]
    fn expansion_respects_cap() {
        let sys = SectorSystem::new(5, 8, 2);
        let store = store_from(
            &sys,
            &[
                (2, [20.0, 0.0, 400.0]),
                (2, [20.5, 0.0, 401.0]),
                (2, [20.0, 0.5, 401.5]),
            ],
        );
        let map = build_overlap_map(&store, &sys, 3.5);
        assert_eq!(map.back_hits(HitId(0)).len(), 2);
        assert_eq!(expand_candidate(&[HitId(0)], &map, &store, 8).len(), 4);
        assert_eq!(expand_candidate(&[HitId(0)], &map, &store, 1).len(), 2);
        assert_eq!(expand_candidate(&[HitId(0)], &map, &store, 0).len(), 1);
    }
}

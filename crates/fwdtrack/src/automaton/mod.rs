//! Cellular automaton over segments.
//!
//! Segments of one generation all have the same number of hits, ordered
//! outer → inner. A link parent → child means the child continues the parent
//! one hit further inwards (`child.hits == parent.hits[1..] + [new]`).
//!
//! Each generation is reduced to the segments that can reach a virtual IP hit
//! before it is lengthened by one hit. The surviving root-to-IP paths of the
//! last generation are the track candidates.

mod builder;

pub use builder::{LayerConnector, SegmentGraphBuilder};

use crate::config::{AutomatonConfig, ExtendedCriteriaPolicy};
use crate::criteria::{CriteriaContext, CriteriaSet, CriterionError};
use crate::hits::{HitId, HitStore};
use crate::sector::SectorError;

/// Errors raised while building or growing the segment graph.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomatonError {
    /// The connection budget was exceeded.
    CombinatorialOverflow {
        connections: usize,
        max_connections: usize,
    },
    /// A criterion was applied to segments it cannot handle.
    Criterion(CriterionError),
    /// A hit carried an invalid sector id.
    Sector(SectorError),
}

impl std::fmt::Display for AutomatonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CombinatorialOverflow {
                connections,
                max_connections,
            } => write!(
                f,
                "too many connections: {} > {}",
                connections, max_connections
            ),
            Self::Criterion(e) => write!(f, "criterion error: {}", e),
            Self::Sector(e) => write!(f, "sector error: {}", e),
        }
    }
}

impl std::error::Error for AutomatonError {}

impl From<CriterionError> for AutomatonError {
    fn from(e: CriterionError) -> Self {
        Self::Criterion(e)
    }
}

impl From<SectorError> for AutomatonError {
    fn from(e: SectorError) -> Self {
        Self::Sector(e)
    }
}

/// A partial track hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Hits ordered outer → inner.
    pub hits: Vec<HitId>,
    /// Outer neighbours.
    pub parents: Vec<usize>,
    /// Inner neighbours.
    pub children: Vec<usize>,
    /// Longest number of links to a segment ending on the IP.
    pub state: Option<u32>,
    terminal: bool,
}

impl Segment {
    pub(crate) fn new(hits: Vec<HitId>, terminal: bool) -> Self {
        Self {
            hits,
            parents: Vec::new(),
            children: Vec::new(),
            state: None,
            terminal,
        }
    }

    /// Whether the innermost hit is a virtual IP hit.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// Summary of one automaton run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthSummary {
    /// Number of lengthening steps performed.
    pub generations: usize,
    /// Largest number of connections seen in any generation.
    pub peak_connections: usize,
    /// Segments removed by pruning, summed over generations.
    pub pruned: usize,
}

/// Segment arena of one event.
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    segments: Vec<Segment>,
    segment_len: usize,
}

impl Automaton {
    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        let segment_len = segments.first().map_or(0, |s| s.hits.len());
        Self {
            segments,
            segment_len,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn n_connections(&self) -> usize {
        self.segments.iter().map(|s| s.children.len()).sum()
    }

    /// Hits per segment in the current generation.
    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Recompute the state of every segment.
    ///
    /// Terminal segments get state 0, every other segment one more than its
    /// best child. Segments that cannot reach the IP keep `None`. Returns the
    /// number of update sweeps, which never exceeds `n_segments + 1`.
    pub fn update_states(&mut self) -> usize {
        for seg in &mut self.segments {
            seg.state = seg.terminal.then_some(0);
        }
        let max_sweeps = self.segments.len() + 1;
        for sweep in 1..=max_sweeps {
            let mut changed = false;
            for i in 0..self.segments.len() {
                if self.segments[i].terminal {
                    continue;
                }
                let best = self.segments[i]
                    .children
                    .iter()
                    .filter_map(|&c| self.segments[c].state)
                    .max()
                    .map(|s| s + 1);
                if best != self.segments[i].state {
                    self.segments[i].state = best;
                    changed = true;
                }
            }
            if !changed {
                return sweep;
            }
        }
        max_sweeps
    }

    /// Drop every segment without a state and compact the arena.
    ///
    /// Returns the number of removed segments.
    pub fn prune(&mut self) -> usize {
        let mut remap = vec![usize::MAX; self.segments.len()];
        let mut kept = 0usize;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.state.is_some() {
                remap[i] = kept;
                kept += 1;
            }
        }
        let removed = self.segments.len() - kept;
        if removed == 0 {
            return 0;
        }

        let old = std::mem::take(&mut self.segments);
        self.segments = old
            .into_iter()
            .filter(|s| s.state.is_some())
            .map(|mut s| {
                s.parents = s
                    .parents
                    .iter()
                    .map(|&p| remap[p])
                    .filter(|&p| p != usize::MAX)
                    .collect();
                s.children = s
                    .children
                    .iter()
                    .map(|&c| remap[c])
                    .filter(|&c| c != usize::MAX)
                    .collect();
                s
            })
            .collect();
        removed
    }

    /// Replace the generation by segments one hit longer, one per link, and
    /// link the new segments that pass the criteria for their length.
    ///
    /// Returns the number of new links.
    pub fn lengthen(
        &mut self,
        store: &HitStore,
        criteria: &CriteriaSet,
        ctx: &CriteriaContext,
        extended: ExtendedCriteriaPolicy,
        max_connections: Option<usize>,
    ) -> Result<usize, AutomatonError> {
        let old = std::mem::take(&mut self.segments);
        let mut segments = Vec::with_capacity(old.iter().map(|s| s.children.len()).sum());
        // New segments grouped by the old segment they start from.
        let mut starting_at: Vec<Vec<usize>> = vec![Vec::new(); old.len()];
        let mut continued_by: Vec<usize> = Vec::new();
        for (p, parent) in old.iter().enumerate() {
            for &c in &parent.children {
                let child = &old[c];
                let Some(&last) = child.hits.last() else {
                    continue;
                };
                let mut hits = parent.hits.clone();
                hits.push(last);
                starting_at[p].push(segments.len());
                continued_by.push(c);
                segments.push(Segment::new(hits, child.terminal));
            }
        }
        self.segment_len += 1;
        let len = self.segment_len;

        let mut n_connections = 0usize;
        for n1 in 0..segments.len() {
            let outer = store.positions(&segments[n1].hits);
            for &n2 in &starting_at[continued_by[n1]] {
                let inner = store.positions(&segments[n2].hits);
                let ok = if len <= 3 {
                    criteria.are_compatible(&outer, &inner, ctx)?
                } else {
                    match extended {
                        ExtendedCriteriaPolicy::AcceptAll => true,
                        ExtendedCriteriaPolicy::ReuseFourHit => {
                            // Consecutive 4-hit windows passed in earlier generations;
                            // span the link with its two outermost and two innermost hits.
                            let parent = [outer[0], outer[1], inner[len - 2]];
                            let child = [outer[1], inner[len - 2], inner[len - 1]];
                            criteria.are_compatible(&parent, &child, ctx)?
                        }
                    }
                };
                if !ok {
                    continue;
                }
                segments[n1].children.push(n2);
                segments[n2].parents.push(n1);
                n_connections += 1;
                if let Some(max) = max_connections {
                    if n_connections > max {
                        return Err(AutomatonError::CombinatorialOverflow {
                            connections: n_connections,
                            max_connections: max,
                        });
                    }
                }
            }
        }

        self.segments = segments;
        Ok(n_connections)
    }

    /// Alternate state updates, pruning and lengthening until the segments
    /// reach `cfg.max_segment_hits` hits or a generation forms no link.
    pub fn grow(
        &mut self,
        store: &HitStore,
        criteria: &CriteriaSet,
        ctx: &CriteriaContext,
        cfg: &AutomatonConfig,
        max_connections: Option<usize>,
    ) -> Result<GrowthSummary, AutomatonError> {
        let mut summary = GrowthSummary {
            peak_connections: self.n_connections(),
            ..Default::default()
        };
        self.update_states();
        summary.pruned += self.prune();

        while self.segment_len < cfg.max_segment_hits {
            let n = self.lengthen(store, criteria, ctx, cfg.extended_criteria, max_connections)?;
            summary.generations += 1;
            summary.peak_connections = summary.peak_connections.max(n);
            self.update_states();
            summary.pruned += self.prune();
            tracing::debug!(
                segment_len = self.segment_len,
                n_segments = self.segments.len(),
                n_connections = n,
                "automaton generation"
            );
            if n == 0 {
                break;
            }
        }
        Ok(summary)
    }

    /// Every path from a root segment down to a terminal one, as hits ordered
    /// outer → inner with the IP hit removed.
    pub fn track_candidates(&self) -> Vec<Vec<HitId>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.parents.is_empty() && seg.state.is_some() {
                path.clear();
                self.collect_paths(i, &mut path, &mut out);
            }
        }
        out
    }

    fn collect_paths(&self, idx: usize, path: &mut Vec<usize>, out: &mut Vec<Vec<HitId>>) {
        path.push(idx);
        let seg = &self.segments[idx];
        if seg.terminal {
            let hits = self.path_hits(path);
            if !hits.is_empty() {
                out.push(hits);
            }
        } else {
            for &c in &seg.children {
                self.collect_paths(c, path, out);
            }
        }
        path.pop();
    }

    fn path_hits(&self, path: &[usize]) -> Vec<HitId> {
        let mut hits = self.segments[path[0]].hits.clone();
        for &i in &path[1..] {
            if let Some(&last) = self.segments[i].hits.last() {
                hits.push(last);
            }
        }
        // The terminal hit is the virtual IP hit.
        hits.pop();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::SectorSystem;
    use crate::test_utils::{line_through_origin, store_with_ip};

    fn run(
        store: &HitStore,
        sys: &SectorSystem,
        connector: LayerConnector,
        cfg: &AutomatonConfig,
    ) -> Result<Automaton, AutomatonError> {
        run_with(store, sys, connector, cfg, &CriteriaSet::default())
    }

    fn run_with(
        store: &HitStore,
        sys: &SectorSystem,
        connector: LayerConnector,
        cfg: &AutomatonConfig,
        criteria: &CriteriaSet,
    ) -> Result<Automaton, AutomatonError> {
        let ctx = CriteriaContext::default();
        let mut aut = SegmentGraphBuilder::new(sys, connector).build(
            store,
            criteria,
            &ctx,
            Some(cfg.max_connections),
        )?;
        aut.grow(store, criteria, &ctx, cfg, Some(cfg.max_connections))?;
        Ok(aut)
    }

    #[test]
    fn single_straight_track_gives_one_candidate() {
        let sys = SectorSystem::new(5, 4, 1);
        let points = line_through_origin([0.05, 0.02, 1.0], &[1, 2, 3, 4]);
        let store = store_with_ip(&sys, &points);
        let aut = run(&store, &sys, LayerConnector::new(1, 1), &AutomatonConfig::default()).unwrap();
        assert_eq!(aut.segment_len(), 3);
        let cands = aut.track_candidates();
        assert_eq!(cands, vec![vec![HitId(3), HitId(2), HitId(1), HitId(0)]]);
    }

    #[test]
    fn segments_that_cannot_reach_the_ip_are_pruned() {
        let sys = SectorSystem::new(5, 4, 1);
        // Layer 2 is empty, so the hits in layers 3 and 4 are disconnected.
        let points = line_through_origin([0.05, 0.02, 1.0], &[1, 3, 4]);
        let store = store_with_ip(&sys, &points);
        let aut = run(&store, &sys, LayerConnector::new(1, 1), &AutomatonConfig::default()).unwrap();
        assert!(aut.segments().iter().all(|s| s.state.is_some()));
        for cand in aut.track_candidates() {
            assert_eq!(cand, vec![HitId(0)]);
        }
    }

    #[test]
    fn connection_budget_is_enforced() {
        let sys = SectorSystem::new(5, 4, 1);
        let mut points = Vec::new();
        for k in 0..6 {
            let dir = [0.01 * k as f64, 0.02, 1.0];
            points.extend(line_through_origin(dir, &[1, 2, 3, 4]));
        }
        let store = store_with_ip(&sys, &points);
        let cfg = AutomatonConfig {
            max_connections: 20,
            ..Default::default()
        };
        let err = run(&store, &sys, LayerConnector::new(2, 2), &cfg).unwrap_err();
        assert!(matches!(
            err,
            AutomatonError::CombinatorialOverflow {
                max_connections: 20,
                ..
            }
        ));
    }

    #[test]
    fn growth_terminates_on_dense_random_events() {
        use rand::prelude::*;
        let sys = SectorSystem::new(6, 4, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<(u32, [f64; 3])> = (0..60)
            .map(|_| {
                let layer = rng.gen_range(1..6u32);
                let z = crate::test_utils::disk_z(layer);
                let r = rng.gen_range(40.0..300.0);
                let phi = rng.gen_range(0.0..std::f64::consts::TAU);
                (layer, [r * phi.cos(), r * phi.sin(), z])
            })
            .collect();
        let store = store_with_ip(&sys, &points);
        let cfg = AutomatonConfig {
            max_segment_hits: 4,
            max_connections: usize::MAX,
            ..Default::default()
        };
        let aut = run(&store, &sys, LayerConnector::new(2, 3), &cfg).unwrap();
        assert!(aut.segment_len() <= 4);
        for cand in aut.track_candidates() {
            let layers: Vec<u32> = cand
                .iter()
                .map(|&id| sys.layer(store.hit(id).sector).unwrap())
                .collect();
            assert!(layers.windows(2).all(|w| w[0] > w[1]), "{:?}", layers);
            assert!(layers.iter().all(|&l| l > 0));
        }
    }

    #[test]
    fn long_links_reuse_four_hit_criteria_on_request() {
        use crate::criteria::{Criterion, CriterionName};

        // Hits b, c, d are collinear in xy, so every consecutive 4-hit window
        // has a zero zig-zag product. The chain bends one way at its outer end
        // and the other way into the IP.
        let sys = SectorSystem::new(5, 4, 1);
        let points = vec![
            (4, [40.0, 1.0, crate::test_utils::disk_z(4)]),
            (3, [30.0, 2.0, crate::test_utils::disk_z(3)]),
            (2, [20.0, 1.0, crate::test_utils::disk_z(2)]),
            (1, [10.0, 0.0, crate::test_utils::disk_z(1)]),
        ];
        let store = store_with_ip(&sys, &points);
        let criteria = CriteriaSet::new(vec![Criterion::new(CriterionName::NoZigZag, 0.0, 1e9)]);

        let accept_all = AutomatonConfig {
            max_segment_hits: 4,
            ..Default::default()
        };
        let aut = run_with(&store, &sys, LayerConnector::new(1, 1), &accept_all, &criteria).unwrap();
        assert_eq!(aut.segment_len(), 4);
        assert_eq!(
            aut.track_candidates(),
            vec![vec![HitId(0), HitId(1), HitId(2), HitId(3)]]
        );

        let reuse = AutomatonConfig {
            extended_criteria: ExtendedCriteriaPolicy::ReuseFourHit,
            ..accept_all
        };
        let aut = run_with(&store, &sys, LayerConnector::new(1, 1), &reuse, &criteria).unwrap();
        assert_eq!(aut.n_connections(), 0);
        assert_eq!(aut.track_candidates(), vec![vec![HitId(1), HitId(2), HitId(3)]]);
    }

    #[test]
    fn state_updates_are_bounded() {
        let sys = SectorSystem::new(5, 4, 1);
        let points = line_through_origin([0.05, 0.02, 1.0], &[1, 2, 3, 4]);
        let store = store_with_ip(&sys, &points);
        let mut aut = SegmentGraphBuilder::new(&sys, LayerConnector::new(1, 1))
            .build(&store, &CriteriaSet::default(), &CriteriaContext::default(), None)
            .unwrap();
        let sweeps = aut.update_states();
        assert!(sweeps <= aut.n_segments() + 1);
        let max_state = aut.segments().iter().filter_map(|s| s.state).max();
        assert_eq!(max_state, Some(4));
        assert!(aut
            .segments()
            .iter()
            .filter(|s| s.is_terminal())
            .all(|s| s.state == Some(0)));
    }
}

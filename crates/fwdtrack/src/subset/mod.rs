//! Best non-conflicting subset of track candidates.
//!
//! Items conflict when the compatibility predicate says so (for tracks: they
//! share a hit). Every strategy except [`SubsetStrategy::None`] returns a
//! pairwise compatible set of accepted items.

mod exact;
mod hopfield;

pub use exact::select_exact;
pub use hopfield::select_hopfield;

use crate::config::SubsetConfig;

/// Subset search method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsetStrategy {
    /// Hopfield neural network relaxation.
    #[default]
    #[serde(rename = "neural")]
    HopfieldNn,
    /// Highest quality first, skipping anything that conflicts.
    Greedy,
    /// Branch and bound; falls back to greedy above `exact_max_items`.
    Exact,
    /// Accept everything, conflicts included.
    None,
}

impl SubsetStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HopfieldNn => "neural",
            Self::Greedy => "greedy",
            Self::Exact => "exact",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for SubsetStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubsetStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neural" | "hopfield" => Ok(Self::HopfieldNn),
            "greedy" => Ok(Self::Greedy),
            "exact" => Ok(Self::Exact),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown subset strategy '{}' (expected neural, greedy, exact or none)",
                other
            )),
        }
    }
}

/// Track quality indicator in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackQuality {
    /// The chi² probability.
    #[default]
    Chi2Prob,
    /// 3-hit tracks mapped into `[0, 0.5]`, longer ones into `[0.5, 1]`.
    Chi2ProbSpecial,
    /// Hit count first, chi² probability as tie-break.
    HitCount,
}

impl TrackQuality {
    pub fn score(&self, chi2_prob: f64, n_hits: usize) -> f64 {
        let p = chi2_prob.clamp(0.0, 1.0);
        match self {
            Self::Chi2Prob => p,
            Self::Chi2ProbSpecial => {
                if n_hits > 3 {
                    0.5 * p + 0.5
                } else {
                    0.5 * p
                }
            }
            Self::HitCount => {
                let n = n_hits as f64 + p;
                if n > 0.0 {
                    1.0 - 1.0 / (1.0 + n)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Accepted and rejected items, each in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetSelection<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<T>,
}

/// Symmetric conflict adjacency over item indices.
#[derive(Debug, Clone, Default)]
pub struct Conflicts {
    adjacency: Vec<Vec<usize>>,
}

impl Conflicts {
    pub fn build<T>(items: &[T], compatible: impl Fn(&T, &T) -> bool) -> Self {
        let mut adjacency = vec![Vec::new(); items.len()];
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if !compatible(&items[i], &items[j]) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        Self { adjacency }
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn of(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }

    pub fn n_pairs(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}

/// Indices ordered by quality, highest first; ties keep input order.
pub(crate) fn by_quality(quality: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..quality.len()).collect();
    order.sort_by(|&a, &b| quality[b].total_cmp(&quality[a]).then(a.cmp(&b)));
    order
}

/// Walk `order` and keep every index compatible with those already kept.
pub(crate) fn admit_in_order(
    order: impl IntoIterator<Item = usize>,
    conflicts: &Conflicts,
    keep: &mut [bool],
) {
    for i in order {
        if keep[i] {
            continue;
        }
        if conflicts.of(i).iter().all(|&j| !keep[j]) {
            keep[i] = true;
        }
    }
}

/// Greedy selection by descending quality.
pub fn select_greedy(quality: &[f64], conflicts: &Conflicts) -> Vec<bool> {
    let mut keep = vec![false; quality.len()];
    admit_in_order(by_quality(quality), conflicts, &mut keep);
    keep
}

/// Select a subset of `items` according to `cfg.strategy`.
pub fn select_subset<T>(
    items: Vec<T>,
    quality: impl Fn(&T) -> f64,
    compatible: impl Fn(&T, &T) -> bool,
    cfg: &SubsetConfig,
) -> SubsetSelection<T> {
    if items.is_empty() {
        return SubsetSelection {
            accepted: Vec::new(),
            rejected: Vec::new(),
        };
    }
    if cfg.strategy == SubsetStrategy::None {
        return SubsetSelection {
            accepted: items,
            rejected: Vec::new(),
        };
    }

    let scores: Vec<f64> = items.iter().map(&quality).collect();
    let conflicts = Conflicts::build(&items, compatible);
    tracing::debug!(
        n_items = items.len(),
        n_conflicts = conflicts.n_pairs(),
        strategy = %cfg.strategy,
        "selecting track subset"
    );

    let keep = if conflicts.n_pairs() == 0 {
        vec![true; items.len()]
    } else {
        match cfg.strategy {
            SubsetStrategy::HopfieldNn => select_hopfield(&scores, &conflicts, &cfg.hopfield),
            SubsetStrategy::Exact if items.len() <= cfg.exact_max_items => {
                select_exact(&scores, &conflicts)
            }
            SubsetStrategy::Exact => {
                tracing::debug!(
                    n_items = items.len(),
                    exact_max_items = cfg.exact_max_items,
                    "too many items for exact search, using greedy"
                );
                select_greedy(&scores, &conflicts)
            }
            SubsetStrategy::Greedy | SubsetStrategy::None => select_greedy(&scores, &conflicts),
        }
    };

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (item, k) in items.into_iter().zip(keep) {
        if k {
            accepted.push(item);
        } else {
            rejected.push(item);
        }
    }
    SubsetSelection { accepted, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    type Item = (Vec<usize>, f64);

    fn shares_nothing(a: &Item, b: &Item) -> bool {
        a.0.iter().all(|h| !b.0.contains(h))
    }

    fn run(items: Vec<Item>, strategy: SubsetStrategy) -> SubsetSelection<Item> {
        let cfg = SubsetConfig {
            strategy,
            ..Default::default()
        };
        select_subset(items, |t| t.1, shares_nothing, &cfg)
    }

    fn assert_disjoint(sel: &SubsetSelection<Item>) {
        for (i, a) in sel.accepted.iter().enumerate() {
            for b in &sel.accepted[i + 1..] {
                assert!(shares_nothing(a, b), "{:?} and {:?} conflict", a, b);
            }
        }
    }

    #[test]
    fn quality_functions() {
        assert_relative_eq!(TrackQuality::Chi2Prob.score(0.3, 3), 0.3);
        assert_relative_eq!(TrackQuality::Chi2ProbSpecial.score(0.3, 3), 0.15);
        assert_relative_eq!(TrackQuality::Chi2ProbSpecial.score(0.3, 4), 0.65);
        assert!(TrackQuality::Chi2ProbSpecial.score(0.01, 4) > TrackQuality::Chi2ProbSpecial.score(0.99, 3));
        assert!(TrackQuality::HitCount.score(0.0, 5) > TrackQuality::HitCount.score(0.9, 4));
        assert!(TrackQuality::HitCount.score(0.5, 4) > TrackQuality::HitCount.score(0.2, 4));
    }

    #[test]
    fn strategy_names() {
        for s in [
            SubsetStrategy::HopfieldNn,
            SubsetStrategy::Greedy,
            SubsetStrategy::Exact,
            SubsetStrategy::None,
        ] {
            assert_eq!(s.as_str().parse::<SubsetStrategy>(), Ok(s));
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
        assert!("best".parse::<SubsetStrategy>().is_err());
    }

    #[test]
    fn two_tracks_sharing_a_hit() {
        let items = vec![(vec![1, 2, 3, 4], 0.4), (vec![4, 5, 6, 7], 0.9)];
        for strategy in [
            SubsetStrategy::HopfieldNn,
            SubsetStrategy::Greedy,
            SubsetStrategy::Exact,
        ] {
            let sel = run(items.clone(), strategy);
            assert_eq!(sel.accepted.len(), 1, "{}", strategy);
            assert_eq!(sel.rejected.len(), 1);
        }
        let sel = run(items, SubsetStrategy::None);
        assert_eq!(sel.accepted.len(), 2);
        assert!(sel.rejected.is_empty());
    }

    #[test]
    fn greedy_prefers_quality_exact_prefers_total() {
        // The best item blocks two good ones.
        let items = vec![
            (vec![1, 2], 0.9),
            (vec![1, 5], 0.6),
            (vec![2, 6], 0.6),
        ];
        let greedy = run(items.clone(), SubsetStrategy::Greedy);
        assert_eq!(greedy.accepted, vec![(vec![1, 2], 0.9)]);
        let exact = run(items, SubsetStrategy::Exact);
        assert_eq!(exact.accepted.len(), 2);
        assert_eq!(exact.rejected, vec![(vec![1, 2], 0.9)]);
    }

    #[test]
    fn compatible_items_are_all_kept() {
        let items = vec![(vec![1], 0.1), (vec![2], 0.2), (vec![3], 0.0)];
        for strategy in [SubsetStrategy::HopfieldNn, SubsetStrategy::Greedy] {
            let sel = run(items.clone(), strategy);
            assert_eq!(sel.accepted, items);
        }
    }

    #[test]
    fn random_conflict_graphs_give_disjoint_sets() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let items: Vec<Item> = (0..15)
                .map(|_| {
                    let hits = (0..4).map(|_| rng.gen_range(0..30)).collect();
                    (hits, rng.gen_range(0.0..1.0))
                })
                .collect();
            for strategy in [
                SubsetStrategy::HopfieldNn,
                SubsetStrategy::Greedy,
                SubsetStrategy::Exact,
            ] {
                let sel = run(items.clone(), strategy);
                assert_disjoint(&sel);
                assert_eq!(sel.accepted.len() + sel.rejected.len(), items.len());
                // Maximal: every rejected item conflicts with something accepted.
                for r in &sel.rejected {
                    assert!(sel.accepted.iter().any(|a| !shares_nothing(a, r)));
                }
            }
        }
    }
}

use super::{admit_in_order, by_quality, Conflicts};

struct Search<'a> {
    order: &'a [usize],
    quality: &'a [f64],
    conflicts: &'a Conflicts,
    /// `suffix[k]` = sum of qualities of `order[k..]`.
    suffix: Vec<f64>,
    current: Vec<bool>,
    current_sum: f64,
    best: Vec<bool>,
    best_sum: f64,
}

impl Search<'_> {
    fn visit(&mut self, k: usize) {
        if self.current_sum > self.best_sum {
            self.best_sum = self.current_sum;
            self.best.copy_from_slice(&self.current);
        }
        if k == self.order.len() || self.current_sum + self.suffix[k] <= self.best_sum {
            return;
        }
        let i = self.order[k];
        if self.conflicts.of(i).iter().all(|&j| !self.current[j]) {
            self.current[i] = true;
            self.current_sum += self.quality[i];
            self.visit(k + 1);
            self.current[i] = false;
            self.current_sum -= self.quality[i];
        }
        self.visit(k + 1);
    }
}

/// Maximum total quality independent set by branch and bound.
///
/// Exponential in the worst case; callers bound the problem size.
pub fn select_exact(quality: &[f64], conflicts: &Conflicts) -> Vec<bool> {
    let n = quality.len();
    let order = by_quality(quality);
    let weights: Vec<f64> = quality.iter().map(|q| q.max(0.0)).collect();
    let mut suffix = vec![0.0; n + 1];
    for k in (0..n).rev() {
        suffix[k] = suffix[k + 1] + weights[order[k]];
    }

    // Seed the bound with the greedy answer.
    let mut seed = vec![false; n];
    admit_in_order(order.iter().copied(), conflicts, &mut seed);
    let seed_sum = (0..n).filter(|&i| seed[i]).map(|i| weights[i]).sum();

    let mut search = Search {
        order: &order,
        quality: &weights,
        conflicts,
        suffix,
        current: vec![false; n],
        current_sum: 0.0,
        best: seed,
        best_sum: seed_sum,
    };
    search.visit(0);

    let mut keep = search.best;
    // Zero-quality items do not change the sum; keep them when they fit.
    admit_in_order(order, conflicts, &mut keep);
    keep
}

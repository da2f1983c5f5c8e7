//! Hopfield neural network for the maximum-quality compatible subset.
//!
//! Each item is a neuron with activation in `[0, 1]`. Compatible pairs are
//! coupled with weight `(1 - omega) / (n - 1)` and conflicting pairs with `-1`;
//! the input of neuron `i` is `sum_j w_ij s_j + omega * q_i`. Neurons are
//! updated asynchronously in a seeded random order while the temperature is
//! annealed towards `t_inf`.

use rand::prelude::*;

use super::{admit_in_order, Conflicts};
use crate::config::HopfieldParams;

/// Outcome of the relaxation before conflict cleanup.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Relaxation {
    pub(crate) activations: Vec<f64>,
    pub(crate) iterations: usize,
    pub(crate) converged: bool,
}

/// Coupling weight of a compatible pair.
fn compatible_weight(n: usize, omega: f64) -> f64 {
    if n > 1 {
        (1.0 - omega) / (n - 1) as f64
    } else {
        0.0
    }
}

/// Input of neuron `i`; `total` is the summed activation of all neurons.
fn input(
    i: usize,
    quality: &[f64],
    conflicts: &Conflicts,
    states: &[f64],
    total: f64,
    omega: f64,
) -> f64 {
    let conflicting: f64 = conflicts.of(i).iter().map(|&j| states[j]).sum();
    let compatible = (total - states[i] - conflicting).max(0.0);
    compatible_weight(states.len(), omega) * compatible - conflicting + omega * quality[i]
}

pub(crate) fn relax(quality: &[f64], conflicts: &Conflicts, params: &HopfieldParams) -> Relaxation {
    let n = quality.len();
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut states: Vec<f64> = quality.iter().map(|q| q.clamp(0.0, 1.0)).collect();
    let mut order: Vec<usize> = (0..n).collect();
    let mut temperature = params.initial_temperature;
    let mut total: f64 = states.iter().sum();

    for iteration in 1..=params.max_iterations {
        order.shuffle(&mut rng);
        let mut max_change: f64 = 0.0;
        for &i in &order {
            let y = input(i, quality, conflicts, &states, total, params.omega);
            let next = 0.5 * (1.0 + (y / temperature).tanh());
            max_change = max_change.max((next - states[i]).abs());
            total += next - states[i];
            states[i] = next;
        }
        let cooled = temperature - params.t_inf <= params.limit_for_stable * params.t_inf;
        temperature = 0.5 * (temperature + params.t_inf);

        tracing::trace!(iteration, temperature, max_change, "hopfield sweep");
        if max_change < params.limit_for_stable && cooled {
            return Relaxation {
                activations: states,
                iterations: iteration,
                converged: true,
            };
        }
    }

    Relaxation {
        activations: states,
        iterations: params.max_iterations,
        converged: false,
    }
}

/// Run the network and turn activations into a compatible selection.
///
/// Active neurons are admitted by decreasing activation, which removes any
/// conflict the network left behind; then every remaining item that still
/// fits is re-admitted in the same order.
pub fn select_hopfield(
    quality: &[f64],
    conflicts: &Conflicts,
    params: &HopfieldParams,
) -> Vec<bool> {
    let relaxed = relax(quality, conflicts, params);
    if !relaxed.converged {
        tracing::debug!(
            iterations = relaxed.iterations,
            "hopfield network did not converge"
        );
    }

    let act = &relaxed.activations;
    let mut order: Vec<usize> = (0..quality.len()).collect();
    order.sort_by(|&a, &b| {
        act[b]
            .total_cmp(&act[a])
            .then(quality[b].total_cmp(&quality[a]))
            .then(a.cmp(&b))
    });

    let mut keep = vec![false; quality.len()];
    admit_in_order(
        order
            .iter()
            .copied()
            .filter(|&i| act[i] >= params.activation_threshold),
        conflicts,
        &mut keep,
    );
    admit_in_order(order, conflicts, &mut keep);
    keep
}

//! Selection of the neurons firing on a step.
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;

use crate::interneuron::NeuronRange;
use crate::neuron_type::ThresholdType;

/// Returns the neurons of the range whose thresholded excitation reaches the threshold.
pub fn above_threshold(
    excitation: &[f64],
    range: NeuronRange,
    threshold_type: ThresholdType,
    threshold: f64,
) -> Vec<usize> {
    range
        .iter()
        .filter(|&i| {
            excitation
                .get(i)
                .is_some_and(|&y| threshold_type.apply(y) >= threshold)
        })
        .collect()
}

/// Returns the `num_winners` neurons of the range with the highest thresholded excitation, in increasing
/// order.
///
/// Neurons tied at the cut-off are drawn at random.
pub fn most_excited<R: Rng + ?Sized>(
    excitation: &[f64],
    range: NeuronRange,
    threshold_type: ThresholdType,
    num_winners: usize,
    tie_break: &mut R,
) -> Vec<usize> {
    let candidates: Vec<(usize, f64)> = range
        .iter()
        .filter_map(|i| excitation.get(i).map(|&y| (i, threshold_type.apply(y))))
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .collect();
    if num_winners == 0 {
        return vec![];
    }
    if num_winners >= candidates.len() {
        return candidates.into_iter().map(|(i, _)| i).sorted().collect();
    }

    let cutoff = candidates[num_winners - 1].1;
    let mut winners: Vec<usize> = candidates
        .iter()
        .take_while(|(_, y)| y.total_cmp(&cutoff) == Ordering::Greater)
        .map(|(i, _)| *i)
        .collect();
    let mut tied: Vec<usize> = candidates
        .iter()
        .filter(|(_, y)| y.total_cmp(&cutoff) == Ordering::Equal)
        .map(|(i, _)| *i)
        .collect();
    tied.shuffle(tie_break);
    winners.extend(tied.into_iter().take(num_winners - winners.len()));
    winners.sort_unstable();
    winners
}

/// Returns the number of winners of a population of `size` neurons for the given activity.
pub fn num_winners(activity: f64, size: usize) -> usize {
    ((activity * size as f64).round().max(0.0) as usize).min(size)
}

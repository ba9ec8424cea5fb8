//! Inhibitory interneurons regulating the activity of a population.
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::error::SimError;
use super::filter::Filter;
use super::LEARNING_TOLERANCE;

/// A contiguous and inclusive range of neuron indices.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct NeuronRange {
    first: usize,
    last: usize,
}

impl NeuronRange {
    /// Create a new range from `first` to `last` (included).
    /// The function returns an error if the range is empty.
    pub fn new(first: usize, last: usize) -> Result<Self, SimError> {
        if first > last {
            return Err(SimError::InvalidParameter(format!(
                "empty neuron range [{}, {}]",
                first, last
            )));
        }
        Ok(NeuronRange { first, last })
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// A range is never empty, see [`NeuronRange::new`].
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, neuron: usize) -> bool {
        (self.first..=self.last).contains(&neuron)
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// The set of neurons firing on a time step.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct FiringPattern {
    fired: Vec<bool>,
}

impl FiringPattern {
    /// Create a pattern over `num_neurons` neurons where no neuron fires.
    pub fn new(num_neurons: usize) -> Self {
        FiringPattern {
            fired: vec![false; num_neurons],
        }
    }

    /// Create a pattern where the given neurons fire; indices beyond the pattern are ignored.
    pub fn from_indices(num_neurons: usize, indices: &[usize]) -> Self {
        let mut pattern = FiringPattern::new(num_neurons);
        for &i in indices {
            pattern.turn_on(i);
        }
        pattern
    }

    /// Returns the number of neurons covered by the pattern.
    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn is_on(&self, neuron: usize) -> bool {
        self.fired.get(neuron).copied().unwrap_or(false)
    }

    pub fn turn_on(&mut self, neuron: usize) {
        if let Some(fired) = self.fired.get_mut(neuron) {
            *fired = true;
        }
    }

    pub fn turn_off(&mut self, neuron: usize) {
        if let Some(fired) = self.fired.get_mut(neuron) {
            *fired = false;
        }
    }

    pub fn clear(&mut self) {
        self.fired.iter_mut().for_each(|fired| *fired = false);
    }

    /// Returns the number of firing neurons.
    pub fn count(&self) -> usize {
        self.fired.iter().filter(|fired| **fired).count()
    }

    /// Returns the indices of the firing neurons, in increasing order.
    pub fn indices(&self) -> Vec<usize> {
        self.fired
            .iter()
            .enumerate()
            .filter_map(|(i, fired)| fired.then_some(i))
            .collect()
    }
}

/// Represents a feedback or feedforward inhibitory unit.
///
/// The afferent activity of the unit travels through an axonal delay buffer and a synaptic filter before
/// being blended into its internal excitation. The afferent weights adapt so that the activity of the
/// population approaches the desired one.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Interneuron {
    synaptic_filter: Filter,
    // Most recent value first
    synaptic_queue: VecDeque<f64>,
    // Most recent value first, the back is reaching the synapse
    axonal_buffer: VecDeque<f64>,
    axonal_buffer_size: usize,
    weights: Vec<f64>,
    first_neuron: usize,
    // Fraction of the excitation replaced on every step; 1.0 means no memory
    excitation_decay: f64,
    internal_excitation: Option<f64>,
    use_weighted_activity: bool,
    weighted_activity_adjustment: f64,
    activity_deviation: f64,
    desired_activity: f64,
    syn_mod_rate: f64,
    activity_averaging_rate: f64,
    multiplier: f64,
}

impl Default for Interneuron {
    /// A memoryless unit with a single-step axonal buffer.
    fn default() -> Self {
        Interneuron::with_buffer(1.0, 1)
    }
}

impl Interneuron {
    /// Create a new interneuron.
    /// The function returns an error if the axonal buffer would be empty.
    pub fn new(excitation_decay: f64, buffer_size: usize) -> Result<Self, SimError> {
        if buffer_size == 0 {
            return Err(SimError::ZeroLengthBuffer(
                "Attempted to create an Interneuron with no buffer".to_string(),
            ));
        }
        Ok(Interneuron::with_buffer(excitation_decay, buffer_size))
    }

    fn with_buffer(excitation_decay: f64, buffer_size: usize) -> Self {
        Interneuron {
            synaptic_filter: Filter::default(),
            synaptic_queue: VecDeque::from(vec![0.0]),
            axonal_buffer: VecDeque::from(vec![0.0; buffer_size]),
            axonal_buffer_size: buffer_size,
            weights: vec![],
            first_neuron: 0,
            excitation_decay,
            internal_excitation: None,
            use_weighted_activity: false,
            weighted_activity_adjustment: 1.0,
            activity_deviation: 0.0,
            desired_activity: 0.0,
            syn_mod_rate: 0.0,
            activity_averaging_rate: 0.0,
            multiplier: 1.0,
        }
    }

    /// Feed the unit with its afferent excitation for one step and returns its (scaled) excitation.
    pub fn calc_excitation(&mut self, axonal_excitation: f64) -> f64 {
        self.axonal_buffer.push_front(axonal_excitation);
        while self.axonal_buffer.len() > self.axonal_buffer_size {
            self.axonal_buffer.pop_back();
        }
        let arriving = self.axonal_buffer.back().copied().unwrap_or(0.0);

        self.synaptic_queue.pop_back();
        self.synaptic_queue.push_front(arriving);
        let response = self.synaptic_filter.apply_queue(&self.synaptic_queue);

        let excitation = match self.internal_excitation {
            None => response,
            Some(previous) => {
                (1.0 - self.excitation_decay) * previous + self.excitation_decay * response
            }
        };
        self.internal_excitation = Some(excitation);
        self.multiplier * excitation
    }

    /// Same as [`Interneuron::calc_excitation`], with the afferent excitation given by the weights of the
    /// firing neurons of the range.
    pub fn calc_excitation_from_indices(&mut self, fired: &[usize], range: NeuronRange) -> f64 {
        let axonal_excitation = fired
            .iter()
            .filter(|i| range.contains(**i))
            .map(|i| self.weight_of(*i))
            .sum();
        self.calc_excitation(axonal_excitation)
    }

    /// Same as [`Interneuron::calc_excitation_from_indices`], for a firing pattern.
    pub fn calc_excitation_from_pattern(
        &mut self,
        pattern: &FiringPattern,
        range: NeuronRange,
    ) -> f64 {
        let axonal_excitation = range
            .iter()
            .filter(|i| pattern.is_on(*i))
            .map(|i| self.weight_of(i))
            .sum();
        self.calc_excitation(axonal_excitation)
    }

    /// Adapt the weights of the neurons in `to_modify` toward the desired activity, given the neurons of the
    /// range that just fired.
    ///
    /// The deviation from the desired activity is averaged over time; each modified weight moves by the
    /// modification rate times this deviation and never becomes negative.
    pub fn update_internrn_weights(
        &mut self,
        just_fired: &[usize],
        to_modify: &[usize],
        range: NeuronRange,
    ) {
        if self.syn_mod_rate <= LEARNING_TOLERANCE {
            return;
        }

        let fired_in_range = just_fired.iter().filter(|i| range.contains(**i));
        let actual_activity = if self.use_weighted_activity {
            let fired_weights: f64 = fired_in_range.map(|i| self.weight_of(*i)).sum();
            let total_weights: f64 = range.iter().map(|i| self.weight_of(i)).sum();
            if total_weights > 0.0 {
                fired_weights / total_weights
            } else {
                warn!(
                    "Interneuron weights of neurons [{}, {}] are all zero, the weighted activity is zero",
                    range.first(),
                    range.last()
                );
                0.0
            }
        } else {
            fired_in_range.count() as f64 / range.len() as f64
        };

        self.activity_deviation = self.activity_averaging_rate * self.activity_deviation
            + (1.0 - self.activity_averaging_rate)
                * (actual_activity * self.weighted_activity_adjustment - self.desired_activity);

        let delta = self.syn_mod_rate * self.activity_deviation;
        for &i in to_modify {
            if let Some(weight) = self.weight_mut(i) {
                *weight = (*weight + delta).max(0.0);
            }
        }
    }

    fn weight_of(&self, neuron: usize) -> f64 {
        neuron
            .checked_sub(self.first_neuron)
            .and_then(|idx| self.weights.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    fn weight_mut(&mut self, neuron: usize) -> Option<&mut f64> {
        neuron
            .checked_sub(self.first_neuron)
            .and_then(move |idx| self.weights.get_mut(idx))
    }

    /// Change the length of the axonal delay buffer; new slots are empty, the oldest values are dropped.
    /// The function returns an error (and leaves the buffer untouched) if the buffer would be empty.
    pub fn set_max_time_offset(&mut self, buffer_size: usize) -> Result<(), SimError> {
        if buffer_size == 0 {
            return Err(SimError::ZeroLengthBuffer(
                "Attempted to alter Interneuron to have no buffer".to_string(),
            ));
        }
        self.axonal_buffer_size = buffer_size;
        while self.axonal_buffer.len() < buffer_size {
            self.axonal_buffer.push_front(0.0);
        }
        while self.axonal_buffer.len() > buffer_size {
            self.axonal_buffer.pop_back();
        }
        Ok(())
    }

    pub fn max_time_offset(&self) -> usize {
        self.axonal_buffer_size
    }

    /// Forget the short-term state of the unit; the weights are kept.
    pub fn reset(&mut self) {
        self.axonal_buffer = VecDeque::from(vec![0.0; self.axonal_buffer_size]);
        self.synaptic_queue = VecDeque::from(vec![0.0; self.synaptic_filter.len()]);
        self.internal_excitation = None;
    }

    /// Replace the synaptic filter and reset the unit.
    pub fn load_synapse_filter_values(&mut self, coefficients: Vec<f64>) -> Result<(), SimError> {
        self.synaptic_filter.set_coefficients(coefficients)?;
        self.reset();
        Ok(())
    }

    pub fn synaptic_filter(&self) -> &Filter {
        &self.synaptic_filter
    }

    /// Allocate one unit weight per afferent neuron, the first one being `first_neuron`.
    pub fn set_num_weights(&mut self, num_weights: usize, first_neuron: usize) {
        self.weights = vec![1.0; num_weights];
        self.first_neuron = first_neuron;
    }

    /// Returns the afferent weights, the first one belonging to the first afferent neuron.
    pub fn weights(&self) -> &[f64] {
        &self.weights[..]
    }

    /// Returns the internal excitation, or -1 if it has not been computed since the last reset.
    pub fn excitation(&self) -> f64 {
        self.internal_excitation.unwrap_or(-1.0)
    }

    /// Returns the internal excitation, if computed since the last reset.
    pub fn internal_excitation(&self) -> Option<f64> {
        self.internal_excitation
    }

    pub fn excitation_decay(&self) -> f64 {
        self.excitation_decay
    }

    pub fn set_excitation_decay(&mut self, excitation_decay: f64) {
        self.excitation_decay = excitation_decay;
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    pub fn desired_activity(&self) -> f64 {
        self.desired_activity
    }

    pub fn set_desired_activity(&mut self, desired_activity: f64) {
        self.desired_activity = desired_activity;
    }

    pub fn syn_mod_rate(&self) -> f64 {
        self.syn_mod_rate
    }

    pub fn set_syn_mod_rate(&mut self, syn_mod_rate: f64) {
        self.syn_mod_rate = syn_mod_rate;
    }

    pub fn activity_averaging_rate(&self) -> f64 {
        self.activity_averaging_rate
    }

    pub fn set_activity_averaging_rate(&mut self, activity_averaging_rate: f64) {
        self.activity_averaging_rate = activity_averaging_rate;
    }

    pub fn activity_deviation(&self) -> f64 {
        self.activity_deviation
    }

    /// Measure the activity with the afferent weights instead of the number of firing neurons.
    pub fn set_use_weighted_activity(&mut self, use_weighted_activity: bool) {
        self.use_weighted_activity = use_weighted_activity;
    }

    pub fn set_weighted_activity_adjustment(&mut self, adjustment: f64) {
        self.weighted_activity_adjustment = adjustment;
    }
}

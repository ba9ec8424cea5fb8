//! Populations of neurons sharing a neuron type and a set of inhibitory interneurons.
use log::warn;
use serde::{Deserialize, Serialize};

use super::config::InterneuronDefaults;
use super::error::SimError;
use super::interneuron::{FiringPattern, Interneuron, NeuronRange};
use super::neuron_type::{NeuronType, NeuronTypeId};

/// Snapshot of the interneurons of a population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
struct InhibitionState {
    feedback: Vec<Interneuron>,
    feedforward: Vec<Interneuron>,
}

/// Represents a contiguous range of neurons bound to one neuron type.
///
/// A population starts with one feedback and one feedforward interneuron. Feedback units are driven by the
/// firing of the population, feedforward units by its external input.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Population {
    range: NeuronRange,
    neuron_type: NeuronTypeId,
    feedback: Vec<Interneuron>,
    feedforward: Vec<Interneuron>,
    saved: Vec<InhibitionState>,
}

impl Population {
    pub fn new(range: NeuronRange, neuron_type: NeuronTypeId) -> Self {
        Population {
            range,
            neuron_type,
            feedback: vec![Interneuron::default()],
            feedforward: vec![Interneuron::default()],
            saved: vec![],
        }
    }

    pub fn range(&self) -> NeuronRange {
        self.range
    }

    pub fn first_neuron(&self) -> usize {
        self.range.first()
    }

    pub fn last_neuron(&self) -> usize {
        self.range.last()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn contains(&self, neuron: usize) -> bool {
        self.range.contains(neuron)
    }

    pub fn neuron_type(&self) -> NeuronTypeId {
        self.neuron_type
    }

    pub fn feedback_interneurons(&self) -> &[Interneuron] {
        &self.feedback[..]
    }

    pub fn feedforward_interneurons(&self) -> &[Interneuron] {
        &self.feedforward[..]
    }

    fn interneurons_mut(&mut self) -> impl Iterator<Item = &mut Interneuron> {
        self.feedback.iter_mut().chain(self.feedforward.iter_mut())
    }

    /// Add a feedback or feedforward interneuron to the population.
    /// The function returns an error if the axonal buffer would be empty.
    pub fn add_interneuron(
        &mut self,
        is_feedback: bool,
        excitation_decay: f64,
        buffer_size: usize,
        syn_mod_rate: f64,
        activity_averaging_rate: f64,
        multiplier: f64,
    ) -> Result<(), SimError> {
        let mut interneuron = Interneuron::new(excitation_decay, buffer_size)?;
        interneuron.set_syn_mod_rate(syn_mod_rate);
        interneuron.set_activity_averaging_rate(activity_averaging_rate);
        interneuron.set_multiplier(multiplier);
        if is_feedback {
            self.feedback.push(interneuron);
        } else {
            self.feedforward.push(interneuron);
        }
        Ok(())
    }

    /// Configure the interneurons from the parameters of the neuron type, falling back on the global defaults.
    ///
    /// Every interneuron gets one unit weight per neuron of the population.
    pub fn init_interneurons(
        &mut self,
        neuron_type: &NeuronType,
        defaults: &InterneuronDefaults,
    ) -> Result<(), SimError> {
        let (num_weights, first) = (self.len(), self.first_neuron());
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_num_weights(num_weights, first));

        self.set_desired_activity(neuron_type.parameter("Activity", defaults.activity));
        self.set_fb_internrn_syn_mod_rate(neuron_type.parameter("lambdaFB", defaults.lambda_fb));
        self.set_ff_internrn_syn_mod_rate(neuron_type.parameter("lambdaFF", defaults.lambda_ff));
        self.set_activity_averaging_rate(
            neuron_type.parameter("PyrToInternrnWtAdjDecay", defaults.internrn_wt_adj_decay),
        );
        self.update_fb_interneuron_axonal_delay(
            neuron_type.parameter("FBInternrnAxonalDelay", defaults.fb_axonal_delay),
        )?;
        self.update_ff_interneuron_axonal_delay(
            neuron_type.parameter("FFInternrnAxonalDelay", defaults.ff_axonal_delay),
        )?;
        self.update_interneuron_decay(
            neuron_type.parameter("InternrnExcDecay", defaults.internrn_exc_decay),
        );
        Ok(())
    }

    /// Feed the feedback interneurons with the neurons that just fired.
    pub fn calc_new_feedback_inhibition(&mut self, fired: &[usize]) {
        let range = self.range;
        for interneuron in self.feedback.iter_mut() {
            interneuron.calc_excitation_from_indices(fired, range);
        }
    }

    /// Feed the feedforward interneurons with the neurons that just fired.
    pub fn calc_new_feedforward_inhibition(&mut self, fired: &[usize]) {
        let range = self.range;
        for interneuron in self.feedforward.iter_mut() {
            interneuron.calc_excitation_from_indices(fired, range);
        }
    }

    /// Feed the feedforward interneurons with an external firing pattern.
    pub fn calc_new_feedforward_inhibition_from_pattern(&mut self, pattern: &FiringPattern) {
        let range = self.range;
        for interneuron in self.feedforward.iter_mut() {
            interneuron.calc_excitation_from_pattern(pattern, range);
        }
    }

    /// Returns the multiplier-weighted average excitation of the feedback interneurons.
    pub fn feedback_inhibition(&self) -> f64 {
        weighted_average(&self.feedback, self.range)
    }

    /// Returns the multiplier-weighted average excitation of the feedforward interneurons.
    pub fn feedforward_inhibition(&self) -> f64 {
        weighted_average(&self.feedforward, self.range)
    }

    /// Returns the afferent weights of the first feedback interneuron.
    pub fn kfb_weights(&self) -> Option<&[f64]> {
        self.feedback.first().map(Interneuron::weights)
    }

    /// Adapt the afferent weights of the interneurons.
    ///
    /// Feedback units modify the weights of the neurons that fired on the previous step, feedforward units the
    /// weights of the externally driven neurons. Both measure the activity on `just_fired`.
    pub fn update_internrn_weights(
        &mut self,
        just_fired: &[usize],
        old_fired: &[usize],
        external: &FiringPattern,
    ) {
        let range = self.range;
        for interneuron in self.feedback.iter_mut() {
            interneuron.update_internrn_weights(just_fired, old_fired, range);
        }
        let driven = external.indices();
        for interneuron in self.feedforward.iter_mut() {
            interneuron.update_internrn_weights(just_fired, &driven, range);
        }
    }

    /// Forget the short-term state of every interneuron.
    pub fn reset_interneurons(&mut self) {
        self.interneurons_mut().for_each(Interneuron::reset);
    }

    /// Push a snapshot of the interneurons; see [`Population::restore_inh_state`].
    pub fn save_inh_state(&mut self) {
        self.saved.push(InhibitionState {
            feedback: self.feedback.clone(),
            feedforward: self.feedforward.clone(),
        });
    }

    /// Restore the most recent snapshot of the interneurons.
    /// The function returns an error if no snapshot was saved.
    pub fn restore_inh_state(&mut self) -> Result<(), SimError> {
        let state = self.saved.pop().ok_or_else(|| {
            SimError::OutOfBounds("No saved interneuron state to restore".to_string())
        })?;
        self.feedback = state.feedback;
        self.feedforward = state.feedforward;
        Ok(())
    }

    /// Replace the synaptic filter of every interneuron; the interneurons are reset.
    pub fn load_synapse_filter_values(&mut self, coefficients: &[f64]) -> Result<(), SimError> {
        for interneuron in self.interneurons_mut() {
            interneuron.load_synapse_filter_values(coefficients.to_vec())?;
        }
        Ok(())
    }

    pub fn set_desired_activity(&mut self, activity: f64) {
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_desired_activity(activity));
    }

    pub fn set_use_weighted_activity(&mut self, use_weighted_activity: bool) {
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_use_weighted_activity(use_weighted_activity));
    }

    pub fn set_weighted_activity_adjustment(&mut self, adjustment: f64) {
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_weighted_activity_adjustment(adjustment));
    }

    pub fn set_activity_averaging_rate(&mut self, rate: f64) {
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_activity_averaging_rate(rate));
    }

    pub fn set_fb_internrn_syn_mod_rate(&mut self, rate: f64) {
        self.feedback
            .iter_mut()
            .for_each(|interneuron| interneuron.set_syn_mod_rate(rate));
    }

    pub fn set_ff_internrn_syn_mod_rate(&mut self, rate: f64) {
        self.feedforward
            .iter_mut()
            .for_each(|interneuron| interneuron.set_syn_mod_rate(rate));
    }

    pub fn update_fb_interneuron_axonal_delay(&mut self, delay: usize) -> Result<(), SimError> {
        self.feedback
            .iter_mut()
            .try_for_each(|interneuron| interneuron.set_max_time_offset(delay))
    }

    pub fn update_ff_interneuron_axonal_delay(&mut self, delay: usize) -> Result<(), SimError> {
        self.feedforward
            .iter_mut()
            .try_for_each(|interneuron| interneuron.set_max_time_offset(delay))
    }

    pub fn update_interneuron_decay(&mut self, decay: f64) {
        self.interneurons_mut()
            .for_each(|interneuron| interneuron.set_excitation_decay(decay));
    }
}

/// Units whose excitation has not been computed yet contribute zero.
fn weighted_average(interneurons: &[Interneuron], range: NeuronRange) -> f64 {
    let (numerator, denominator) =
        interneurons
            .iter()
            .fold((0.0, 0.0), |(numerator, denominator), interneuron| {
                (
                    numerator
                        + interneuron.multiplier()
                            * interneuron.internal_excitation().unwrap_or(0.0),
                    denominator + interneuron.multiplier(),
                )
            });
    let average = numerator / denominator;
    if average.is_nan() {
        warn!(
            "Interneurons of population [{}, {}] have no weight, no inhibition is applied",
            range.first(),
            range.last()
        );
        return 0.0;
    }
    average
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron_type::ThresholdType;
    use crate::synapse_type::SynapseTypeId;
    use approx::assert_relative_eq;

    fn population() -> Population {
        Population::new(NeuronRange::new(2, 5).unwrap(), NeuronTypeId::new(0))
    }

    fn neuron_type() -> NeuronType {
        NeuronType::new("pyr", true, false, ThresholdType::Simple, SynapseTypeId::new(0))
    }

    #[test]
    fn test_new() {
        let population = population();
        assert_eq!(population.first_neuron(), 2);
        assert_eq!(population.last_neuron(), 5);
        assert_eq!(population.len(), 4);
        assert!(population.contains(5));
        assert!(!population.contains(6));
        assert_eq!(population.neuron_type(), NeuronTypeId::new(0));
        assert_eq!(population.feedback_interneurons().len(), 1);
        assert_eq!(population.feedforward_interneurons().len(), 1);
        assert_eq!(population.feedback_inhibition(), 0.0);
    }

    #[test]
    fn test_add_interneuron() {
        let mut population = population();
        population.add_interneuron(true, 0.5, 2, 0.1, 0.2, 3.0).unwrap();
        population.add_interneuron(false, 1.0, 1, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(population.feedback_interneurons().len(), 2);
        assert_eq!(population.feedforward_interneurons().len(), 2);

        let added = &population.feedback_interneurons()[1];
        assert_eq!(added.excitation_decay(), 0.5);
        assert_eq!(added.max_time_offset(), 2);
        assert_eq!(added.syn_mod_rate(), 0.1);
        assert_eq!(added.activity_averaging_rate(), 0.2);
        assert_eq!(added.multiplier(), 3.0);

        assert!(population.add_interneuron(true, 0.5, 0, 0.1, 0.2, 3.0).is_err());
    }

    #[test]
    fn test_init_interneurons() {
        let mut population = population();
        let mut n_type = neuron_type();
        n_type.set_parameter("Activity", "0.2");
        n_type.set_parameter("FBInternrnAxonalDelay", "3");
        let defaults = InterneuronDefaults {
            lambda_fb: 0.5,
            ..InterneuronDefaults::default()
        };
        population.init_interneurons(&n_type, &defaults).unwrap();

        let fb = &population.feedback_interneurons()[0];
        assert_eq!(fb.weights(), &[1.0; 4]);
        assert_eq!(fb.desired_activity(), 0.2);
        assert_eq!(fb.syn_mod_rate(), 0.5);
        assert_eq!(fb.max_time_offset(), 3);
        let ff = &population.feedforward_interneurons()[0];
        assert_eq!(ff.syn_mod_rate(), defaults.lambda_ff);
        assert_eq!(ff.max_time_offset(), defaults.ff_axonal_delay);
        assert_eq!(ff.excitation_decay(), defaults.internrn_exc_decay);

        n_type.set_parameter("FFInternrnAxonalDelay", "0");
        assert!(matches!(
            population.init_interneurons(&n_type, &defaults),
            Err(SimError::ZeroLengthBuffer(_))
        ));
    }

    #[test]
    fn test_weighted_inhibition() {
        let mut population = population();
        population.add_interneuron(true, 1.0, 1, 0.0, 0.0, 3.0).unwrap();
        population.init_interneurons(&neuron_type(), &InterneuronDefaults::default()).unwrap();

        population.calc_new_feedback_inhibition(&[2, 3, 7]);
        // Both units see 2.0, the average does not depend on the multipliers
        assert_relative_eq!(population.feedback_inhibition(), 2.0);

        let external = FiringPattern::from_indices(8, &[4]);
        population.calc_new_feedforward_inhibition_from_pattern(&external);
        assert_relative_eq!(population.feedforward_inhibition(), 1.0);
        population.calc_new_feedforward_inhibition(&[2, 3, 4, 5]);
        assert_relative_eq!(population.feedforward_inhibition(), 4.0);

        population.reset_interneurons();
        assert_eq!(population.feedback_inhibition(), 0.0);
    }

    #[test]
    fn test_zero_multipliers() {
        let mut population = population();
        population.init_interneurons(&neuron_type(), &InterneuronDefaults::default()).unwrap();
        population.feedback[0].set_multiplier(0.0);
        population.calc_new_feedback_inhibition(&[2]);
        assert_eq!(population.feedback_inhibition(), 0.0);
    }

    #[test]
    fn test_save_restore() {
        let mut population = population();
        population.init_interneurons(&neuron_type(), &InterneuronDefaults::default()).unwrap();
        population.calc_new_feedback_inhibition(&[2, 3]);
        population.save_inh_state();

        population.calc_new_feedback_inhibition(&[2, 3, 4, 5]);
        assert_relative_eq!(population.feedback_inhibition(), 4.0);
        population.restore_inh_state().unwrap();
        assert_relative_eq!(population.feedback_inhibition(), 2.0);

        assert!(population.restore_inh_state().is_err());
    }

    #[test]
    fn test_update_internrn_weights() {
        let mut population = population();
        population.init_interneurons(&neuron_type(), &InterneuronDefaults::default()).unwrap();
        population.set_desired_activity(0.5);
        population.set_fb_internrn_syn_mod_rate(0.1);
        population.set_ff_internrn_syn_mod_rate(0.2);

        let external = FiringPattern::from_indices(6, &[5]);
        // Activity is 3/4, deviation 0.25
        population.update_internrn_weights(&[2, 3, 4], &[2], &external);
        assert_relative_eq!(population.feedback_interneurons()[0].weights()[0], 1.025);
        assert_eq!(population.feedback_interneurons()[0].weights()[3], 1.0);
        assert_eq!(population.feedforward_interneurons()[0].weights()[0], 1.0);
        assert_relative_eq!(population.feedforward_interneurons()[0].weights()[3], 1.05);
        assert_relative_eq!(population.kfb_weights().unwrap()[0], 1.025);
    }

    #[test]
    fn test_load_synapse_filter_values() {
        let mut population = population();
        population.load_synapse_filter_values(&[0.5, 0.5]).unwrap();
        assert_eq!(
            population.feedforward_interneurons()[0].synaptic_filter().len(),
            2
        );
        assert_eq!(
            population.load_synapse_filter_values(&[]),
            Err(SimError::EmptyFilter)
        );
    }
}

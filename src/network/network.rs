use log::{debug, info};
use std::collections::VecDeque;

use crate::catalog::NetworkCatalog;
use crate::config::{FiringMode, SimulationConfig};
use crate::filter::Filter;
use crate::interneuron::FiringPattern;
use crate::neuron_type::{NeuronType, ThresholdType};
use crate::noise::{NoiseStreams, StreamKind};
use crate::population::Population;
use crate::synapse::{AxonalSynapse, Buses, DendriticSynapse};

use super::firing::{above_threshold, most_excited, num_winners};

/// Number of steps between two progress messages.
const PROGRESS_INTERVAL: i64 = 1000;

/// Recent bus values of a neuron, most recent first.
#[derive(Debug, PartialEq, Clone)]
struct DendriticQueues {
    excitatory: VecDeque<f64>,
    divisive: VecDeque<f64>,
    subtractive: VecDeque<f64>,
}

impl DendriticQueues {
    fn new(len: usize) -> Self {
        DendriticQueues {
            excitatory: VecDeque::from(vec![0.0; len]),
            divisive: VecDeque::from(vec![0.0; len]),
            subtractive: VecDeque::from(vec![0.0; len]),
        }
    }

    fn push(&mut self, excitatory: f64, divisive: f64, subtractive: f64) {
        for (queue, value) in [
            (&mut self.excitatory, excitatory),
            (&mut self.divisive, divisive),
            (&mut self.subtractive, subtractive),
        ] {
            queue.push_front(value);
            queue.pop_back();
        }
    }

    /// Returns the filtered excitatory, divisive and subtractive inputs.
    fn filtered(&self, filter: &Filter) -> (f64, f64, f64) {
        (
            filter.apply_queue(&self.excitatory),
            filter.apply_queue(&self.divisive),
            filter.apply_queue(&self.subtractive),
        )
    }
}

/// Somatic constants and firing rule of a network.
#[derive(Debug, PartialEq, Clone, Copy)]
pub(super) struct SomaticParameters {
    pub k0: f64,
    pub kfb: f64,
    pub kff: f64,
    pub threshold: f64,
    pub firing_mode: FiringMode,
}

impl SomaticParameters {
    pub fn from_config(config: &SimulationConfig) -> Self {
        SomaticParameters {
            k0: config.k0,
            kfb: config.kfb,
            kff: config.kff,
            threshold: config.threshold,
            firing_mode: config.firing_mode,
        }
    }

    /// Returns the somatic excitation given the filtered inputs and the inhibition of the population.
    fn excitation(&self, inputs: (f64, f64, f64), fb: f64, ff: f64) -> f64 {
        let (excitatory, divisive, subtractive) = inputs;
        let denominator = excitatory + divisive + self.k0 + self.kfb * fb + self.kff * ff;
        if denominator == 0.0 {
            return 0.0;
        }
        excitatory / denominator - subtractive
    }
}

/// A network of neurons connected by plastic synapses, advanced one time step at a time.
///
/// Every step selects the neurons that fire, transmits their spikes through the synapses whose axonal
/// delay has elapsed, filters the accumulated buses on the dendrites, updates the inhibition of each
/// population and, when learning, the synaptic and interneuron weights.
#[derive(Debug, PartialEq, Clone)]
pub struct Network {
    catalog: NetworkCatalog,
    populations: Vec<Population>,
    // Dendritic synapses of every neuron
    fan_in: Vec<Vec<DendriticSynapse>>,
    // Axonal synapses of every neuron, pointing into `fan_in`
    fan_out: Vec<Vec<AxonalSynapse>>,
    buses: Buses,
    queues: Vec<DendriticQueues>,
    excitation: Vec<f64>,
    // Most recent first, one entry per step up to the longest axonal delay (at least two)
    firing_history: VecDeque<Vec<usize>>,
    max_axonal_delay: usize,
    streams: NoiseStreams,
    somatic: SomaticParameters,
    time_step: i64,
}

impl Network {
    /// Assemble a network from a sealed catalog and its connections; see
    /// [`super::builder::NetworkBuilder`].
    pub(super) fn assemble(
        catalog: NetworkCatalog,
        populations: Vec<Population>,
        fan_in: Vec<Vec<DendriticSynapse>>,
        fan_out: Vec<Vec<AxonalSynapse>>,
        max_axonal_delay: usize,
        streams: NoiseStreams,
        somatic: SomaticParameters,
    ) -> Self {
        let num_neurons = fan_in.len();
        let mut queues = vec![DendriticQueues::new(1); num_neurons];
        for population in populations.iter() {
            let len = catalog
                .neuron_type(population.neuron_type())
                .map_or(1, NeuronType::filter_size);
            for i in population.range().iter() {
                if let Some(queue) = queues.get_mut(i) {
                    *queue = DendriticQueues::new(len);
                }
            }
        }

        Network {
            catalog,
            populations,
            fan_in,
            fan_out,
            buses: Buses::new(num_neurons),
            queues,
            excitation: vec![0.0; num_neurons],
            firing_history: VecDeque::with_capacity(max_axonal_delay.max(2)),
            max_axonal_delay,
            streams,
            somatic,
            time_step: 0,
        }
    }

    /// Advance the network by one time step and returns the neurons that fired, in increasing order.
    ///
    /// Externally driven neurons always fire; the external pattern also drives the feedforward
    /// interneurons. When `learning` is on, the dendritic synapses of the firing neurons and the
    /// interneuron weights are updated.
    pub fn step(&mut self, external: Option<&FiringPattern>, learning: bool) -> Vec<usize> {
        let t = self.time_step;
        let num_neurons = self.num_neurons();
        let external = match external {
            Some(pattern) => pattern.clone(),
            None => FiringPattern::new(num_neurons),
        };

        let fired = self.select_firing(&external);

        self.firing_history.push_front(fired.clone());
        // The previous step is also needed by the feedback interneurons
        self.firing_history.truncate(self.max_axonal_delay.max(2));
        self.transmit(t);

        let inputs: Vec<(f64, f64, f64)> = self.filter_dendrites();

        for population in self.populations.iter_mut() {
            population.calc_new_feedback_inhibition(&fired);
            population.calc_new_feedforward_inhibition_from_pattern(&external);
            let (fb, ff) = (
                population.feedback_inhibition(),
                population.feedforward_inhibition(),
            );
            for i in population.range().iter() {
                if let (Some(y), Some(&input)) = (self.excitation.get_mut(i), inputs.get(i)) {
                    *y = self.somatic.excitation(input, fb, ff);
                }
            }
        }

        if learning {
            self.learn(&fired, &external, t);
        }

        self.buses.clear();
        self.time_step += 1;
        if self.time_step % PROGRESS_INTERVAL == 0 {
            debug!(
                "Step {}: {} of {} neurons fired",
                self.time_step,
                fired.len(),
                num_neurons
            );
        }
        fired
    }

    fn select_firing(&mut self, external: &FiringPattern) -> Vec<usize> {
        let mut pattern = FiringPattern::new(self.num_neurons());
        let tie_break = self.streams.get_mut(StreamKind::TieBreak);
        for population in self.populations.iter() {
            let threshold_type = self
                .catalog
                .neuron_type(population.neuron_type())
                .map_or(ThresholdType::Simple, NeuronType::threshold_type);
            let selected = match self.somatic.firing_mode {
                FiringMode::Threshold => above_threshold(
                    &self.excitation,
                    population.range(),
                    threshold_type,
                    self.somatic.threshold,
                ),
                FiringMode::Competitive { activity } => most_excited(
                    &self.excitation,
                    population.range(),
                    threshold_type,
                    num_winners(activity, population.len()),
                    &mut *tie_break,
                ),
            };
            selected.into_iter().for_each(|i| pattern.turn_on(i));
        }
        external.indices().into_iter().for_each(|i| pattern.turn_on(i));
        pattern.indices()
    }

    /// Activate the synapses whose axonal delay matches the age of a spike of their source.
    fn transmit(&mut self, t: i64) {
        let transmission = self.streams.get_mut(StreamKind::Transmission);
        for (age, sources) in self.firing_history.iter().enumerate() {
            for source in sources.iter() {
                let Some(axons) = self.fan_out.get(*source) else {
                    continue;
                };
                for axon in axons.iter().filter(|axon| axon.delay() == age + 1) {
                    axon.activate(
                        &mut self.fan_in,
                        self.catalog.synapse_types(),
                        &mut self.buses,
                        t,
                        &mut *transmission,
                    );
                }
            }
        }
    }

    /// Push the buses into the dendritic queues and returns the filtered inputs of every neuron.
    fn filter_dendrites(&mut self) -> Vec<(f64, f64, f64)> {
        let mut inputs = vec![(0.0, 0.0, 0.0); self.num_neurons()];
        for population in self.populations.iter() {
            let Some(neuron_type) = self.catalog.neuron_type(population.neuron_type()) else {
                continue;
            };
            for i in population.range().iter() {
                if let (Some(queue), Some(input)) = (self.queues.get_mut(i), inputs.get_mut(i)) {
                    queue.push(
                        self.buses.excitatory[i],
                        self.buses.divisive[i],
                        self.buses.subtractive[i],
                    );
                    *input = queue.filtered(neuron_type.filter());
                }
            }
        }
        inputs
    }

    fn learn(&mut self, fired: &[usize], external: &FiringPattern, t: i64) {
        for &i in fired {
            let Some(synapses) = self.fan_in.get_mut(i) else {
                continue;
            };
            for synapse in synapses.iter_mut() {
                if let Some(synapse_type) = self.catalog.synapse_type(synapse.synapse_type()) {
                    synapse.update_weight(synapse_type, t);
                }
            }
        }

        let old_fired = self.firing_history.get(1).cloned().unwrap_or_default();
        for population in self.populations.iter_mut() {
            population.update_internrn_weights(fired, &old_fired, external);
        }
    }

    /// Forget the recent activity of the network: firing history, dendritic inputs, interneuron state and
    /// synapse activations. Weights are kept.
    pub fn reset_firing(&mut self) {
        self.firing_history.clear();
        self.buses.clear();
        for queue in self.queues.iter_mut() {
            *queue = DendriticQueues::new(queue.excitatory.len());
        }
        self.excitation.iter_mut().for_each(|y| *y = 0.0);
        self.populations
            .iter_mut()
            .for_each(Population::reset_interneurons);
        self.fan_in
            .iter_mut()
            .flatten()
            .for_each(DendriticSynapse::reset_last_activation);
        info!("Network activity reset at step {}", self.time_step);
    }

    /// Returns a copy of the pattern where each neuron is flipped with the given probability, using the
    /// external noise stream.
    pub fn add_external_noise(&mut self, pattern: &FiringPattern, flip_probability: f64) -> FiringPattern {
        let stream = self.streams.get_mut(StreamKind::External);
        let mut noisy = pattern.clone();
        for i in 0..pattern.len() {
            if stream.bernoulli(flip_probability) {
                if pattern.is_on(i) {
                    noisy.turn_off(i);
                } else {
                    noisy.turn_on(i);
                }
            }
        }
        noisy
    }

    /// Returns the number of steps simulated so far.
    pub fn time_step(&self) -> i64 {
        self.time_step
    }

    pub fn num_neurons(&self) -> usize {
        self.fan_in.len()
    }

    pub fn num_synapses(&self) -> usize {
        self.fan_in.iter().map(Vec::len).sum()
    }

    pub fn catalog(&self) -> &NetworkCatalog {
        &self.catalog
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations[..]
    }

    pub fn population_mut(&mut self, index: usize) -> Option<&mut Population> {
        self.populations.get_mut(index)
    }

    /// Returns the dendritic synapses of a neuron.
    pub fn fan_in(&self, target: usize) -> Option<&[DendriticSynapse]> {
        self.fan_in.get(target).map(Vec::as_slice)
    }

    /// Returns the axonal synapses of a neuron.
    pub fn fan_out(&self, source: usize) -> Option<&[AxonalSynapse]> {
        self.fan_out.get(source).map(Vec::as_slice)
    }

    pub fn synapse(&self, target: usize, slot: usize) -> Option<&DendriticSynapse> {
        self.fan_in.get(target).and_then(|synapses| synapses.get(slot))
    }

    pub fn synapse_mut(&mut self, target: usize, slot: usize) -> Option<&mut DendriticSynapse> {
        self.fan_in
            .get_mut(target)
            .and_then(|synapses| synapses.get_mut(slot))
    }

    /// Returns the somatic excitation computed on the last step.
    pub fn excitation(&self) -> &[f64] {
        &self.excitation[..]
    }

    /// Returns the neurons that fired on the last step.
    pub fn last_fired(&self) -> &[usize] {
        self.firing_history
            .front()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the mean weight of the dendritic synapses.
    pub fn mean_weight(&self) -> f64 {
        let (sum, count) = self
            .fan_in
            .iter()
            .flatten()
            .fold((0.0, 0), |(sum, count), synapse| (sum + synapse.weight(), count + 1));
        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }

    pub fn streams_mut(&mut self) -> &mut NoiseStreams {
        &mut self.streams
    }
}

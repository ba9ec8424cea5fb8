//! Dendritic and axonal halves of the connections between neurons.
//!
//! A [`DendriticSynapse`] owns the state of a connection: its weight, its activation history and the
//! snapshot of its efficacy used to resume a rise. The dendritic synapses of a network are stored per
//! target neuron (fan-in); an [`AxonalSynapse`] is a handle into this storage used to walk the connections
//! per source neuron (fan-out).
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::kinetics::DecayKineticsTable;
use super::noise::TransmissionSource;
use super::synapse_type::{SynapseType, SynapseTypeId};
use super::{MAX_TIME_STEP, ZBAR_RESOLUTION};

/// The learning rule driving the weight updates of a synapse type.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum LearningRule {
    /// Move the weight toward the efficacy of the last activation.
    PostSynaptic,
    /// Move the weight toward the efficacy of the last activation times a moving average of past activations.
    MovingAverage,
    /// Like `PostSynaptic`, but with step-shaped rises.
    PostSynapticB,
    /// Move the weight toward the efficacy of every activation in the history, one after the other.
    MultiActivation,
}

/// The bus a synapse contributes to.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SynapseClass {
    Excitatory,
    DivisiveInhibitory,
    SubtractiveInhibitory,
}

impl SynapseClass {
    /// Returns the class of the synapses sent by a neuron type with the given flags.
    pub fn from_flags(is_excitatory: bool, is_inhibitory_divisive: bool) -> Self {
        match (is_excitatory, is_inhibitory_divisive) {
            (true, _) => SynapseClass::Excitatory,
            (false, true) => SynapseClass::DivisiveInhibitory,
            (false, false) => SynapseClass::SubtractiveInhibitory,
        }
    }
}

/// Where a synapse stands on its efficacy curve at a given time.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SynapseState {
    /// No activation ever went through.
    NeverActivated,
    /// On the rise curve, `elapsed` steps after its start. A `resumed` rise was extended by an activation
    /// received while rising and is measured from the original start of the rise.
    Rising { elapsed: usize, resumed: bool },
    /// Re-activated during a rise and past the end of the original rise curve.
    Saturated,
    /// On the fall curve, `elapsed` steps after the end of the rise.
    Falling { elapsed: usize },
}

/// The per-step accumulators the synapses contribute to, one entry per neuron and per class.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Buses {
    pub excitatory: Vec<f64>,
    pub divisive: Vec<f64>,
    pub subtractive: Vec<f64>,
}

impl Buses {
    pub fn new(num_neurons: usize) -> Self {
        Buses {
            excitatory: vec![0.0; num_neurons],
            divisive: vec![0.0; num_neurons],
            subtractive: vec![0.0; num_neurons],
        }
    }

    /// Returns the number of neurons served by the buses.
    pub fn len(&self) -> usize {
        self.excitatory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excitatory.is_empty()
    }

    /// Add a contribution to the bus of the given class.
    pub fn add(&mut self, class: SynapseClass, target: usize, value: f64) {
        let bus = match class {
            SynapseClass::Excitatory => &mut self.excitatory,
            SynapseClass::DivisiveInhibitory => &mut self.divisive,
            SynapseClass::SubtractiveInhibitory => &mut self.subtractive,
        };
        bus[target] += value;
    }

    /// Reset all accumulators to zero.
    pub fn clear(&mut self) {
        self.excitatory.iter_mut().for_each(|x| *x = 0.0);
        self.divisive.iter_mut().for_each(|x| *x = 0.0);
        self.subtractive.iter_mut().for_each(|x| *x = 0.0);
    }
}

/// Represents the state of a connection, held on the dendrite of its target neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DendriticSynapse {
    source: usize,
    target: usize,
    class: SynapseClass,
    synapse_type: SynapseTypeId,
    weight: f64,
    last_activation: Option<i64>,
    prev_activation: Option<i64>,
    // Efficacy at the start of the current rise, quantized to [0, ZBAR_RESOLUTION].
    old_zbar: usize,
    // Last step of an extended rise, if any.
    rise_until: Option<i64>,
    rise_start: i64,
    moving_average: f64,
    history: VecDeque<i64>,
}

impl DendriticSynapse {
    /// Create a new, never activated, synapse.
    pub fn new(
        source: usize,
        target: usize,
        class: SynapseClass,
        synapse_type: SynapseTypeId,
        weight: f64,
    ) -> Self {
        DendriticSynapse {
            source,
            target,
            class,
            synapse_type,
            weight,
            last_activation: None,
            prev_activation: None,
            old_zbar: 0,
            rise_until: None,
            rise_start: 0,
            moving_average: 0.0,
            history: VecDeque::new(),
        }
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn class(&self) -> SynapseClass {
        self.class
    }

    /// Change the class of the synapse, i.e., the bus it contributes to.
    pub fn set_class(&mut self, class: SynapseClass) {
        self.class = class;
    }

    pub fn synapse_type(&self) -> SynapseTypeId {
        self.synapse_type
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Returns the time of the last transmitted activation, if any.
    pub fn last_activation(&self) -> Option<i64> {
        self.last_activation
    }

    /// Returns the time of the activation before the last one, if any.
    pub fn prev_activation(&self) -> Option<i64> {
        self.prev_activation
    }

    /// Set the last activation time; the replaced value becomes the previous activation.
    pub fn set_last_activation(&mut self, t: i64) {
        self.prev_activation = self.last_activation;
        self.last_activation = Some(t);
    }

    /// Forget the last activation; the replaced value becomes the previous activation.
    pub fn reset_last_activation(&mut self) {
        self.prev_activation = self.last_activation;
        self.last_activation = None;
    }

    /// Returns the quantized efficacy at the start of the current rise.
    pub fn old_zbar(&self) -> usize {
        self.old_zbar
    }

    /// Set the efficacy at the start of the current rise, given in [0, 1].
    pub fn set_old_zbar(&mut self, zbar: f64) {
        self.old_zbar = quantize(zbar);
    }

    pub fn moving_average(&self) -> f64 {
        self.moving_average
    }

    /// Returns the recent activation times, oldest first.
    pub fn history(&self) -> &VecDeque<i64> {
        &self.history
    }

    /// Try to transmit a spike of the source neuron at time `t`.
    ///
    /// On success, the synapse contributes `conduction_gain * weight` to the bus of its class and moves on
    /// its efficacy curve; on failure, nothing changes. Returns whether the spike went through.
    pub fn activate<T>(
        &mut self,
        synapse_type: &SynapseType,
        buses: &mut Buses,
        t: i64,
        transmission: &mut T,
    ) -> bool
    where
        T: TransmissionSource + ?Sized,
    {
        if !transmission.transmits(synapse_type.success_rate()) {
            return false;
        }

        let kinetics = synapse_type.kinetics();
        let rise = kinetics.rise_duration() as i64;

        if synapse_type.learning_rule() == LearningRule::MovingAverage {
            self.update_moving_average(kinetics, t);
        }

        buses.add(
            self.class,
            self.target,
            synapse_type.conduction_gain() * self.weight,
        );

        match self.last_activation {
            None => {
                self.old_zbar = 0;
                self.rise_until = None;
            }
            Some(last) if t - last < rise => {
                // A fresh rise is measured from the activation that started it
                if !matches!(self.rise_until, Some(until) if t < until) {
                    self.rise_start = last;
                }
                self.rise_until = Some(t + rise - 1);
            }
            Some(last) => {
                self.old_zbar = quantize(kinetics.fall(to_index(t - last - rise)));
                self.rise_until = None;
            }
        }

        self.prev_activation = self.last_activation;
        self.last_activation = Some(t);

        let max_time_step = kinetics.max_time_step() as i64;
        while let Some(&oldest) = self.history.front() {
            if t - oldest <= max_time_step {
                break;
            }
            self.history.pop_front();
        }
        self.history.push_back(t);

        true
    }

    fn update_moving_average(&mut self, kinetics: &DecayKineticsTable, t: i64) {
        let inv_alpha = 1.0 - kinetics.alpha();
        let rise = kinetics.rise_duration() as i64;
        self.moving_average = match self.last_activation {
            Some(last) if t - last < MAX_TIME_STEP as i64 => {
                let time_diff = t - last;
                let decay = if time_diff < rise {
                    kinetics.rise(self.old_zbar, to_index(time_diff + 1))
                } else {
                    kinetics.fall(to_index(time_diff + 1 - rise))
                };
                decay * self.moving_average + inv_alpha
            }
            _ => inv_alpha,
        };
    }

    /// Returns the state of the synapse at time `t` relative to its last activation.
    pub fn state(&self, kinetics: &DecayKineticsTable, t: i64) -> SynapseState {
        match self.last_activation {
            None => SynapseState::NeverActivated,
            Some(last) => self.state_since(kinetics, t, last),
        }
    }

    /// Returns the state of the synapse at time `t` relative to the given activation.
    /// An extended rise takes precedence over the reference activation.
    pub fn state_since(&self, kinetics: &DecayKineticsTable, t: i64, reference: i64) -> SynapseState {
        let rise = kinetics.rise_duration() as i64;
        match self.rise_until {
            Some(until) if t <= until => {
                let elapsed = t - self.rise_start;
                if elapsed > rise {
                    SynapseState::Saturated
                } else {
                    SynapseState::Rising {
                        elapsed: to_index(elapsed),
                        resumed: true,
                    }
                }
            }
            _ => {
                let time_diff = t - reference;
                if time_diff < rise {
                    SynapseState::Rising {
                        elapsed: to_index(time_diff),
                        resumed: false,
                    }
                } else {
                    SynapseState::Falling {
                        elapsed: to_index(time_diff - rise),
                    }
                }
            }
        }
    }

    /// Returns the efficacy (zBar) at time `t` caused by the activation at time `reference`.
    pub fn calc_zbar(&self, synapse_type: &SynapseType, t: i64, reference: i64) -> f64 {
        let kinetics = synapse_type.kinetics();
        match self.state_since(kinetics, t, reference) {
            SynapseState::NeverActivated => 0.0,
            SynapseState::Saturated => 1.0,
            SynapseState::Rising {
                elapsed,
                resumed: true,
            } => kinetics.rise(self.old_zbar, elapsed),
            SynapseState::Rising {
                elapsed,
                resumed: false,
            } => {
                let zbar = kinetics.rise(self.old_zbar, elapsed);
                if synapse_type.learning_rule() == LearningRule::PostSynapticB && zbar <= 0.0 {
                    if let Some(prev) = self.prev_activation {
                        let since_prev = t - prev;
                        if since_prev >= 0 && (since_prev as usize) <= kinetics.rise_duration() {
                            return kinetics.rise(self.old_zbar, since_prev as usize);
                        }
                    }
                }
                zbar
            }
            SynapseState::Falling { elapsed } => kinetics.fall(elapsed),
        }
    }

    /// Apply one step of the learning rule of the synapse type at time `t`.
    ///
    /// A synapse that was never activated, or whose last activation is beyond the support of the fall,
    /// decays toward zero. The weight never becomes negative.
    pub fn update_weight(&mut self, synapse_type: &SynapseType, t: i64) {
        let mu = synapse_type.mu();
        let kinetics = synapse_type.kinetics();
        let rise = kinetics.rise_duration() as i64;
        let max_time_step = kinetics.max_time_step() as i64;

        match self.last_activation {
            Some(last) if t - last - rise < max_time_step => match synapse_type.learning_rule() {
                LearningRule::MultiActivation => {
                    // Each activation of the history pulls the weight, even within a single rise
                    let targets: Vec<f64> = self
                        .history
                        .iter()
                        .map(|&activation| self.calc_zbar(synapse_type, t, activation))
                        .collect();
                    for zbar in targets {
                        self.weight += mu * (zbar - self.weight);
                    }
                }
                LearningRule::MovingAverage => {
                    let zbar = self.calc_zbar(synapse_type, t, last);
                    self.weight += mu * (zbar * self.moving_average - self.weight);
                }
                LearningRule::PostSynaptic | LearningRule::PostSynapticB => {
                    let zbar = self.calc_zbar(synapse_type, t, last);
                    self.weight += mu * (zbar - self.weight);
                }
            },
            _ => self.weight -= mu * self.weight,
        }

        self.weight = self.weight.max(0.0);
    }
}

/// Represents a connection seen from its source neuron: a handle to the dendritic synapse in the fan-in of
/// its target, together with the axonal delay of the connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct AxonalSynapse {
    target: usize,
    slot: usize,
    delay: usize,
}

impl AxonalSynapse {
    /// Connect to the `slot`-th dendritic synapse of the `target` neuron.
    pub fn connect(target: usize, slot: usize, delay: usize) -> Self {
        AxonalSynapse {
            target,
            slot,
            delay,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the number of steps a spike needs to reach the dendrite.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Returns true if the handle points to the given dendritic synapse.
    pub fn connects_to(&self, target: usize, slot: usize) -> bool {
        self.target == target && self.slot == slot
    }

    pub fn dendrite<'a>(&self, fan_in: &'a [Vec<DendriticSynapse>]) -> Option<&'a DendriticSynapse> {
        fan_in.get(self.target).and_then(|synapses| synapses.get(self.slot))
    }

    pub fn dendrite_mut<'a>(
        &self,
        fan_in: &'a mut [Vec<DendriticSynapse>],
    ) -> Option<&'a mut DendriticSynapse> {
        fan_in
            .get_mut(self.target)
            .and_then(|synapses| synapses.get_mut(self.slot))
    }

    /// Returns the weight of the connection, if the handle is valid.
    pub fn weight(&self, fan_in: &[Vec<DendriticSynapse>]) -> Option<f64> {
        self.dendrite(fan_in).map(DendriticSynapse::weight)
    }

    /// Activate the dendritic synapse the handle points to.
    /// Returns whether the spike went through; an invalid handle transmits nothing.
    pub fn activate<T>(
        &self,
        fan_in: &mut [Vec<DendriticSynapse>],
        synapse_types: &[SynapseType],
        buses: &mut Buses,
        t: i64,
        transmission: &mut T,
    ) -> bool
    where
        T: TransmissionSource + ?Sized,
    {
        match self.dendrite_mut(fan_in) {
            Some(synapse) => match synapse_types.get(synapse.synapse_type().index()) {
                Some(synapse_type) => synapse.activate(synapse_type, buses, t, transmission),
                None => false,
            },
            None => false,
        }
    }
}

/// Quantize an efficacy in [0, 1] to a row of the rise table.
fn quantize(zbar: f64) -> usize {
    ((ZBAR_RESOLUTION as f64 * zbar) as i64).clamp(0, ZBAR_RESOLUTION as i64) as usize
}

/// Convert a (possibly negative) number of steps to a table index, negative values mapping to zero.
fn to_index(steps: i64) -> usize {
    usize::try_from(steps).unwrap_or(0)
}

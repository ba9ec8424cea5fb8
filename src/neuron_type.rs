//! Shared parameters of the neurons of a kind.
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::error::SimError;
use super::filter::{convolve, Filter};
use super::synapse::SynapseClass;
use super::synapse_type::SynapseTypeId;

/// Time steps below this value leave the convolved filter untouched.
const DELTA_T_TOLERANCE: f64 = 1e-8;

/// Handle to a neuron type registered in a catalog.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct NeuronTypeId(usize);

impl NeuronTypeId {
    pub fn new(index: usize) -> Self {
        NeuronTypeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// The transform applied to the somatic excitation before it is compared to the firing threshold.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ThresholdType {
    Simple,
    Exponential,
    Logarithmic,
    Rational,
}

impl ThresholdType {
    pub fn apply(self, excitation: f64) -> f64 {
        match self {
            ThresholdType::Simple => excitation,
            ThresholdType::Exponential => 1.0 - (-excitation).exp(),
            ThresholdType::Logarithmic => excitation.ln_1p(),
            ThresholdType::Rational => excitation / (1.0 + excitation),
        }
    }
}

/// Represents a kind of neuron: the bus its synapses feed, its threshold function, its dendrite-to-soma
/// filter and a set of named parameters overriding the global ones.
#[derive(Debug, PartialEq, Clone)]
pub struct NeuronType {
    name: String,
    is_excitatory: bool,
    is_inhibitory_divisive: bool,
    threshold_type: ThresholdType,
    fallback_synapse_type: SynapseTypeId,
    dendrite_filter: Filter,
    synapse_filter: Filter,
    // Dendrite-to-soma filter convolved with the synapse filter
    convolved_filter: Filter,
    delta_t: f64,
    parameters: BTreeMap<String, String>,
}

impl NeuronType {
    /// Create a new neuron type; `fallback_synapse_type` is used for incoming connections without a more
    /// specific synapse type.
    pub fn new(
        name: &str,
        is_excitatory: bool,
        is_inhibitory_divisive: bool,
        threshold_type: ThresholdType,
        fallback_synapse_type: SynapseTypeId,
    ) -> Self {
        NeuronType {
            name: name.to_string(),
            is_excitatory,
            is_inhibitory_divisive,
            threshold_type,
            fallback_synapse_type,
            dendrite_filter: Filter::default(),
            synapse_filter: Filter::default(),
            convolved_filter: Filter::default(),
            delta_t: 0.0,
            parameters: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_excitatory(&self) -> bool {
        self.is_excitatory
    }

    pub fn is_inhibitory_divisive(&self) -> bool {
        self.is_inhibitory_divisive
    }

    /// Returns the class of the synapses sent by neurons of this type.
    pub fn synapse_class(&self) -> SynapseClass {
        SynapseClass::from_flags(self.is_excitatory, self.is_inhibitory_divisive)
    }

    pub fn threshold_type(&self) -> ThresholdType {
        self.threshold_type
    }

    pub fn set_threshold_type(&mut self, threshold_type: ThresholdType) {
        self.threshold_type = threshold_type;
    }

    pub fn fallback_synapse_type(&self) -> SynapseTypeId {
        self.fallback_synapse_type
    }

    /// Returns the filter applied to the dendritic input, i.e., the convolution of the dendrite-to-soma and
    /// synapse filters.
    pub fn filter(&self) -> &Filter {
        &self.convolved_filter
    }

    pub fn filter_size(&self) -> usize {
        self.convolved_filter.len()
    }

    pub fn dendrite_filter(&self) -> &Filter {
        &self.dendrite_filter
    }

    pub fn synapse_filter(&self) -> &Filter {
        &self.synapse_filter
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    /// Set the simulation time step and update the convolved filter.
    pub fn set_delta_t(&mut self, delta_t: f64) {
        self.delta_t = delta_t;
        self.convolve_filters();
    }

    /// Replace the dendrite-to-soma filter and update the convolved filter.
    pub fn load_dendrite_filter_values(&mut self, coefficients: Vec<f64>) -> Result<(), SimError> {
        self.dendrite_filter.set_coefficients(coefficients)?;
        self.convolve_filters();
        Ok(())
    }

    /// Replace the synapse filter and update the convolved filter.
    pub fn load_synapse_filter_values(&mut self, coefficients: Vec<f64>) -> Result<(), SimError> {
        self.synapse_filter.set_coefficients(coefficients)?;
        self.convolve_filters();
        Ok(())
    }

    /// Nothing happens until a positive time step is known. A filter of length one is the identity and is
    /// left out of the convolution.
    fn convolve_filters(&mut self) {
        if self.delta_t <= DELTA_T_TOLERANCE {
            return;
        }
        self.convolved_filter = match (self.dendrite_filter.len() > 1, self.synapse_filter.len() > 1) {
            (true, true) => convolve(&self.dendrite_filter, &self.synapse_filter, self.delta_t),
            (true, false) => self.dendrite_filter.clone(),
            (false, _) => self.synapse_filter.clone(),
        };
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Set a named parameter, stored as text and parsed on lookup.
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        self.parameters.insert(name.to_string(), value.to_string());
    }

    /// Returns the value of a named parameter, or the default if it is missing or cannot be parsed.
    pub fn parameter<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.parameters.get(name) {
            Some(value) => match value.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(
                        "Parameter {} of neuron type {} has an invalid value {:?}, using the default",
                        name, self.name, value
                    );
                    default
                }
            },
            None => default,
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn neuron_type() -> NeuronType {
        NeuronType::new("pyr", true, false, ThresholdType::Simple, SynapseTypeId::new(0))
    }

    #[test]
    fn test_new() {
        let n_type = NeuronType::new(
            "constructed",
            false,
            true,
            ThresholdType::Exponential,
            SynapseTypeId::new(3),
        );
        assert_eq!(n_type.name(), "constructed");
        assert!(!n_type.is_excitatory());
        assert!(n_type.is_inhibitory_divisive());
        assert_eq!(n_type.synapse_class(), SynapseClass::DivisiveInhibitory);
        assert_eq!(n_type.threshold_type(), ThresholdType::Exponential);
        assert_eq!(n_type.fallback_synapse_type(), SynapseTypeId::new(3));
        assert_eq!(n_type.filter_size(), 1);
    }

    #[test]
    fn test_threshold_type() {
        let mut n_type = neuron_type();
        n_type.set_threshold_type(ThresholdType::Logarithmic);
        assert_eq!(n_type.threshold_type(), ThresholdType::Logarithmic);

        assert_eq!(ThresholdType::Simple.apply(0.7), 0.7);
        assert_relative_eq!(ThresholdType::Exponential.apply(1.0), 1.0 - (-1.0_f64).exp());
        assert_relative_eq!(ThresholdType::Logarithmic.apply(1.0), 2.0_f64.ln());
        assert_relative_eq!(ThresholdType::Rational.apply(1.0), 0.5);
        assert_eq!(ThresholdType::Exponential.apply(0.0), 0.0);
    }

    #[test]
    fn test_parameters() {
        let mut n_type = neuron_type();
        assert!(!n_type.has_parameter("dne"));
        assert_eq!(n_type.parameter("dne", 123), 123);

        n_type.set_parameter("testParameter", "expected");
        assert!(n_type.has_parameter("testParameter"));
        assert_eq!(
            n_type.parameter("testParameter", "surprise".to_string()),
            "expected"
        );

        n_type.set_parameter("Activity", "0.1");
        assert_eq!(n_type.parameter("Activity", 0.5_f64), 0.1);
        // Unparsable values fall back on the default
        assert_eq!(n_type.parameter("testParameter", 7_u32), 7);
        assert_eq!(n_type.parameters().len(), 2);
    }

    #[test]
    fn test_filter_is_convolved() {
        let mut n_type = neuron_type();
        n_type.load_synapse_filter_values(vec![1.0, 1.0]).unwrap();
        n_type.load_dendrite_filter_values(vec![1.0, 1.0]).unwrap();
        // No time step yet
        assert_eq!(n_type.filter().coefficients(), &[1.0]);

        n_type.set_delta_t(1.0);
        assert_eq!(n_type.filter().coefficients(), &[1.0, 2.0, 1.0]);

        n_type.set_delta_t(0.5);
        assert_eq!(n_type.filter().coefficients(), &[0.5, 1.0, 0.5]);

        let mut syn_only = neuron_type();
        syn_only.set_delta_t(1.0);
        syn_only.load_synapse_filter_values(vec![1.0, 1.0]).unwrap();
        assert_eq!(syn_only.filter().coefficients(), &[1.0, 1.0]);

        let mut dendrite_only = neuron_type();
        dendrite_only.set_delta_t(1.0);
        dendrite_only.load_dendrite_filter_values(vec![0.5, 0.25]).unwrap();
        assert_eq!(dendrite_only.filter().coefficients(), &[0.5, 0.25]);

        assert_eq!(
            dendrite_only.load_dendrite_filter_values(vec![]),
            Err(SimError::EmptyFilter)
        );
    }
}

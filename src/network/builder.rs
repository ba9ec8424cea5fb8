//! Builder module with utilities for allocating the connections of a network.
use log::{error, info};
use rand::seq::index;
use rand_distr::{Distribution, Uniform};

use super::network::{Network, SomaticParameters};
use crate::catalog::NetworkCatalog;
use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::neuron_type::NeuronTypeId;
use crate::noise::{NoiseStreams, StreamKind};
use crate::population::Population;
use crate::synapse::{AxonalSynapse, DendriticSynapse};

/// Log a configuration error before handing it back.
fn fatal(e: SimError) -> SimError {
    error!("{}", e);
    e
}

/// Builds networks from a catalog and a simulation configuration.
///
/// Every neuron receives exactly `fan_in` dendritic synapses from distinct sources drawn uniformly at
/// random. The synapse type of a connection is resolved from the neuron types of its ends, its class from
/// the neuron type of its source. Sources, weights and delays are drawn from their own random streams.
#[derive(Debug, PartialEq)]
pub struct NetworkBuilder<'a> {
    config: &'a SimulationConfig,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        NetworkBuilder { config }
    }

    /// Seal the catalog and allocate the connections of the network.
    /// The function returns an error if the configuration is inconsistent, if the populations do not
    /// cover the neurons `0..n` without gaps, or if a neuron cannot receive `fan_in` distinct sources.
    pub fn build(self, mut catalog: NetworkCatalog) -> Result<Network, SimError> {
        self.config.validate()?;
        let num_neurons = self.check_coverage(&catalog)?;

        for index in 0..catalog.neuron_types().len() {
            catalog
                .neuron_type_mut(NeuronTypeId::new(index))?
                .set_delta_t(self.config.delta_t);
        }
        catalog.seal();

        let mut populations: Vec<Population> = catalog.populations().to_vec();
        for population in populations.iter_mut() {
            let neuron_type = catalog
                .neuron_type(population.neuron_type())
                .ok_or_else(|| SimError::OutOfBounds("neuron type of population".to_string()))?;
            population.init_interneurons(neuron_type, &self.config.interneurons)?;
        }

        let mut neuron_types = vec![NeuronTypeId::new(0); num_neurons];
        for population in populations.iter() {
            for i in population.range().iter() {
                neuron_types[i] = population.neuron_type();
            }
        }

        let mut streams = NoiseStreams::new(self.config.seed);
        let (fan_in, fan_out) = self.connect(&catalog, &neuron_types, &mut streams)?;

        info!(
            "Network built with {} neurons and {} synapses",
            num_neurons,
            fan_in.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Network::assemble(
            catalog,
            populations,
            fan_in,
            fan_out,
            self.config.connectivity.max_axonal_delay,
            streams,
            SomaticParameters::from_config(self.config),
        ))
    }

    /// Returns the number of neurons covered by the populations.
    fn check_coverage(&self, catalog: &NetworkCatalog) -> Result<usize, SimError> {
        let mut ranges: Vec<(usize, usize)> = catalog
            .populations()
            .iter()
            .map(|p| (p.first_neuron(), p.last_neuron()))
            .collect();
        if ranges.is_empty() {
            return Err(fatal(SimError::Config(
                "The network must have at least one population.".to_string(),
            )));
        }
        ranges.sort_unstable();

        let mut next = 0;
        for (first, last) in ranges {
            if first != next {
                return Err(fatal(SimError::Config(format!(
                    "Neurons {} to {} belong to no population.",
                    next,
                    first - 1
                ))));
            }
            next = last + 1;
        }
        Ok(next)
    }

    fn connect(
        &self,
        catalog: &NetworkCatalog,
        neuron_types: &[NeuronTypeId],
        streams: &mut NoiseStreams,
    ) -> Result<(Vec<Vec<DendriticSynapse>>, Vec<Vec<AxonalSynapse>>), SimError> {
        let num_neurons = neuron_types.len();
        let connectivity = &self.config.connectivity;
        let num_candidates = if connectivity.allow_self {
            num_neurons
        } else {
            num_neurons - 1
        };
        if connectivity.fan_in > num_candidates {
            return Err(fatal(SimError::Config(format!(
                "A fan-in of {} is larger than the {} available sources.",
                connectivity.fan_in, num_candidates
            ))));
        }

        let weight_dist =
            Uniform::new_inclusive(connectivity.initial_weight.0, connectivity.initial_weight.1);
        let delay_dist = Uniform::new_inclusive(
            connectivity.min_axonal_delay,
            connectivity.max_axonal_delay,
        );

        let mut fan_in: Vec<Vec<DendriticSynapse>> = Vec::with_capacity(num_neurons);
        let mut fan_out: Vec<Vec<AxonalSynapse>> = vec![vec![]; num_neurons];
        for (target, post) in neuron_types.iter().enumerate() {
            let sources = index::sample(
                streams.get_mut(StreamKind::Connectivity),
                num_candidates,
                connectivity.fan_in,
            );

            let mut dendrite = Vec::with_capacity(connectivity.fan_in);
            for candidate in sources.iter() {
                // Skip the target itself
                let source = if !connectivity.allow_self && candidate >= target {
                    candidate + 1
                } else {
                    candidate
                };
                let pre = neuron_types[source];
                let synapse_type = catalog.resolve_synapse_type(pre, *post).ok_or_else(|| {
                    SimError::OutOfBounds(format!("synapse type from neuron {} to {}", source, target))
                })?;
                let class = catalog
                    .neuron_type(pre)
                    .map(|neuron_type| neuron_type.synapse_class())
                    .ok_or_else(|| SimError::OutOfBounds(format!("neuron type of neuron {}", source)))?;
                let weight = weight_dist.sample(streams.get_mut(StreamKind::Weights));
                let delay = delay_dist.sample(streams.get_mut(StreamKind::Delays));

                fan_out[source].push(AxonalSynapse::connect(target, dendrite.len(), delay));
                dendrite.push(DendriticSynapse::new(source, target, class, synapse_type, weight));
            }
            fan_in.push(dendrite);
        }

        Ok((fan_in, fan_out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron_type::ThresholdType;
    use crate::synapse::{LearningRule, SynapseClass};

    fn catalog() -> NetworkCatalog {
        let mut catalog = NetworkCatalog::new();
        catalog
            .add_neuron_type("pyr", true, false, ThresholdType::Simple)
            .unwrap();
        catalog
            .add_neuron_type("int", false, true, ThresholdType::Simple)
            .unwrap();
        catalog
            .add_synapse_type(
                "pyr_to_int",
                LearningRule::PostSynaptic,
                0.05,
                10,
                0.9,
                0.3,
                0.0,
                "pyr",
                "int",
            )
            .unwrap();
        catalog.add_population(0, 19, "pyr").unwrap();
        catalog.add_population(20, 24, "int").unwrap();
        catalog
    }

    #[test]
    fn test_build() {
        let mut config = SimulationConfig::default();
        config.connectivity.fan_in = 6;
        config.connectivity.max_axonal_delay = 3;
        let network = NetworkBuilder::new(&config).build(catalog()).unwrap();

        assert_eq!(network.num_neurons(), 25);
        assert_eq!(network.num_synapses(), 25 * 6);
        assert!(network.catalog().is_sealed());
        assert_eq!(network.populations().len(), 2);
        assert_eq!(
            network.populations()[0].feedback_interneurons()[0].weights().len(),
            20
        );

        let catalog = network.catalog();
        let pyr_to_int = catalog.find_synapse_type("pyr_to_int").unwrap();
        for target in 0..25 {
            let dendrite = network.fan_in(target).unwrap();
            let mut sources: Vec<usize> = dendrite.iter().map(|s| s.source()).collect();
            sources.sort_unstable();
            sources.dedup();
            assert_eq!(sources.len(), 6);
            assert!(!sources.contains(&target));

            for synapse in dendrite {
                assert_eq!(synapse.target(), target);
                let weight = synapse.weight();
                assert!((0.4..=0.6).contains(&weight));
                if synapse.source() < 20 {
                    assert_eq!(synapse.class(), SynapseClass::Excitatory);
                } else {
                    assert_eq!(synapse.class(), SynapseClass::DivisiveInhibitory);
                }
                if synapse.source() < 20 && target >= 20 {
                    assert_eq!(synapse.synapse_type(), pyr_to_int);
                } else {
                    assert_ne!(synapse.synapse_type(), pyr_to_int);
                }
            }
        }

        // Every axonal synapse points back to its dendritic half
        let mut count = 0;
        for source in 0..25 {
            for axon in network.fan_out(source).unwrap() {
                let synapse = network.synapse(axon.target(), axon.slot()).unwrap();
                assert_eq!(synapse.source(), source);
                assert!((1..=3).contains(&axon.delay()));
                count += 1;
            }
        }
        assert_eq!(count, network.num_synapses());
    }

    #[test]
    fn test_delta_t() {
        let mut catalog = catalog();
        let pyr = catalog.find_neuron_type("pyr").unwrap();
        let neuron_type = catalog.neuron_type_mut(pyr).unwrap();
        neuron_type.load_synapse_filter_values(vec![1.0, 1.0]).unwrap();
        neuron_type.load_dendrite_filter_values(vec![1.0, 1.0]).unwrap();

        let config = SimulationConfig {
            delta_t: 0.5,
            ..SimulationConfig::default()
        };
        let network = NetworkBuilder::new(&config).build(catalog).unwrap();
        let neuron_type = network.catalog().neuron_type(pyr).unwrap();
        assert_eq!(neuron_type.filter().coefficients(), &[0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_deterministic() {
        let config = SimulationConfig::default();
        let first = NetworkBuilder::new(&config).build(catalog()).unwrap();
        let second = NetworkBuilder::new(&config).build(catalog()).unwrap();
        assert_eq!(first, second);

        let config = SimulationConfig {
            seed: 7,
            ..SimulationConfig::default()
        };
        let third = NetworkBuilder::new(&config).build(catalog()).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_self_connections() {
        let mut catalog = NetworkCatalog::new();
        catalog
            .add_neuron_type("pyr", true, false, ThresholdType::Simple)
            .unwrap();
        catalog.add_population(0, 3, "pyr").unwrap();
        let mut config = SimulationConfig::default();
        config.connectivity.fan_in = 4;
        assert!(matches!(
            NetworkBuilder::new(&config).build(catalog.clone()),
            Err(SimError::Config(_))
        ));

        config.connectivity.allow_self = true;
        let network = NetworkBuilder::new(&config).build(catalog).unwrap();
        for target in 0..4 {
            assert!(network
                .fan_in(target)
                .unwrap()
                .iter()
                .any(|s| s.source() == target));
        }
    }

    #[test]
    fn test_coverage() {
        let config = SimulationConfig::default();
        assert!(matches!(
            NetworkBuilder::new(&config).build(NetworkCatalog::new()),
            Err(SimError::Config(_))
        ));

        let mut catalog = NetworkCatalog::new();
        catalog
            .add_neuron_type("pyr", true, false, ThresholdType::Simple)
            .unwrap();
        catalog.add_population(0, 19, "pyr").unwrap();
        catalog.add_population(25, 39, "pyr").unwrap();
        assert!(matches!(
            NetworkBuilder::new(&config).build(catalog),
            Err(SimError::Config(_))
        ));
    }
}

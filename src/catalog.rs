//! Registries of synapse types, neuron types and populations.
//!
//! Registration is only allowed during the setup phase; once the catalog is sealed, the registered types
//! are read-only and can be shared by every synapse and neuron of a network.
use log::{error, info};
use std::collections::BTreeMap;

use super::error::SimError;
use super::interneuron::NeuronRange;
use super::neuron_type::{NeuronType, NeuronTypeId, ThresholdType};
use super::population::Population;
use super::synapse::LearningRule;
use super::synapse_type::{SynapseType, SynapseTypeId};

/// Log a configuration error before handing it back.
fn fatal(e: SimError) -> SimError {
    error!("{}", e);
    e
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct NetworkCatalog {
    synapse_types: Vec<SynapseType>,
    neuron_types: Vec<NeuronType>,
    populations: Vec<Population>,
    sealed: bool,
}

impl NetworkCatalog {
    pub fn new() -> Self {
        NetworkCatalog::default()
    }

    fn check_open(&self, what: &str) -> Result<(), SimError> {
        if self.sealed {
            return Err(fatal(SimError::CatalogSealed(format!(
                "cannot modify {} after the setup phase",
                what
            ))));
        }
        Ok(())
    }

    /// Register a neuron type, together with its fallback synapse type.
    /// The function returns an error if the name is already registered or if the catalog is sealed.
    pub fn add_neuron_type(
        &mut self,
        name: &str,
        is_excitatory: bool,
        is_inhibitory_divisive: bool,
        threshold_type: ThresholdType,
    ) -> Result<NeuronTypeId, SimError> {
        self.check_open(&format!("neuron type {}", name))?;
        if self.find_neuron_type(name).is_some() {
            return Err(fatal(SimError::DuplicateName {
                kind: "NeuronType",
                name: name.to_string(),
            }));
        }

        let fallback = SynapseTypeId::new(self.synapse_types.len());
        self.synapse_types.push(SynapseType::fallback(name)?);

        let id = NeuronTypeId::new(self.neuron_types.len());
        self.neuron_types.push(NeuronType::new(
            name,
            is_excitatory,
            is_inhibitory_divisive,
            threshold_type,
            fallback,
        ));
        Ok(id)
    }

    /// Register a synapse type connecting neurons of type `pre_type` to neurons of type `post_type`.
    /// The function returns an error if the name is empty or already registered, if one of the neuron
    /// types is unknown, if the kinetics tables cannot be built, or if the catalog is sealed.
    #[allow(clippy::too_many_arguments)]
    pub fn add_synapse_type(
        &mut self,
        name: &str,
        learning_rule: LearningRule,
        mu: f64,
        rise_duration: usize,
        alpha: f64,
        conduction_gain: f64,
        failure_rate: f64,
        pre_type: &str,
        post_type: &str,
    ) -> Result<SynapseTypeId, SimError> {
        self.check_open(&format!("synapse type {}", name))?;
        if name.is_empty() {
            return Err(fatal(SimError::InvalidParameter(
                "synapse types must be named".to_string(),
            )));
        }
        if self.find_synapse_type(name).is_some() {
            return Err(fatal(SimError::DuplicateName {
                kind: "SynapseType",
                name: name.to_string(),
            }));
        }
        for neuron_type in [pre_type, post_type] {
            self.lookup_neuron_type(neuron_type)?;
        }

        let synapse_type = SynapseType::new(
            name,
            learning_rule,
            mu,
            rise_duration,
            alpha,
            conduction_gain,
            failure_rate,
            pre_type,
            post_type,
        )
        .map_err(fatal)?;
        let id = SynapseTypeId::new(self.synapse_types.len());
        self.synapse_types.push(synapse_type);
        Ok(id)
    }

    /// Register the population of neurons `first..=last` of the given type and returns its index.
    /// The function returns an error if the range is empty or overlaps another population, if the neuron
    /// type is unknown, or if the catalog is sealed.
    pub fn add_population(
        &mut self,
        first: usize,
        last: usize,
        neuron_type: &str,
    ) -> Result<usize, SimError> {
        self.check_open(&format!("population [{}, {}]", first, last))?;
        let range = NeuronRange::new(first, last).map_err(fatal)?;
        if let Some(other) = self
            .populations
            .iter()
            .find(|p| p.first_neuron() <= last && first <= p.last_neuron())
        {
            return Err(fatal(SimError::InvalidParameter(format!(
                "population [{}, {}] overlaps population [{}, {}]",
                first,
                last,
                other.first_neuron(),
                other.last_neuron()
            ))));
        }
        let id = self.lookup_neuron_type(neuron_type)?;
        self.populations.push(Population::new(range, id));
        Ok(self.populations.len() - 1)
    }

    /// End the setup phase.
    pub fn seal(&mut self) {
        if !self.sealed {
            info!(
                "Catalog sealed with {} neuron types, {} synapse types and {} populations",
                self.neuron_types.len(),
                self.synapse_types.len(),
                self.populations.len()
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn synapse_type(&self, id: SynapseTypeId) -> Option<&SynapseType> {
        self.synapse_types.get(id.index())
    }

    /// Returns a mutable reference to a synapse type, during the setup phase only.
    pub fn synapse_type_mut(&mut self, id: SynapseTypeId) -> Result<&mut SynapseType, SimError> {
        self.check_open("synapse types")?;
        let num_synapse_types = self.synapse_types.len();
        self.synapse_types.get_mut(id.index()).ok_or_else(|| {
            SimError::OutOfBounds(format!(
                "synapse type {} of {}",
                id.index(),
                num_synapse_types
            ))
        })
    }

    /// Returns all synapse types, indexed by [`SynapseTypeId::index`].
    pub fn synapse_types(&self) -> &[SynapseType] {
        &self.synapse_types[..]
    }

    pub fn find_synapse_type(&self, name: &str) -> Option<SynapseTypeId> {
        if name.is_empty() {
            return None;
        }
        self.synapse_types
            .iter()
            .position(|synapse_type| synapse_type.name() == name)
            .map(SynapseTypeId::new)
    }

    pub fn neuron_type(&self, id: NeuronTypeId) -> Option<&NeuronType> {
        self.neuron_types.get(id.index())
    }

    /// Returns a mutable reference to a neuron type, during the setup phase only.
    pub fn neuron_type_mut(&mut self, id: NeuronTypeId) -> Result<&mut NeuronType, SimError> {
        self.check_open("neuron types")?;
        let num_neuron_types = self.neuron_types.len();
        self.neuron_types.get_mut(id.index()).ok_or_else(|| {
            SimError::OutOfBounds(format!(
                "neuron type {} of {}",
                id.index(),
                num_neuron_types
            ))
        })
    }

    /// Returns all neuron types, indexed by [`NeuronTypeId::index`].
    pub fn neuron_types(&self) -> &[NeuronType] {
        &self.neuron_types[..]
    }

    pub fn find_neuron_type(&self, name: &str) -> Option<NeuronTypeId> {
        self.neuron_types
            .iter()
            .position(|neuron_type| neuron_type.name() == name)
            .map(NeuronTypeId::new)
    }

    fn lookup_neuron_type(&self, name: &str) -> Result<NeuronTypeId, SimError> {
        self.find_neuron_type(name).ok_or_else(|| {
            fatal(SimError::UnknownName {
                kind: "NeuronType",
                name: name.to_string(),
            })
        })
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations[..]
    }

    /// Returns a mutable reference to a population, during the setup phase only.
    pub fn population_mut(&mut self, index: usize) -> Result<&mut Population, SimError> {
        self.check_open("populations")?;
        let num_populations = self.populations.len();
        self.populations.get_mut(index).ok_or_else(|| {
            SimError::OutOfBounds(format!("population {} of {}", index, num_populations))
        })
    }

    /// Returns the index of the population the neuron belongs to.
    pub fn population_of(&self, neuron: usize) -> Option<usize> {
        self.populations.iter().position(|p| p.contains(neuron))
    }

    /// Returns the synapse type connecting a neuron of type `pre` to a neuron of type `post`: the first
    /// registered type matching both names, or the fallback synapse type of `post`.
    pub fn resolve_synapse_type(&self, pre: NeuronTypeId, post: NeuronTypeId) -> Option<SynapseTypeId> {
        let pre_type = self.neuron_type(pre)?;
        let post_type = self.neuron_type(post)?;
        self.synapse_types
            .iter()
            .position(|synapse_type| {
                !synapse_type.name().is_empty()
                    && synapse_type.pre_type() == pre_type.name()
                    && synapse_type.post_type() == post_type.name()
            })
            .map(SynapseTypeId::new)
            .or(Some(post_type.fallback_synapse_type()))
    }

    /// Returns the named synapse types ending on neurons of type `post`, keyed by presynaptic neuron type.
    pub fn presynaptic_types(&self, post: &str) -> BTreeMap<String, SynapseTypeId> {
        let mut found = BTreeMap::new();
        for (index, synapse_type) in self.synapse_types.iter().enumerate() {
            if !synapse_type.name().is_empty() && synapse_type.post_type() == post {
                found
                    .entry(synapse_type.pre_type().to_string())
                    .or_insert(SynapseTypeId::new(index));
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> NetworkCatalog {
        let mut catalog = NetworkCatalog::new();
        catalog
            .add_neuron_type("pyr", true, false, ThresholdType::Simple)
            .unwrap();
        catalog
            .add_neuron_type("int", false, true, ThresholdType::Rational)
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
        catalog
    }

    #[test]
    fn test_add_neuron_type() {
        let catalog = catalog();
        let pyr = catalog.find_neuron_type("pyr").unwrap();
        assert_eq!(pyr, NeuronTypeId::new(0));
        assert_eq!(catalog.neuron_types().len(), 2);
        // Two fallbacks and one named type
        assert_eq!(catalog.synapse_types().len(), 3);

        let fallback = catalog
            .synapse_type(catalog.neuron_type(pyr).unwrap().fallback_synapse_type())
            .unwrap();
        assert_eq!(fallback.name(), "");
        assert_eq!(fallback.post_type(), "pyr");
    }

    #[test]
    fn test_duplicate_names() {
        let mut catalog = catalog();
        assert_eq!(
            catalog.add_neuron_type("pyr", false, false, ThresholdType::Simple),
            Err(SimError::DuplicateName {
                kind: "NeuronType",
                name: "pyr".to_string()
            })
        );
        assert!(matches!(
            catalog.add_synapse_type(
                "pyr_to_int",
                LearningRule::MovingAverage,
                0.05,
                10,
                0.9,
                0.3,
                0.0,
                "pyr",
                "pyr"
            ),
            Err(SimError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_unknown_names() {
        let mut catalog = catalog();
        assert_eq!(
            catalog.add_population(0, 9, "dne"),
            Err(SimError::UnknownName {
                kind: "NeuronType",
                name: "dne".to_string()
            })
        );
        assert!(catalog
            .add_synapse_type(
                "pyr_to_dne",
                LearningRule::PostSynaptic,
                0.05,
                10,
                0.9,
                0.3,
                0.0,
                "pyr",
                "dne"
            )
            .is_err());
        assert!(catalog.find_synapse_type("dne").is_none());
        assert!(catalog.find_synapse_type("").is_none());
    }

    #[test]
    fn test_add_population() {
        let mut catalog = catalog();
        assert_eq!(catalog.add_population(0, 9, "pyr"), Ok(0));
        assert_eq!(catalog.add_population(10, 14, "int"), Ok(1));
        assert!(catalog.add_population(12, 20, "pyr").is_err());
        assert!(catalog.add_population(21, 20, "pyr").is_err());
        assert_eq!(catalog.population_of(12), Some(1));
        assert_eq!(catalog.population_of(15), None);
    }

    #[test]
    fn test_seal() {
        let mut catalog = catalog();
        catalog.seal();
        assert!(catalog.is_sealed());
        assert!(matches!(
            catalog.add_neuron_type("new", true, false, ThresholdType::Simple),
            Err(SimError::CatalogSealed(_))
        ));
        assert!(matches!(
            catalog.add_population(0, 9, "pyr"),
            Err(SimError::CatalogSealed(_))
        ));
        assert!(catalog.neuron_type_mut(NeuronTypeId::new(0)).is_err());
        assert!(catalog.synapse_type_mut(SynapseTypeId::new(0)).is_err());
        assert!(catalog.neuron_type(NeuronTypeId::new(0)).is_some());
    }

    #[test]
    fn test_resolve_synapse_type() {
        let catalog = catalog();
        let pyr = catalog.find_neuron_type("pyr").unwrap();
        let int = catalog.find_neuron_type("int").unwrap();
        assert_eq!(
            catalog.resolve_synapse_type(pyr, int),
            catalog.find_synapse_type("pyr_to_int")
        );
        assert_eq!(
            catalog.resolve_synapse_type(int, pyr),
            Some(catalog.neuron_type(pyr).unwrap().fallback_synapse_type())
        );
        assert_eq!(catalog.resolve_synapse_type(pyr, NeuronTypeId::new(7)), None);
    }

    #[test]
    fn test_presynaptic_types() {
        let catalog = catalog();
        let found = catalog.presynaptic_types("int");
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("pyr"), catalog.find_synapse_type("pyr_to_int").as_ref());
        assert!(catalog.presynaptic_types("pyr").is_empty());
    }

    #[test]
    fn test_mutation_during_setup() {
        let mut catalog = catalog();
        let id = catalog.find_synapse_type("pyr_to_int").unwrap();
        catalog.synapse_type_mut(id).unwrap().set_mu(0.5);
        assert_eq!(catalog.synapse_type(id).unwrap().mu(), 0.5);
        assert!(catalog.synapse_type_mut(SynapseTypeId::new(9)).is_err());
    }
}

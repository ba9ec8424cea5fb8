//! Simulation configuration, stored as JSON.
use log::error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::catalog::NetworkCatalog;
use super::error::SimError;
use super::neuron_type::ThresholdType;
use super::synapse::LearningRule;

/// How the neurons that fire on a step are selected.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FiringMode {
    /// Every neuron whose thresholded excitation reaches the firing threshold fires.
    Threshold,
    /// The `round(activity * n)` most excited neurons of every population of size `n` fire.
    Competitive { activity: f64 },
}

/// Global interneuron parameters; neuron types may override them by name.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterneuronDefaults {
    /// Desired fraction of firing neurons (`Activity`).
    pub activity: f64,
    /// Modification rate of the feedback weights (`lambdaFB`).
    pub lambda_fb: f64,
    /// Modification rate of the feedforward weights (`lambdaFF`).
    pub lambda_ff: f64,
    /// Averaging rate of the activity deviation (`PyrToInternrnWtAdjDecay`).
    pub internrn_wt_adj_decay: f64,
    /// Axonal delay of the feedback interneurons (`FBInternrnAxonalDelay`).
    pub fb_axonal_delay: usize,
    /// Axonal delay of the feedforward interneurons (`FFInternrnAxonalDelay`).
    pub ff_axonal_delay: usize,
    /// Excitation decay of the interneurons (`InternrnExcDecay`).
    pub internrn_exc_decay: f64,
}

impl Default for InterneuronDefaults {
    fn default() -> Self {
        InterneuronDefaults {
            activity: 0.1,
            lambda_fb: 0.0,
            lambda_ff: 0.0,
            internrn_wt_adj_decay: 0.0,
            fb_axonal_delay: 1,
            ff_axonal_delay: 1,
            internrn_exc_decay: 1.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Number of dendritic synapses of every neuron.
    pub fan_in: usize,
    /// Whether a neuron may connect to itself.
    pub allow_self: bool,
    pub min_axonal_delay: usize,
    pub max_axonal_delay: usize,
    /// The minimum and maximum initial weights.
    pub initial_weight: (f64, f64),
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            fan_in: 10,
            allow_self: false,
            min_axonal_delay: 1,
            max_axonal_delay: 1,
            initial_weight: (0.4, 0.6),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SynapseTypeConfig {
    pub name: String,
    pub learning_rule: LearningRule,
    pub mu: f64,
    pub rise_duration: usize,
    pub alpha: f64,
    pub conduction_gain: f64,
    #[serde(default)]
    pub failure_rate: f64,
    pub pre_type: String,
    pub post_type: String,
    #[serde(default)]
    pub filter: Option<Vec<f64>>,
    #[serde(default)]
    pub rise_curve: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NeuronTypeConfig {
    pub name: String,
    pub is_excitatory: bool,
    #[serde(default)]
    pub is_inhibitory_divisive: bool,
    pub threshold_type: ThresholdType,
    #[serde(default)]
    pub dendrite_filter: Option<Vec<f64>>,
    #[serde(default)]
    pub synapse_filter: Option<Vec<f64>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// An interneuron added on top of the default feedback and feedforward ones.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InterneuronConfig {
    pub is_feedback: bool,
    pub excitation_decay: f64,
    pub buffer_size: usize,
    #[serde(default)]
    pub syn_mod_rate: f64,
    #[serde(default)]
    pub activity_averaging_rate: f64,
    pub multiplier: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub first: usize,
    pub last: usize,
    pub neuron_type: String,
    #[serde(default)]
    pub interneurons: Vec<InterneuronConfig>,
}

/// The parameters of a simulation.
///
/// The somatic excitation of a neuron is `E / (E + D + k0 + kfb * fb + kff * ff) - S`, where `E`, `D` and
/// `S` are its filtered excitatory, divisive and subtractive inputs and `fb`, `ff` the inhibition of its
/// population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Master seed of every random stream.
    pub seed: u64,
    pub delta_t: f64,
    pub k0: f64,
    pub kfb: f64,
    pub kff: f64,
    pub threshold: f64,
    pub firing_mode: FiringMode,
    pub interneurons: InterneuronDefaults,
    pub connectivity: ConnectivityConfig,
    pub synapse_types: Vec<SynapseTypeConfig>,
    pub neuron_types: Vec<NeuronTypeConfig>,
    pub populations: Vec<PopulationConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 42,
            delta_t: 1.0,
            k0: 0.1,
            kfb: 0.05,
            kff: 0.0,
            threshold: 0.5,
            firing_mode: FiringMode::Threshold,
            interneurons: InterneuronDefaults::default(),
            connectivity: ConnectivityConfig::default(),
            synapse_types: vec![],
            neuron_types: vec![],
            populations: vec![],
        }
    }
}

impl SimulationConfig {
    /// Check the consistency of the parameters that do not depend on the catalog.
    pub fn validate(&self) -> Result<(), SimError> {
        let connectivity = &self.connectivity;
        let check = |ok: bool, msg: &str| -> Result<(), SimError> {
            if ok {
                Ok(())
            } else {
                let e = SimError::Config(msg.to_string());
                error!("{}", e);
                Err(e)
            }
        };
        check(self.delta_t > 0.0, "The time step must be positive.")?;
        check(
            connectivity.min_axonal_delay >= 1,
            "Axonal delays must be at least one step.",
        )?;
        check(
            connectivity.min_axonal_delay <= connectivity.max_axonal_delay,
            "The minimum axonal delay must not exceed the maximum axonal delay.",
        )?;
        check(
            connectivity.initial_weight.0 <= connectivity.initial_weight.1,
            "The minimum weight must not exceed the maximum weight.",
        )?;
        check(
            connectivity.initial_weight.0 >= 0.0,
            "Initial weights must be non-negative.",
        )?;
        if let FiringMode::Competitive { activity } = self.firing_mode {
            check(
                (0.0..=1.0).contains(&activity),
                "The competitive activity must lie in [0, 1].",
            )?;
        }
        Ok(())
    }

    /// Register the neuron types, synapse types and populations of the configuration in a new catalog.
    pub fn catalog(&self) -> Result<NetworkCatalog, SimError> {
        let mut catalog = NetworkCatalog::new();

        for config in self.neuron_types.iter() {
            let id = catalog.add_neuron_type(
                &config.name,
                config.is_excitatory,
                config.is_inhibitory_divisive,
                config.threshold_type,
            )?;
            let neuron_type = catalog.neuron_type_mut(id)?;
            if let Some(coefficients) = &config.dendrite_filter {
                neuron_type.load_dendrite_filter_values(coefficients.clone())?;
            }
            if let Some(coefficients) = &config.synapse_filter {
                neuron_type.load_synapse_filter_values(coefficients.clone())?;
            }
            for (name, value) in config.parameters.iter() {
                neuron_type.set_parameter(name, value);
            }
        }

        for config in self.synapse_types.iter() {
            let id = catalog.add_synapse_type(
                &config.name,
                config.learning_rule,
                config.mu,
                config.rise_duration,
                config.alpha,
                config.conduction_gain,
                config.failure_rate,
                &config.pre_type,
                &config.post_type,
            )?;
            let synapse_type = catalog.synapse_type_mut(id)?;
            if let Some(coefficients) = &config.filter {
                synapse_type.set_filter(coefficients.clone())?;
            }
            if config.rise_curve.is_some() {
                synapse_type.set_rise_curve(config.rise_curve.clone())?;
            }
        }

        for config in self.populations.iter() {
            let index = catalog.add_population(config.first, config.last, &config.neuron_type)?;
            let population = catalog.population_mut(index)?;
            for interneuron in config.interneurons.iter() {
                population.add_interneuron(
                    interneuron.is_feedback,
                    interneuron.excitation_decay,
                    interneuron.buffer_size,
                    interneuron.syn_mod_rate,
                    interneuron.activity_averaging_rate,
                    interneuron.multiplier,
                )?;
            }
        }

        Ok(catalog)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SimError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<SimulationConfig, SimError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: SimulationConfig = serde_json::from_reader(reader)
            .map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

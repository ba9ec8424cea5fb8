//! This crate provides a discrete-time simulator for spiking neural networks with plastic synapses and
//! inhibitory interneurons.
//!
//! # Building Networks
//!
//! Synapse types, neuron types and populations are registered in a [`catalog::NetworkCatalog`] during the
//! setup phase. The catalog is then sealed and handed to a [`network::builder::NetworkBuilder`] which
//! allocates the connections.
//!
//! ```rust
//! use rusty_synapse::catalog::NetworkCatalog;
//! use rusty_synapse::config::SimulationConfig;
//! use rusty_synapse::neuron_type::ThresholdType;
//! use rusty_synapse::network::builder::NetworkBuilder;
//! use rusty_synapse::synapse::LearningRule;
//!
//! let mut catalog = NetworkCatalog::new();
//! catalog.add_neuron_type("pyr", true, false, ThresholdType::Simple).unwrap();
//! catalog
//!     .add_synapse_type("pyr_to_pyr", LearningRule::PostSynaptic, 0.01, 5, 0.95, 1.0, 0.0, "pyr", "pyr")
//!     .unwrap();
//! catalog.add_population(0, 99, "pyr").unwrap();
//!
//! let config = SimulationConfig::default();
//! let network = NetworkBuilder::new(&config).build(catalog).unwrap();
//!
//! assert_eq!(network.num_neurons(), 100);
//! assert_eq!(network.num_synapses(), 100 * config.connectivity.fan_in);
//! ```
//!
//! # Simulating Networks
//!
//! ```rust
//! use rusty_synapse::catalog::NetworkCatalog;
//! use rusty_synapse::config::SimulationConfig;
//! use rusty_synapse::interneuron::FiringPattern;
//! use rusty_synapse::neuron_type::ThresholdType;
//! use rusty_synapse::network::builder::NetworkBuilder;
//!
//! let mut catalog = NetworkCatalog::new();
//! catalog.add_neuron_type("pyr", true, false, ThresholdType::Simple).unwrap();
//! catalog.add_population(0, 49, "pyr").unwrap();
//!
//! let config = SimulationConfig::default();
//! let mut network = NetworkBuilder::new(&config).build(catalog).unwrap();
//!
//! // Drive the first ten neurons externally, then let the network run on its own
//! let external = FiringPattern::from_indices(50, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
//! let fired = network.step(Some(&external), true);
//! assert!(fired.len() >= 10);
//! for _ in 0..20 {
//!     network.step(None, true);
//! }
//! assert_eq!(network.time_step(), 21);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod interneuron;
pub mod kinetics;
pub mod network;
pub mod neuron_type;
pub mod noise;
pub mod population;
pub mod synapse;
pub mod synapse_type;

/// The number of entries of the fall table, i.e., the longest memory of a synapse.
pub const MAX_TIME_STEP: usize = 500;
/// The longest supported NMDA rise duration.
pub const MAX_RISE_DURATION: usize = 20;
/// The resolution at which the efficacy of a synapse is quantized when a new rise starts.
pub const ZBAR_RESOLUTION: usize = 1000;
/// The offset between two consecutive rows of a rise table built from a custom rise curve.
pub const RISE_ROW_OFFSET: f64 = 0.001;
/// The fall value below which a synapse is considered inactive.
pub const FALL_CUTOFF: f64 = 1e-3;
/// Modification rates below this value disable learning.
pub const LEARNING_TOLERANCE: f64 = 1e-8;

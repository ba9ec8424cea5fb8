//! Network (with neurons, synapses and interneurons) structure and step engine.
pub mod builder;
pub mod firing;
pub mod network;

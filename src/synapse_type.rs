//! Shared parameters of the synapses connecting two kinds of neurons.
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::SimError;
use super::filter::Filter;
use super::kinetics::{DecayKineticsTable, RiseShape};
use super::synapse::LearningRule;

/// Handle to a synapse type registered in a catalog.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct SynapseTypeId(usize);

impl SynapseTypeId {
    pub fn new(index: usize) -> Self {
        SynapseTypeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Represents the parameters shared by all synapses of a kind: learning rule, rates, kinetics and filter.
#[derive(Debug, PartialEq, Clone)]
pub struct SynapseType {
    name: String,
    learning_rule: LearningRule,
    mu: f64,
    conduction_gain: f64,
    success_rate: f64,
    pre_type: String,
    post_type: String,
    filter: Filter,
    kinetics: DecayKineticsTable,
}

impl SynapseType {
    /// Create a new synapse type.
    /// The function returns an error if the kinetics tables cannot be built (see [`DecayKineticsTable::build`]).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        learning_rule: LearningRule,
        mu: f64,
        rise_duration: usize,
        alpha: f64,
        conduction_gain: f64,
        failure_rate: f64,
        pre_type: &str,
        post_type: &str,
    ) -> Result<Self, SimError> {
        let kinetics =
            DecayKineticsTable::build(rise_duration, alpha, shape_of(learning_rule), None)?;
        Ok(SynapseType {
            name: name.to_string(),
            learning_rule,
            mu,
            conduction_gain,
            success_rate: 1.0 - failure_rate,
            pre_type: pre_type.to_string(),
            post_type: post_type.to_string(),
            filter: Filter::default(),
            kinetics,
        })
    }

    /// The synapse type used between neurons of the given type when nothing more specific is registered:
    /// no learning, instantaneous rise and fall, unit gain and reliable transmission.
    pub fn fallback(neuron_type: &str) -> Result<Self, SimError> {
        SynapseType::new(
            "",
            LearningRule::PostSynaptic,
            0.0,
            1,
            0.0,
            1.0,
            0.0,
            neuron_type,
            neuron_type,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn learning_rule(&self) -> LearningRule {
        self.learning_rule
    }

    /// Returns the synaptic modification rate.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Returns the factor applied to the weight of a synapse when it transmits a spike.
    pub fn conduction_gain(&self) -> f64 {
        self.conduction_gain
    }

    /// Returns the probability that a spike goes through.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// Returns the name of the presynaptic neuron type.
    pub fn pre_type(&self) -> &str {
        &self.pre_type
    }

    /// Returns the name of the postsynaptic neuron type.
    pub fn post_type(&self) -> &str {
        &self.post_type
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn kinetics(&self) -> &DecayKineticsTable {
        &self.kinetics
    }

    pub fn alpha(&self) -> f64 {
        self.kinetics.alpha()
    }

    pub fn rise_duration(&self) -> usize {
        self.kinetics.rise_duration()
    }

    pub fn set_mu(&mut self, mu: f64) {
        self.mu = mu;
    }

    pub fn set_conduction_gain(&mut self, conduction_gain: f64) {
        self.conduction_gain = conduction_gain;
    }

    /// Set the probability that a spike fails to go through.
    pub fn set_failure_rate(&mut self, failure_rate: f64) {
        self.success_rate = 1.0 - failure_rate;
    }

    /// Replace the coefficients of the synaptic filter.
    pub fn set_filter(&mut self, coefficients: Vec<f64>) -> Result<(), SimError> {
        self.filter.set_coefficients(coefficients)
    }

    /// Change the learning rule; the rise tables are rebuilt if their shape changes.
    pub fn set_learning_rule(&mut self, learning_rule: LearningRule) -> Result<(), SimError> {
        let previous = shape_of(self.learning_rule);
        if previous != shape_of(learning_rule) {
            self.rebuild(
                self.kinetics.rise_duration(),
                self.kinetics.alpha(),
                shape_of(learning_rule),
                self.kinetics.rise_curve().map(Path::to_path_buf),
            )?;
        }
        self.learning_rule = learning_rule;
        Ok(())
    }

    /// Change the decay constant of the fall and rebuild the kinetics tables.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<(), SimError> {
        self.rebuild(
            self.kinetics.rise_duration(),
            alpha,
            self.kinetics.shape(),
            self.kinetics.rise_curve().map(Path::to_path_buf),
        )
    }

    /// Change the rise duration and rebuild the kinetics tables.
    pub fn set_rise_duration(&mut self, rise_duration: usize) -> Result<(), SimError> {
        self.rebuild(
            rise_duration,
            self.kinetics.alpha(),
            self.kinetics.shape(),
            self.kinetics.rise_curve().map(Path::to_path_buf),
        )
    }

    /// Use a custom rise curve (or go back to the default one) and rebuild the kinetics tables.
    pub fn set_rise_curve(&mut self, rise_curve: Option<PathBuf>) -> Result<(), SimError> {
        self.rebuild(
            self.kinetics.rise_duration(),
            self.kinetics.alpha(),
            self.kinetics.shape(),
            rise_curve,
        )
    }

    /// Write the kinetics tables in the given directory.
    pub fn save_kinetics<P: AsRef<Path>>(&self, dir: P) -> Result<(), SimError> {
        self.kinetics.save_to(dir)
    }

    /// The tables are only replaced if the new ones could be built.
    fn rebuild(
        &mut self,
        rise_duration: usize,
        alpha: f64,
        shape: RiseShape,
        rise_curve: Option<PathBuf>,
    ) -> Result<(), SimError> {
        self.kinetics =
            DecayKineticsTable::build(rise_duration, alpha, shape, rise_curve.as_deref())?;
        info!("Kinetics of synapse type {:?} rebuilt", self.name);
        Ok(())
    }
}

fn shape_of(learning_rule: LearningRule) -> RiseShape {
    match learning_rule {
        LearningRule::PostSynapticB => RiseShape::Step,
        _ => RiseShape::Ramp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetics::KineticsDump;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn synapse_type() -> SynapseType {
        SynapseType::new(
            "pyr_to_pyr",
            LearningRule::PostSynaptic,
            0.05,
            10,
            0.9,
            0.3,
            0.2,
            "pyr",
            "int",
        )
        .unwrap()
    }

    #[test]
    fn test_new() {
        let syn_type = synapse_type();
        assert_eq!(syn_type.name(), "pyr_to_pyr");
        assert_eq!(syn_type.learning_rule(), LearningRule::PostSynaptic);
        assert_eq!(syn_type.mu(), 0.05);
        assert_eq!(syn_type.rise_duration(), 10);
        assert_eq!(syn_type.alpha(), 0.9);
        assert_eq!(syn_type.conduction_gain(), 0.3);
        assert_relative_eq!(syn_type.success_rate(), 0.8);
        assert_eq!(syn_type.pre_type(), "pyr");
        assert_eq!(syn_type.post_type(), "int");
        assert_eq!(syn_type.filter().coefficients(), &[1.0]);
    }

    #[test]
    fn test_new_invalid_rise() {
        assert!(SynapseType::new(
            "bad",
            LearningRule::PostSynaptic,
            0.05,
            25,
            0.9,
            0.3,
            0.0,
            "pyr",
            "pyr"
        )
        .is_err());
    }

    #[test]
    fn test_fallback() {
        let syn_type = SynapseType::fallback("pyr").unwrap();
        assert_eq!(syn_type.name(), "");
        assert_eq!(syn_type.mu(), 0.0);
        assert_eq!(syn_type.rise_duration(), 1);
        assert_eq!(syn_type.success_rate(), 1.0);
        assert_eq!(syn_type.pre_type(), "pyr");
        assert_eq!(syn_type.post_type(), "pyr");
    }

    #[test]
    fn test_setters() {
        let mut syn_type = synapse_type();
        syn_type.set_mu(0.1);
        syn_type.set_conduction_gain(2.0);
        syn_type.set_failure_rate(0.5);
        assert_eq!(syn_type.mu(), 0.1);
        assert_eq!(syn_type.conduction_gain(), 2.0);
        assert_eq!(syn_type.success_rate(), 0.5);

        syn_type.set_filter(vec![0.5, 0.5]).unwrap();
        assert_eq!(syn_type.filter().len(), 2);
        assert_eq!(syn_type.set_filter(vec![]), Err(SimError::EmptyFilter));
        assert_eq!(syn_type.filter().len(), 2);
    }

    #[test]
    fn test_setters_rebuild_kinetics() {
        let mut syn_type = synapse_type();
        syn_type.set_rise_duration(4).unwrap();
        assert_relative_eq!(syn_type.kinetics().rise(0, 1), 0.25);

        syn_type.set_alpha(0.5).unwrap();
        assert_relative_eq!(syn_type.kinetics().fall(1), 0.5);
        assert_eq!(syn_type.kinetics().max_time_step(), 10);

        syn_type.set_learning_rule(LearningRule::PostSynapticB).unwrap();
        assert_eq!(syn_type.kinetics().rise(0, 1), 0.0);
        syn_type.set_learning_rule(LearningRule::MovingAverage).unwrap();
        assert_relative_eq!(syn_type.kinetics().rise(0, 1), 0.25);

        // A failed rebuild leaves the tables untouched
        assert!(syn_type.set_rise_duration(30).is_err());
        assert_eq!(syn_type.rise_duration(), 4);
        assert!(syn_type.set_alpha(2.0).is_err());
        assert_eq!(syn_type.alpha(), 0.5);
    }

    #[test]
    fn test_rise_curve() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "0 0.1 0.9 1").unwrap();

        let mut syn_type = synapse_type();
        // Length does not match the rise duration of 10
        assert!(matches!(
            syn_type.set_rise_curve(Some(file.path().to_path_buf())),
            Err(SimError::RiseCurve(_))
        ));
        syn_type.set_rise_duration(3).unwrap();
        syn_type
            .set_rise_curve(Some(file.path().to_path_buf()))
            .unwrap();
        assert_relative_eq!(syn_type.kinetics().rise(0, 2), 0.9);

        // The curve is kept when other parameters change
        syn_type.set_alpha(0.8).unwrap();
        assert_relative_eq!(syn_type.kinetics().rise(0, 1), 0.1);

        syn_type.set_rise_curve(None).unwrap();
        assert_relative_eq!(syn_type.kinetics().rise(0, 1), 1.0 / 3.0);
    }

    #[test]
    fn test_save_kinetics() {
        let dir = tempdir().unwrap();
        let syn_type = synapse_type();
        syn_type.save_kinetics(dir.path()).unwrap();
        let dump = KineticsDump::load_from(dir.path()).unwrap();
        assert_relative_eq!(dump.rise[0][1], 0.1);
        assert_relative_eq!(dump.fall[2], 0.81, epsilon = 1e-12);
    }
}

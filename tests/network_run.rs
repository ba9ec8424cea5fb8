use tempfile::tempdir;

use rusty_synapse::config::{
    FiringMode, InterneuronConfig, NeuronTypeConfig, PopulationConfig, SimulationConfig,
    SynapseTypeConfig,
};
use rusty_synapse::interneuron::FiringPattern;
use rusty_synapse::network::builder::NetworkBuilder;
use rusty_synapse::network::network::Network;
use rusty_synapse::neuron_type::ThresholdType;
use rusty_synapse::synapse::LearningRule;

fn config() -> SimulationConfig {
    let mut config = SimulationConfig {
        seed: 3,
        firing_mode: FiringMode::Competitive { activity: 0.1 },
        neuron_types: vec![
            NeuronTypeConfig {
                name: "pyr".to_string(),
                is_excitatory: true,
                is_inhibitory_divisive: false,
                threshold_type: ThresholdType::Simple,
                dendrite_filter: None,
                synapse_filter: Some(vec![1.0, 0.5, 0.25]),
                parameters: [("lambdaFB".to_string(), "0.01".to_string())].into(),
            },
            NeuronTypeConfig {
                name: "basket".to_string(),
                is_excitatory: false,
                is_inhibitory_divisive: true,
                threshold_type: ThresholdType::Exponential,
                dendrite_filter: None,
                synapse_filter: None,
                parameters: Default::default(),
            },
        ],
        synapse_types: vec![
            SynapseTypeConfig {
                name: "pyr_to_pyr".to_string(),
                learning_rule: LearningRule::MovingAverage,
                mu: 0.02,
                rise_duration: 4,
                alpha: 0.9,
                conduction_gain: 1.0,
                failure_rate: 0.2,
                pre_type: "pyr".to_string(),
                post_type: "pyr".to_string(),
                filter: None,
                rise_curve: None,
            },
            SynapseTypeConfig {
                name: "pyr_to_basket".to_string(),
                learning_rule: LearningRule::MultiActivation,
                mu: 0.01,
                rise_duration: 2,
                alpha: 0.8,
                conduction_gain: 0.5,
                failure_rate: 0.0,
                pre_type: "pyr".to_string(),
                post_type: "basket".to_string(),
                filter: None,
                rise_curve: None,
            },
        ],
        populations: vec![
            PopulationConfig {
                first: 0,
                last: 79,
                neuron_type: "pyr".to_string(),
                interneurons: vec![InterneuronConfig {
                    is_feedback: true,
                    excitation_decay: 0.5,
                    buffer_size: 2,
                    syn_mod_rate: 0.0,
                    activity_averaging_rate: 0.0,
                    multiplier: 2.0,
                }],
            },
            PopulationConfig {
                first: 80,
                last: 99,
                neuron_type: "basket".to_string(),
                interneurons: vec![],
            },
        ],
        ..SimulationConfig::default()
    };
    config.connectivity.fan_in = 8;
    config.connectivity.max_axonal_delay = 3;
    config
}

fn build(config: &SimulationConfig) -> Network {
    NetworkBuilder::new(config)
        .build(config.catalog().unwrap())
        .unwrap()
}

fn run(network: &mut Network, num_steps: usize) -> Vec<Vec<usize>> {
    let pattern = FiringPattern::from_indices(100, &(0..10).collect::<Vec<usize>>());
    (0..num_steps)
        .map(|step| {
            if step % 10 == 0 {
                let external = network.add_external_noise(&pattern, 0.05);
                network.step(Some(&external), true)
            } else {
                network.step(None, true)
            }
        })
        .collect()
}

#[test]
fn test_same_seed_same_activity() {
    let config = config();
    let mut first = build(&config);
    let mut second = build(&config);
    assert_eq!(run(&mut first, 100), run(&mut second, 100));
    assert_eq!(first, second);
    assert_eq!(first.time_step(), 100);
}

#[test]
fn test_competitive_activity() {
    let config = config();
    let mut network = build(&config);
    for fired in run(&mut network, 50) {
        // 8 pyramidal and 2 basket winners, plus externally driven neurons
        assert!(fired.len() >= 10);
        assert!(fired.iter().filter(|i| **i < 80).count() >= 8);
        assert!(fired.iter().filter(|i| **i >= 80).count() >= 2);
    }
}

#[test]
fn test_weights_stay_non_negative() {
    let config = config();
    let mut network = build(&config);
    run(&mut network, 200);
    for target in 0..network.num_neurons() {
        assert!(network
            .fan_in(target)
            .unwrap()
            .iter()
            .all(|synapse| synapse.weight() >= 0.0));
    }
    for population in network.populations() {
        for interneuron in population.feedback_interneurons() {
            assert!(interneuron.weights().iter().all(|w| *w >= 0.0));
        }
    }
}

#[test]
fn test_config_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let config = config();
    config.save_to(&path).unwrap();
    let loaded = SimulationConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let mut first = build(&config);
    let mut second = build(&loaded);
    assert_eq!(run(&mut first, 30), run(&mut second, 30));
}

#[test]
fn test_saved_inhibition_state() {
    let config = config();
    let mut network = build(&config);
    run(&mut network, 20);
    let population = network.population_mut(0).unwrap();
    population.save_inh_state();
    let before = population.feedback_inhibition();
    population.calc_new_feedback_inhibition(&(0..80).collect::<Vec<usize>>());
    population.restore_inh_state().unwrap();
    assert_eq!(population.feedback_inhibition(), before);
}

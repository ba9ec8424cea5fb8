use clap::Parser;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use rusty_synapse::config::{
    FiringMode, NeuronTypeConfig, PopulationConfig, SimulationConfig, SynapseTypeConfig,
};
use rusty_synapse::error::SimError;
use rusty_synapse::interneuron::FiringPattern;
use rusty_synapse::network::builder::NetworkBuilder;
use rusty_synapse::neuron_type::ThresholdType;
use rusty_synapse::synapse::LearningRule;

#[derive(Parser, Debug)]
struct Args {
    /// A JSON simulation configuration; a small CA3-like network is used if omitted
    #[arg(long)]
    config: Option<String>,
    /// Overrides the master seed of the configuration
    #[arg(long)]
    seed: Option<u64>,
    /// The number of neurons of the default network
    #[arg(short = 'N', long, default_value = "400")]
    num_neurons: usize,
    /// The number of neurons driven by each pattern of the sequence
    #[arg(long, default_value = "20")]
    pattern_size: usize,
    /// The number of patterns of the sequence
    #[arg(long, default_value = "10")]
    num_patterns: usize,
    /// The number of training trials
    #[arg(long, default_value = "30")]
    num_trials: usize,
    /// The probability of flipping each neuron of an external pattern
    #[arg(long, default_value = "0.0")]
    noise: f64,
    /// The log file
    #[arg(long, default_value = "log/ca3_sequence.log")]
    log_path: String,
    /// Where to write the final configuration
    #[arg(long)]
    save_config: Option<String>,
    /// Where to dump the kinetics tables of the synapse types
    #[arg(long)]
    dump_kinetics: Option<String>,
}

fn default_config(num_neurons: usize) -> SimulationConfig {
    let mut config = SimulationConfig {
        k0: 0.2,
        kfb: 0.02,
        kff: 0.01,
        threshold: 0.5,
        firing_mode: FiringMode::Competitive { activity: 0.08 },
        neuron_types: vec![NeuronTypeConfig {
            name: "pyr".to_string(),
            is_excitatory: true,
            is_inhibitory_divisive: false,
            threshold_type: ThresholdType::Simple,
            dendrite_filter: None,
            synapse_filter: None,
            parameters: Default::default(),
        }],
        synapse_types: vec![SynapseTypeConfig {
            name: "pyr_to_pyr".to_string(),
            learning_rule: LearningRule::PostSynaptic,
            mu: 0.05,
            rise_duration: 3,
            alpha: (-1.0_f64 / 20.0).exp(),
            conduction_gain: 1.0,
            failure_rate: 0.1,
            pre_type: "pyr".to_string(),
            post_type: "pyr".to_string(),
            filter: None,
            rise_curve: None,
        }],
        populations: vec![PopulationConfig {
            first: 0,
            last: num_neurons - 1,
            neuron_type: "pyr".to_string(),
            interneurons: vec![],
        }],
        ..SimulationConfig::default()
    };
    config.connectivity.fan_in = num_neurons / 10;
    config.connectivity.initial_weight = (0.3, 0.5);
    config
}

fn main() -> Result<(), SimError> {
    let args = Args::parse();

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build(&args.log_path)
        .map_err(|e| SimError::IOError(e.to_string()))?;

    let log_config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(LevelFilter::Info))
        .map_err(|e| SimError::IOError(e.to_string()))?;

    log4rs::init_config(log_config).map_err(|e| SimError::IOError(e.to_string()))?;

    log::info!("{:?}", args);

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load_from(path)?,
        None => default_config(args.num_neurons),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let catalog = config.catalog()?;
    let mut network = NetworkBuilder::new(&config).build(catalog)?;
    log::info!("Network building: done!");

    if let Some(dir) = &args.dump_kinetics {
        for synapse_type in network.catalog().synapse_types() {
            if !synapse_type.name().is_empty() {
                synapse_type.save_kinetics(dir)?;
            }
        }
        log::info!("Kinetics tables saved to {}", dir);
    }

    // The sequence drives disjoint blocks of neurons, one block per step
    let num_neurons = network.num_neurons();
    let sequence: Vec<FiringPattern> = (0..args.num_patterns)
        .map(|k| {
            let first = (k * args.pattern_size) % num_neurons;
            let indices: Vec<usize> = (first..first + args.pattern_size)
                .map(|i| i % num_neurons)
                .collect();
            FiringPattern::from_indices(num_neurons, &indices)
        })
        .collect();

    for trial in 0..args.num_trials {
        network.reset_firing();
        for pattern in sequence.iter() {
            let external = network.add_external_noise(pattern, args.noise);
            network.step(Some(&external), true);
        }
        log::info!(
            "Trial {}: mean weight is {:.4}",
            trial,
            network.mean_weight()
        );
    }

    // Recall: only the first pattern is given
    network.reset_firing();
    let mut fired = network.step(sequence.first(), false);
    for (k, pattern) in sequence.iter().enumerate().skip(1) {
        fired = network.step(None, false);
        let expected = pattern.indices();
        let overlap = fired.iter().filter(|i| expected.contains(i)).count();
        log::info!(
            "Recall step {}: {} neurons fired, {} of {} expected",
            k,
            fired.len(),
            overlap,
            expected.len()
        );
    }
    log::info!("Last step fired {:?}", fired);

    if let Some(path) = &args.save_config {
        config.save_to(path)?;
        log::info!("Configuration saved to {}", path);
    }
    Ok(())
}

//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use qcc_ml::{
    ClassifierCircuit, ClassifierStructure, Dataset, DiagnosticSink, Optimizer, QccConfig,
    TrainingOptions, TrainingResult, random_seeds,
};

use super::TrainArgs;
use super::progress::ConsoleSink;

/// Dataset file name looked up when `--data` is not given.
pub const DEFAULT_DATA_FILE: &str = "data.json";

/// Layer count used with random restarts when the config does not set one.
pub const DEFAULT_LAYERS: usize = 2;

/// Built-in starting points for the four-feature, two-layer wine classifier.
pub const WINE_SEEDS: [[f64; 16]; 3] = [
    [
        0.060057, 3.00522, 2.03083, 0.63527, 1.03771, 1.27881, 4.10186, 5.34396, 0.060057,
        3.00522, 2.03083, 0.63527, 1.03771, 2.03083, 0.63527, 1.03771,
    ],
    [
        0.586514, 3.371623, 0.860791, 2.92517, 1.14616, 2.99776, 2.26505, 5.62137, 0.060057,
        3.00522, 2.03083, 0.63527, 1.03771, 2.03083, 0.63527, 1.03771,
    ],
    [
        5.21662, 6.04363, 0.224184, 1.53913, 0.060057, 3.00522, 2.03083, 0.63527, 1.03771,
        1.27881, 4.10186, 5.34396, 1.64524, 2.03083, 0.63527, 1.03771,
    ],
];

/// Resolve the dataset path: explicit, else beside the executable, else the
/// working directory.
pub fn resolve_data_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_DATA_FILE)));
    match beside_exe {
        Some(path) if path.is_file() => path,
        _ => PathBuf::from(DEFAULT_DATA_FILE),
    }
}

/// Load the dataset, resolving the default location.
pub fn load_dataset(explicit: Option<&Path>) -> Result<Dataset> {
    let path = resolve_data_path(explicit);
    Dataset::from_path(&path)
        .with_context(|| format!("Failed to load dataset: {}", path.display()))
}

/// Load starting points from a JSON array of arrays.
pub fn load_seeds(path: &Path) -> Result<Vec<Vec<f64>>> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seeds file: {}", path.display()))?;
    let seeds: Vec<Vec<f64>> = serde_json::from_str(&source)
        .with_context(|| format!("Failed to parse seeds file: {}", path.display()))?;
    if seeds.is_empty() {
        anyhow::bail!("Seeds file {} contains no seeds", path.display());
    }
    Ok(seeds)
}

/// Pick the circuit structure and the starting points for a training run.
pub fn prepare_seeds(
    config: &QccConfig,
    args: &TrainArgs,
    feature_dimension: usize,
) -> Result<(ClassifierStructure, Vec<Vec<f64>>)> {
    if let Some(count) = args.random_restarts {
        if count == 0 {
            anyhow::bail!("--random-restarts must be at least 1");
        }
        let num_qubits = config.classifier.num_qubits.unwrap_or(feature_dimension);
        let layers = config.classifier.layers.unwrap_or(DEFAULT_LAYERS);
        let structure = config
            .classifier
            .resolve(feature_dimension, 2 * num_qubits * layers)?;
        let seeds = random_seeds(count, structure.num_parameters(), args.rng_seed);
        debug!(count, rng_seed = args.rng_seed, "drew random seeds");
        return Ok((structure, seeds));
    }

    let seeds = match &args.seeds {
        Some(path) => load_seeds(path)?,
        None => WINE_SEEDS.iter().map(|s| s.to_vec()).collect(),
    };
    let structure = config
        .classifier
        .resolve(feature_dimension, seeds[0].len())
        .with_context(|| {
            format!(
                "Seeds of length {} do not fit a {feature_dimension}-feature classifier",
                seeds[0].len()
            )
        })?;
    Ok((structure, seeds))
}

/// Apply command-line overrides on top of the configured options.
pub fn training_options(config: &QccConfig, args: &TrainArgs) -> TrainingOptions {
    let mut options = config.training.clone();
    if let Some(lr) = args.learning_rate {
        options.learning_rate = lr;
    }
    if let Some(max) = args.max_iterations {
        options.max_iterations = max;
    }
    if args.sequential {
        options.parallel = false;
    }
    options
}

/// Outcome of [`train_from_args`].
pub struct TrainedRun {
    pub dataset: Dataset,
    pub circuit: ClassifierCircuit,
    pub result: TrainingResult,
}

/// Load data and seeds, then train on a blocking thread.
pub async fn train_from_args(config: &QccConfig, args: &TrainArgs) -> Result<TrainedRun> {
    let dataset = load_dataset(args.data.as_deref())?;
    let Some(dim) = dataset.feature_dimension() else {
        anyhow::bail!("Dataset contains no examples");
    };

    let (structure, seeds) = prepare_seeds(config, args, dim)?;
    let circuit = ClassifierCircuit::new(structure)?;
    let options = training_options(config, args);
    options.validate()?;

    info!(
        qubits = structure.num_qubits,
        layers = structure.layers,
        restarts = seeds.len(),
        "training classifier"
    );

    let sink = ConsoleSink::new(seeds.len(), &config.logging)?;
    let optimizer = Optimizer::new(circuit.clone(), options)
        .with_sink(Arc::new(sink.clone()) as Arc<dyn DiagnosticSink>);

    let examples = dataset.training().to_vec();
    let task = tokio::task::spawn_blocking(move || optimizer.train(&examples, &seeds));

    let joined = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| {
                sink.abandon();
                anyhow::anyhow!("Training did not finish within {secs}s")
            })?,
        None => task.await,
    };
    let result = joined.context("Training task panicked")?;
    sink.finish();

    Ok(TrainedRun {
        dataset,
        circuit,
        result: result?,
    })
}

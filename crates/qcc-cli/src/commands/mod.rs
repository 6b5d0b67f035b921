//! CLI command implementations.

use std::path::PathBuf;

use clap::Args;

pub mod common;
pub mod progress;
pub mod run;
pub mod train;
pub mod validate;
pub mod version;

/// Arguments shared by the commands that train a model.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Dataset file (defaults to data.json beside the executable)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// JSON file with an array of starting parameter vectors
    #[arg(short, long, conflicts_with = "random_restarts")]
    pub seeds: Option<PathBuf>,

    /// Draw this many random starting points instead of the built-in seeds
    #[arg(long)]
    pub random_restarts: Option<usize>,

    /// Seed for --random-restarts
    #[arg(long, default_value = "0")]
    pub rng_seed: u64,

    /// Abort training after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Override the configured learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Override the configured iteration budget per restart
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Run restarts one after another
    #[arg(long)]
    pub sequential: bool,
}

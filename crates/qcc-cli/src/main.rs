//! qcc Command-Line Interface
//!
//! Trains a variational quantum circuit classifier on a labeled dataset and
//! reports how many validation examples it misclassifies.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use qcc_ml::QccConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{TrainArgs, run, train, validate, version};

/// qcc - variational quantum circuit classifier
#[derive(Parser, Debug)]
#[command(name = "qcc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "QCC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on the training split, then count validation misclassifications
    Run {
        #[command(flatten)]
        train: TrainArgs,

        /// Also write the trained model to this file
        #[arg(long)]
        model_out: Option<PathBuf>,
    },

    /// Train and save the model
    Train {
        #[command(flatten)]
        train: TrainArgs,

        /// Output model file (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate a saved model against a dataset
    Validate {
        /// Dataset file (defaults to data.json beside the executable)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Model file produced by `qcc train`
        #[arg(short, long)]
        model: PathBuf,

        /// Evaluate the training split instead of the validation split
        #[arg(long)]
        training: bool,

        /// Also report scores estimated from this many measurement shots
        #[arg(long)]
        shots: Option<usize>,

        /// Seed for the shot sampler
        #[arg(long, default_value = "0", requires = "shots")]
        rng_seed: u64,
    },

    /// Show version information
    Version,
}

fn log_filter(verbose: u8, config: Option<&QccConfig>) -> String {
    match verbose {
        0 => config.map_or_else(|| "warn".to_string(), |c| c.logging.level.to_lowercase()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = QccConfig::load(cli.config.as_deref());

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter(cli.verbose, config.as_ref().ok())))
        .with_target(false)
        .init();

    // Execute command
    let result = match (cli.command, config) {
        (Commands::Version, _) => {
            version::execute();
            Ok(())
        }
        (_, Err(e)) => Err(anyhow::Error::new(e).context("Failed to load configuration")),
        (Commands::Run { train, model_out }, Ok(config)) => {
            run::execute(&config, &train, model_out.as_deref()).await
        }
        (Commands::Train { train, output }, Ok(config)) => {
            train::execute(&config, &train, &output).await
        }
        (
            Commands::Validate {
                data,
                model,
                training,
                shots,
                rng_seed,
            },
            Ok(_),
        ) => validate::execute(
            data.as_deref(),
            &model,
            training,
            shots.map(|shots| (shots, rng_seed)),
        ),
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["qcc", "run"]).unwrap();
        match cli.command {
            Commands::Run { train, model_out } => {
                assert!(train.data.is_none());
                assert!(train.seeds.is_none());
                assert!(train.random_restarts.is_none());
                assert_eq!(train.rng_seed, 0);
                assert!(train.timeout.is_none());
                assert!(model_out.is_none());
            }
            other => panic!("Expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_with_all_args() {
        let cli = Cli::try_parse_from([
            "qcc",
            "run",
            "--data",
            "wine.json",
            "--random-restarts",
            "8",
            "--rng-seed",
            "42",
            "--timeout",
            "30",
            "--learning-rate",
            "0.05",
            "--max-iterations",
            "500",
            "--sequential",
            "--model-out",
            "model.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { train, model_out } => {
                assert_eq!(train.data.unwrap(), PathBuf::from("wine.json"));
                assert_eq!(train.random_restarts, Some(8));
                assert_eq!(train.rng_seed, 42);
                assert_eq!(train.timeout, Some(30));
                assert_eq!(train.learning_rate, Some(0.05));
                assert_eq!(train.max_iterations, Some(500));
                assert!(train.sequential);
                assert_eq!(model_out.unwrap(), PathBuf::from("model.json"));
            }
            other => panic!("Expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn test_seeds_conflict_with_random_restarts() {
        let result = Cli::try_parse_from([
            "qcc",
            "run",
            "--seeds",
            "seeds.json",
            "--random-restarts",
            "4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_train_requires_output() {
        assert!(Cli::try_parse_from(["qcc", "train"]).is_err());
        let cli = Cli::try_parse_from(["qcc", "train", "-o", "m.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Train { .. }));
    }

    #[test]
    fn test_parse_validate() {
        let cli =
            Cli::try_parse_from(["qcc", "validate", "-m", "m.json", "-d", "d.json"]).unwrap();
        match cli.command {
            Commands::Validate {
                data,
                model,
                training,
                shots,
                ..
            } => {
                assert_eq!(data.unwrap(), PathBuf::from("d.json"));
                assert_eq!(model, PathBuf::from("m.json"));
                assert!(!training);
                assert!(shots.is_none());
            }
            other => panic!("Expected Validate command, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["qcc", "validate"]).is_err());
    }

    #[test]
    fn test_parse_validate_shots() {
        let cli = Cli::try_parse_from([
            "qcc", "validate", "-m", "m.json", "--shots", "200", "--rng-seed", "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate {
                shots, rng_seed, ..
            } => {
                assert_eq!(shots, Some(200));
                assert_eq!(rng_seed, 4);
            }
            other => panic!("Expected Validate command, got {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["qcc", "validate", "-m", "m.json", "--rng-seed", "4"]).is_err()
        );
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["qcc", "version", "-vv", "--config", "qcc.yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.unwrap(), PathBuf::from("qcc.yaml"));
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0, None), "warn");
        let config = QccConfig::from_yaml_str("logging:\n  level: DEBUG\n").unwrap();
        assert_eq!(log_filter(0, Some(&config)), "debug");
        assert_eq!(log_filter(1, Some(&config)), "info");
        assert_eq!(log_filter(5, None), "trace");
    }
}

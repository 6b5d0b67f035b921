//! Run command implementation.
//!
//! Train on the training split, then validate on the validation split.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use qcc_ml::{Evaluator, QccConfig};

use super::TrainArgs;
use super::common::train_from_args;

/// Execute the run command.
pub async fn execute(config: &QccConfig, args: &TrainArgs, model_out: Option<&Path>) -> Result<()> {
    println!("{} Training classifier", style("→").cyan().bold());

    let run = train_from_args(config, args).await?;
    let result = &run.result;
    println!(
        "{} Best restart {}: loss {:.6}, {} training misclassifications",
        style("✓").green().bold(),
        result.seed_index,
        result.loss,
        result.training_misses
    );

    let report = Evaluator::new(run.circuit.clone())
        .validate(run.dataset.validation(), &result.parameters, result.bias)?;

    if let Some(path) = model_out {
        result
            .to_model(&run.circuit)
            .save(path)
            .with_context(|| format!("Failed to write model: {}", path.display()))?;
        println!("  Model written to {}", style(path.display()).green());
    }

    println!("Observed {} misclassifications.", report.misses);
    Ok(())
}

//! Train command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use qcc_ml::QccConfig;

use super::TrainArgs;
use super::common::train_from_args;

/// Execute the train command.
pub async fn execute(config: &QccConfig, args: &TrainArgs, output: &Path) -> Result<()> {
    println!("{} Training classifier", style("→").cyan().bold());

    let run = train_from_args(config, args).await?;
    let result = &run.result;
    result
        .to_model(&run.circuit)
        .save(output)
        .with_context(|| format!("Failed to write model: {}", output.display()))?;

    println!(
        "{} Restart {} selected after {} iterations{}",
        style("✓").green().bold(),
        result.seed_index,
        result.iterations,
        if result.converged { " (converged)" } else { "" }
    );
    println!("  Loss:              {:.6}", result.loss);
    println!("  Bias:              {:.6}", result.bias);
    println!("  Training misses:   {}", result.training_misses);
    println!("  Model:             {}", style(output.display()).green());
    Ok(())
}

//! Validate command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use qcc_ml::{Evaluator, TrainedModel};

use super::common::load_dataset;

/// Execute the validate command.
///
/// `sampling` is `(shots, rng_seed)` for the optional shot-sampled report.
pub fn execute(
    data: Option<&Path>,
    model_path: &Path,
    training: bool,
    sampling: Option<(usize, u64)>,
) -> Result<()> {
    let model = TrainedModel::from_path(model_path)
        .with_context(|| format!("Failed to load model: {}", model_path.display()))?;
    let dataset = load_dataset(data)?;

    let (split, examples) = if training {
        ("training", dataset.training())
    } else {
        ("validation", dataset.validation())
    };

    let evaluator = Evaluator::for_model(&model)?;
    let report = evaluator.validate_model(examples, &model)?;
    let confusion = report.confusion;

    println!(
        "{} Validated {} on {} {} examples",
        style("✓").green().bold(),
        style(model_path.display()).cyan(),
        report.total,
        split
    );
    println!("  {report}");
    println!("                 predicted 0  predicted 1");
    println!(
        "  actual 0       {:>11}  {:>11}",
        confusion.true_negative, confusion.false_positive
    );
    println!(
        "  actual 1       {:>11}  {:>11}",
        confusion.false_negative, confusion.true_positive
    );
    if let Some((shots, rng_seed)) = sampling {
        let sampled =
            evaluator.validate_sampled(examples, &model.parameters, model.bias, shots, rng_seed)?;
        println!("  {sampled} with {shots} shots per example");
    }
    println!("Observed {} misclassifications.", report.misses);
    Ok(())
}

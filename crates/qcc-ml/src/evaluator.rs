//! Validation of a trained classifier against labeled examples.

use std::fmt;

use qcc_sim::Statevector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::circuit::{ClassifierCircuit, decide};
use crate::dataset::{Label, LabeledExample};
use crate::error::{MlError, MlResult};
use crate::model::TrainedModel;

/// Counts of predicted vs. true classes (class 1 is "positive").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Predicted 1, true 1.
    pub true_positive: usize,
    /// Predicted 0, true 0.
    pub true_negative: usize,
    /// Predicted 1, true 0.
    pub false_positive: usize,
    /// Predicted 0, true 1.
    pub false_negative: usize,
}

impl ConfusionMatrix {
    fn record(&mut self, predicted: Label, actual: Label) {
        match (predicted, actual) {
            (Label::One, Label::One) => self.true_positive += 1,
            (Label::Zero, Label::Zero) => self.true_negative += 1,
            (Label::One, Label::Zero) => self.false_positive += 1,
            (Label::Zero, Label::One) => self.false_negative += 1,
        }
    }
}

/// Result of validating a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Misclassified examples.
    pub misses: usize,
    /// Examples evaluated.
    pub total: usize,
    /// Per-class breakdown.
    pub confusion: ConfusionMatrix,
}

impl ValidationReport {
    /// Fraction classified correctly; `None` for an empty set.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| (self.total - self.misses) as f64 / self.total as f64)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} misclassified", self.misses, self.total)?;
        if let Some(acc) = self.accuracy() {
            write!(f, " (accuracy {:.2}%)", acc * 100.0)?;
        }
        Ok(())
    }
}

/// Applies a (parameters, bias) pair to labeled examples.
///
/// Pure: inputs are only read, and the same inputs always give the same
/// count.
#[derive(Debug, Clone)]
pub struct Evaluator {
    circuit: ClassifierCircuit,
}

impl Evaluator {
    /// Create an evaluator for a circuit.
    pub fn new(circuit: ClassifierCircuit) -> Self {
        Self { circuit }
    }

    /// Create an evaluator for a trained model's circuit.
    pub fn for_model(model: &TrainedModel) -> MlResult<Self> {
        Ok(Self::new(model.circuit()?))
    }

    /// Number of examples whose predicted class differs from the label.
    pub fn count_misses(
        &self,
        examples: &[LabeledExample],
        parameters: &[f64],
        bias: f64,
    ) -> MlResult<usize> {
        Ok(self.validate(examples, parameters, bias)?.misses)
    }

    /// Full report for (parameters, bias) over `examples`.
    pub fn validate(
        &self,
        examples: &[LabeledExample],
        parameters: &[f64],
        bias: f64,
    ) -> MlResult<ValidationReport> {
        self.check_inputs(parameters, bias)?;
        let mut state = Statevector::new(self.circuit.feature_dimension())?;
        tally(examples, bias, |features| {
            self.circuit.evaluate_with(&mut state, features, parameters)
        })
    }

    /// Like [`validate`](Self::validate), but each score is estimated from
    /// `shots` measurement samples instead of the exact expectation.
    ///
    /// The sampler is seeded with `rng_seed`, so a report is reproducible.
    pub fn validate_sampled(
        &self,
        examples: &[LabeledExample],
        parameters: &[f64],
        bias: f64,
        shots: usize,
        rng_seed: u64,
    ) -> MlResult<ValidationReport> {
        self.check_inputs(parameters, bias)?;
        let mut state = Statevector::new(self.circuit.feature_dimension())?;
        let mut rng = StdRng::seed_from_u64(rng_seed);
        tally(examples, bias, |features| {
            self.circuit
                .sample_score(&mut state, features, parameters, shots, &mut rng)
        })
    }

    fn check_inputs(&self, parameters: &[f64], bias: f64) -> MlResult<()> {
        self.circuit.check_parameters(parameters)?;
        if let Some(index) = parameters.iter().position(|p| !p.is_finite()) {
            return Err(MlError::NonFinite {
                what: "parameters".into(),
                index: Some(index),
            });
        }
        if !bias.is_finite() {
            return Err(MlError::NonFinite {
                what: "bias".into(),
                index: None,
            });
        }
        Ok(())
    }

    /// Report for a trained model.
    pub fn validate_model(
        &self,
        examples: &[LabeledExample],
        model: &TrainedModel,
    ) -> MlResult<ValidationReport> {
        self.validate(examples, &model.parameters, model.bias)
    }
}

/// Classify every example with `score` and count the misses.
fn tally<F>(
    examples: &[LabeledExample],
    bias: f64,
    mut score: F,
) -> MlResult<ValidationReport>
where
    F: FnMut(&[f64]) -> MlResult<f64>,
{
    let mut confusion = ConfusionMatrix::default();
    let mut misses = 0;
    for ex in examples {
        let predicted = decide(score(&ex.features)?, bias);
        if predicted != ex.label {
            misses += 1;
        }
        confusion.record(predicted, ex.label);
    }

    debug!(misses, total = examples.len(), "validation finished");
    Ok(ValidationReport {
        misses,
        total: examples.len(),
        confusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_empty_is_none() {
        let report = ValidationReport {
            misses: 0,
            total: 0,
            confusion: ConfusionMatrix::default(),
        };
        assert_eq!(report.accuracy(), None);
        assert_eq!(report.to_string(), "0/0 misclassified");
    }

    #[test]
    fn test_non_finite_bias_is_rejected() {
        let evaluator = Evaluator::new(
            ClassifierCircuit::new(crate::ClassifierStructure::new(2, 1)).unwrap(),
        );
        let examples = [LabeledExample::new(vec![0.0, 0.0], Label::Zero)];

        let err = evaluator.count_misses(&examples, &[0.0; 4], f64::NAN).unwrap_err();
        assert!(matches!(err, MlError::NonFinite { index: None, .. }));
        assert_eq!(err.kind(), qcc_sim::ErrorKind::Configuration);

        let err = evaluator
            .validate(&examples, &[0.0, f64::INFINITY, 0.0, 0.0], 0.0)
            .unwrap_err();
        assert!(matches!(err, MlError::NonFinite { index: Some(1), .. }));
    }

    #[test]
    fn test_confusion_record() {
        let mut m = ConfusionMatrix::default();
        m.record(Label::One, Label::One);
        m.record(Label::One, Label::Zero);
        m.record(Label::Zero, Label::One);
        m.record(Label::Zero, Label::Zero);
        m.record(Label::Zero, Label::Zero);
        assert_eq!(m.true_positive, 1);
        assert_eq!(m.false_positive, 1);
        assert_eq!(m.false_negative, 1);
        assert_eq!(m.true_negative, 2);
    }
}

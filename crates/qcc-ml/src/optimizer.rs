//! Gradient-descent training over multiple restarts.
//!
//! Each seed is trained independently: it owns its own parameter copy and
//! its own [`Statevector`], so restarts can run on a rayon pool with no
//! shared mutable state. The only synchronization point is the final
//! reduction, which walks results in seed order and keeps the incumbent
//! unless a later restart beats it by more than `tie_epsilon`.
//!
//! # Update rule
//!
//!   m_i = y_i (s_i + b),   L = mean_i loss(m_i)
//!   θ ← θ − η_k ∂L/∂θ,     b ← b − η_k ∂L/∂b,     η_k = η / (1 + decay·k)
//!
//! Score derivatives use the parameter-shift rule
//! `∂s/∂θ = [s(θ + π/2) − s(θ − π/2)] / 2`, exact for Ry and Rz.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::Arc;

use qcc_sim::{ErrorKind, Statevector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::circuit::{ClassifierCircuit, decide};
use crate::dataset::LabeledExample;
use crate::diagnostics::{DiagnosticSink, TrainingEvent};
use crate::error::{MlError, MlResult};
use crate::loss::Loss;
use crate::model::TrainedModel;

/// How score derivatives are computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum GradientMethod {
    /// Two circuit evaluations at ±π/2 per parameter.
    #[default]
    ParameterShift,
    /// Central finite differences with the given step.
    FiniteDifference {
        /// Step size h.
        step: f64,
    },
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    /// Initial step size η.
    pub learning_rate: f64,
    /// Step-size decay; η_k = η / (1 + decay·k).
    pub decay: f64,
    /// Iteration budget per restart.
    pub max_iterations: usize,
    /// Stop when the training loss changes by less than this.
    pub tolerance: f64,
    /// Loss function.
    pub loss: Loss,
    /// Gradient method.
    pub gradient: GradientMethod,
    /// Examples per step; `None` uses the full training set.
    pub minibatch_size: Option<usize>,
    /// Bias at the start of every restart.
    pub initial_bias: f64,
    /// Re-fit the bias to minimise training misses after descent.
    pub tune_bias: bool,
    /// Run restarts in parallel.
    pub parallel: bool,
    /// Loss difference under which restarts count as tied.
    pub tie_epsilon: f64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            decay: 0.0,
            max_iterations: 200,
            tolerance: 1e-6,
            loss: Loss::Hinge,
            gradient: GradientMethod::ParameterShift,
            minibatch_size: None,
            initial_bias: 0.0,
            tune_bias: false,
            parallel: true,
            tie_epsilon: 1e-12,
        }
    }
}

impl TrainingOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the iteration budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the loss function.
    #[must_use]
    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Set the gradient method.
    #[must_use]
    pub fn with_gradient(mut self, gradient: GradientMethod) -> Self {
        self.gradient = gradient;
        self
    }

    /// Set the minibatch size.
    #[must_use]
    pub fn with_minibatch_size(mut self, size: Option<usize>) -> Self {
        self.minibatch_size = size;
        self
    }

    /// Enable or disable parallel restarts.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable or disable post-descent bias tuning.
    #[must_use]
    pub fn with_tune_bias(mut self, tune_bias: bool) -> Self {
        self.tune_bias = tune_bias;
        self
    }

    /// Step size for iteration `k`.
    pub fn learning_rate_at(&self, k: usize) -> f64 {
        self.learning_rate / (1.0 + self.decay * k as f64)
    }

    /// Reject out-of-range settings.
    pub fn validate(&self) -> MlResult<()> {
        let invalid = |msg: String| Err(MlError::InvalidOptions(msg));
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if !(self.decay.is_finite() && self.decay >= 0.0) {
            return invalid(format!("decay must be non-negative, got {}", self.decay));
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".into());
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return invalid(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            ));
        }
        if self.minibatch_size == Some(0) {
            return invalid("minibatch_size must be at least 1".into());
        }
        if let GradientMethod::FiniteDifference { step } = self.gradient {
            if !(step.is_finite() && step > 0.0) {
                return invalid(format!("finite-difference step must be positive, got {step}"));
            }
        }
        if !self.initial_bias.is_finite() {
            return invalid("initial_bias must be finite".into());
        }
        if !(self.tie_epsilon.is_finite() && self.tie_epsilon >= 0.0) {
            return invalid("tie_epsilon must be non-negative".into());
        }
        Ok(())
    }
}

/// Outcome of one restart; the optimizer returns the best of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Trained rotation angles.
    pub parameters: Vec<f64>,
    /// Trained bias.
    pub bias: f64,
    /// Final mean training loss.
    pub loss: f64,
    /// Misclassified training examples at the final point.
    pub training_misses: usize,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the tolerance criterion stopped descent.
    pub converged: bool,
    /// Index of the seed this restart started from.
    pub seed_index: usize,
    /// Training loss before the first step and after every step.
    pub loss_history: Vec<f64>,
}

impl TrainingResult {
    /// Package the parameters and bias with the circuit structure.
    pub fn to_model(&self, circuit: &ClassifierCircuit) -> TrainedModel {
        TrainedModel {
            structure: *circuit.structure(),
            parameters: self.parameters.clone(),
            bias: self.bias,
        }
    }
}

/// Multi-restart trainer for a [`ClassifierCircuit`].
pub struct Optimizer {
    circuit: ClassifierCircuit,
    options: TrainingOptions,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Optimizer {
    /// Create a trainer.
    pub fn new(circuit: ClassifierCircuit, options: TrainingOptions) -> Self {
        Self {
            circuit,
            options,
            sink: None,
        }
    }

    /// Attach a diagnostic sink for the runs of this trainer.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The circuit being trained.
    pub fn circuit(&self) -> &ClassifierCircuit {
        &self.circuit
    }

    /// The training options.
    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Train from every seed and return the restart with the lowest loss.
    ///
    /// Fails without training anything if the options, examples or seeds
    /// are malformed; a failure inside any restart aborts the whole call.
    pub fn train(
        &self,
        examples: &[LabeledExample],
        seeds: &[Vec<f64>],
    ) -> MlResult<TrainingResult> {
        self.options.validate()?;
        if examples.is_empty() {
            return Err(MlError::EmptyTrainingSet);
        }
        if seeds.is_empty() {
            return Err(MlError::NoSeeds);
        }
        for (index, seed) in seeds.iter().enumerate() {
            if seed.len() != self.circuit.num_parameters() {
                return Err(MlError::ParameterLengthMismatch {
                    expected: self.circuit.num_parameters(),
                    got: seed.len(),
                    seed: Some(index),
                });
            }
            if let Some(position) = seed.iter().position(|p| !p.is_finite()) {
                return Err(MlError::NonFinite {
                    what: format!("seed {index}"),
                    index: Some(position),
                });
            }
        }
        for example in examples {
            self.circuit.check_features(&example.features)?;
        }

        info!(
            restarts = seeds.len(),
            examples = examples.len(),
            parameters = self.circuit.num_parameters(),
            parallel = self.options.parallel,
            "starting training"
        );
        self.emit(TrainingEvent::TrainingStarted {
            restarts: seeds.len(),
            examples: examples.len(),
            parameters: self.circuit.num_parameters(),
        });

        let results: Vec<TrainingResult> = if self.options.parallel && seeds.len() > 1 {
            seeds
                .par_iter()
                .enumerate()
                .map(|(index, seed)| self.run_restart(index, seed, examples))
                .collect::<MlResult<_>>()?
        } else {
            seeds
                .iter()
                .enumerate()
                .map(|(index, seed)| self.run_restart(index, seed, examples))
                .collect::<MlResult<_>>()?
        };

        let best = select_best(results, self.options.tie_epsilon)
            .ok_or(MlError::NoSeeds)?;

        info!(
            restart = best.seed_index,
            loss = best.loss,
            training_misses = best.training_misses,
            "selected best restart"
        );
        self.emit(TrainingEvent::BestSelected {
            restart: best.seed_index,
            loss: best.loss,
            bias: best.bias,
        });
        Ok(best)
    }

    /// Mean training loss of (parameters, bias) over `examples`.
    pub fn loss(&self, examples: &[LabeledExample], parameters: &[f64], bias: f64) -> MlResult<f64> {
        if examples.is_empty() {
            return Err(MlError::EmptyTrainingSet);
        }
        self.circuit.check_parameters(parameters)?;
        let mut state = Statevector::new(self.circuit.feature_dimension())?;
        let scores = self.scores(&mut state, examples, parameters)?;
        Ok(self.mean_loss(examples, &scores, bias))
    }

    fn run_restart(
        &self,
        restart: usize,
        seed: &[f64],
        examples: &[LabeledExample],
    ) -> MlResult<TrainingResult> {
        let opts = &self.options;
        let mut state = Statevector::new(self.circuit.feature_dimension())?;
        let mut parameters = seed.to_vec();
        let mut bias = opts.initial_bias;

        let batch_size = opts.minibatch_size.unwrap_or(examples.len()).min(examples.len());
        let batches: Vec<&[LabeledExample]> = examples.chunks(batch_size).collect();

        let scores = self
            .scores(&mut state, examples, &parameters)
            .map_err(|e| in_iteration(e, restart, 0))?;
        let mut loss = self.mean_loss(examples, &scores, bias);
        let mut loss_history = vec![loss];
        let mut epoch_start_loss = loss;
        let mut converged = false;
        let mut iterations = 0;

        debug!(restart, initial_loss = loss, "restart started");
        self.emit(TrainingEvent::RestartStarted {
            restart,
            initial_loss: loss,
        });

        for iteration in 0..opts.max_iterations {
            let learning_rate = opts.learning_rate_at(iteration);
            let batch = batches[iteration % batches.len()];

            let (grad, grad_bias) = self
                .gradient(&mut state, batch, &parameters, bias)
                .map_err(|e| in_iteration(e, restart, iteration))?;
            for (p, g) in parameters.iter_mut().zip(&grad) {
                *p -= learning_rate * g;
            }
            bias -= learning_rate * grad_bias;

            let scores = self
                .scores(&mut state, examples, &parameters)
                .map_err(|e| in_iteration(e, restart, iteration))?;
            loss = self.mean_loss(examples, &scores, bias);
            loss_history.push(loss);
            iterations = iteration + 1;

            trace!(restart, iteration, loss, learning_rate, "descent step");
            self.emit(TrainingEvent::Iteration {
                restart,
                iteration,
                loss,
                learning_rate,
            });

            // Convergence is judged once per pass over the batches.
            if iterations % batches.len() == 0 {
                if (epoch_start_loss - loss).abs() < opts.tolerance {
                    converged = true;
                    break;
                }
                epoch_start_loss = loss;
            }
        }

        let scores = self
            .scores(&mut state, examples, &parameters)
            .map_err(|e| in_iteration(e, restart, iterations))?;
        if opts.tune_bias {
            bias = tune_bias(examples, &scores, bias);
            loss = self.mean_loss(examples, &scores, bias);
        }
        let training_misses = count_misses(examples, &scores, bias);

        debug!(
            restart,
            loss, training_misses, iterations, converged, "restart finished"
        );
        self.emit(TrainingEvent::RestartFinished {
            restart,
            loss,
            training_misses,
            iterations,
            converged,
        });

        Ok(TrainingResult {
            parameters,
            bias,
            loss,
            training_misses,
            iterations,
            converged,
            seed_index: restart,
            loss_history,
        })
    }

    fn scores(
        &self,
        state: &mut Statevector,
        examples: &[LabeledExample],
        parameters: &[f64],
    ) -> MlResult<Vec<f64>> {
        examples
            .iter()
            .map(|ex| self.circuit.evaluate_with(state, &ex.features, parameters))
            .collect()
    }

    fn mean_loss(&self, examples: &[LabeledExample], scores: &[f64], bias: f64) -> f64 {
        let total: f64 = examples
            .iter()
            .zip(scores)
            .map(|(ex, s)| self.options.loss.value(ex.label.sign() * (s + bias)))
            .sum();
        total / examples.len() as f64
    }

    /// Gradient of the mean batch loss with respect to parameters and bias.
    fn gradient(
        &self,
        state: &mut Statevector,
        batch: &[LabeledExample],
        parameters: &[f64],
        bias: f64,
    ) -> MlResult<(Vec<f64>, f64)> {
        let n = batch.len() as f64;
        let mut grad = vec![0.0; parameters.len()];
        let mut grad_bias = 0.0;
        let mut shifted = parameters.to_vec();

        for ex in batch {
            let y = ex.label.sign();
            let score = self.circuit.evaluate_with(state, &ex.features, parameters)?;
            // dL/ds for this example; zero means the example does not pull.
            let weight = self.options.loss.derivative(y * (score + bias)) * y / n;
            grad_bias += weight;
            if weight == 0.0 {
                continue;
            }
            for k in 0..parameters.len() {
                let ds = self.score_derivative(state, &ex.features, &mut shifted, k)?;
                grad[k] += weight * ds;
            }
        }
        Ok((grad, grad_bias))
    }

    /// ∂s/∂θ_k at `parameters` (passed as a scratch copy, restored on return).
    fn score_derivative(
        &self,
        state: &mut Statevector,
        features: &[f64],
        parameters: &mut [f64],
        k: usize,
    ) -> MlResult<f64> {
        let (shift, scale) = match self.options.gradient {
            GradientMethod::ParameterShift => (FRAC_PI_2, 0.5),
            GradientMethod::FiniteDifference { step } => (step, 0.5 / step),
        };
        let original = parameters[k];

        parameters[k] = original + shift;
        let plus = self.circuit.evaluate_with(state, features, parameters);
        parameters[k] = original - shift;
        let minus = self.circuit.evaluate_with(state, features, parameters);
        parameters[k] = original;

        Ok((plus? - minus?) * scale)
    }

    fn emit(&self, event: TrainingEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(&event);
        }
    }
}

/// Attach restart/iteration context to numeric failures.
fn in_iteration(error: MlError, restart: usize, iteration: usize) -> MlError {
    match error {
        MlError::Sim(source) if source.kind() == ErrorKind::NumericInstability => {
            MlError::NumericInstability {
                restart,
                iteration,
                source,
            }
        }
        other => other,
    }
}

/// Keep the first restart unless a later one is lower by more than `epsilon`.
fn select_best(results: Vec<TrainingResult>, epsilon: f64) -> Option<TrainingResult> {
    let mut results = results.into_iter();
    let mut best = results.next()?;
    for candidate in results {
        if candidate.loss < best.loss - epsilon {
            best = candidate;
        }
    }
    Some(best)
}

fn count_misses(examples: &[LabeledExample], scores: &[f64], bias: f64) -> usize {
    examples
        .iter()
        .zip(scores)
        .filter(|(ex, s)| decide(**s, bias) != ex.label)
        .count()
}

/// Bias minimising training misses among thresholds between sorted scores.
///
/// Candidates are the negated midpoints between consecutive distinct scores
/// plus one bias below and one above the whole range. Ties go to the
/// candidate closest to `current`, and `current` itself wins any tie.
fn tune_bias(examples: &[LabeledExample], scores: &[f64], current: f64) -> f64 {
    let mut sorted: Vec<f64> = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();

    let mut candidates = Vec::with_capacity(sorted.len() + 1);
    if let (Some(lo), Some(hi)) = (sorted.first(), sorted.last()) {
        candidates.push(-(lo - 1.0));
        candidates.push(-(hi + 1.0));
    }
    candidates.extend(sorted.windows(2).map(|w| -(w[0] + w[1]) / 2.0));

    let mut best = current;
    let mut best_misses = count_misses(examples, scores, current);
    for candidate in candidates {
        let misses = count_misses(examples, scores, candidate);
        let closer = (candidate - current).abs() < (best - current).abs();
        if misses < best_misses || (misses == best_misses && closer) {
            best = candidate;
            best_misses = misses;
        }
    }
    best
}

/// Reproducible random starting points, uniform in [0, 2π).
pub fn random_seeds(count: usize, len: usize, rng_seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(rng_seed);
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen_range(0.0..TAU)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Label;
    use qcc_sim::SimError;

    fn result(seed_index: usize, loss: f64) -> TrainingResult {
        TrainingResult {
            parameters: vec![],
            bias: 0.0,
            loss,
            training_misses: 0,
            iterations: 0,
            converged: false,
            seed_index,
            loss_history: vec![],
        }
    }

    #[test]
    fn test_select_best_prefers_lower_loss() {
        let best = select_best(vec![result(0, 0.5), result(1, 0.2), result(2, 0.3)], 1e-12);
        assert_eq!(best.unwrap().seed_index, 1);
    }

    #[test]
    fn test_select_best_first_seed_wins_ties() {
        let best = select_best(vec![result(0, 0.2), result(1, 0.2 - 1e-14)], 1e-12);
        assert_eq!(best.unwrap().seed_index, 0);
        assert!(select_best(vec![], 1e-12).is_none());
    }

    #[test]
    fn test_learning_rate_decay() {
        let opts = TrainingOptions {
            learning_rate: 1.0,
            decay: 1.0,
            ..TrainingOptions::default()
        };
        assert_eq!(opts.learning_rate_at(0), 1.0);
        assert_eq!(opts.learning_rate_at(1), 0.5);
        assert_eq!(opts.learning_rate_at(3), 0.25);
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        assert!(TrainingOptions::default().validate().is_ok());
        assert!(TrainingOptions::default().with_learning_rate(0.0).validate().is_err());
        assert!(TrainingOptions::default().with_max_iterations(0).validate().is_err());
        assert!(
            TrainingOptions::default()
                .with_minibatch_size(Some(0))
                .validate()
                .is_err()
        );
        assert!(
            TrainingOptions::default()
                .with_gradient(GradientMethod::FiniteDifference { step: 0.0 })
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_in_iteration_wraps_norm_drift() {
        let drift = SimError::NormDrift {
            gate: "ry",
            position: 2,
            norm_sqr: f64::NAN,
        };
        let err = in_iteration(MlError::Sim(drift), 3, 17);
        assert!(matches!(
            err,
            MlError::NumericInstability {
                restart: 3,
                iteration: 17,
                source: SimError::NormDrift { gate: "ry", .. },
            }
        ));
        assert_eq!(err.kind(), ErrorKind::NumericInstability);
    }

    #[test]
    fn test_in_iteration_passes_other_errors_through() {
        let err = in_iteration(MlError::Sim(SimError::UnsupportedWidth(0)), 1, 4);
        assert!(matches!(err, MlError::Sim(SimError::UnsupportedWidth(0))));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = in_iteration(MlError::EmptyTrainingSet, 1, 4);
        assert!(matches!(err, MlError::EmptyTrainingSet));
    }

    #[test]
    fn test_tune_bias_separates_scores() {
        let examples = vec![
            LabeledExample::new(vec![0.0], Label::Zero),
            LabeledExample::new(vec![0.0], Label::Zero),
            LabeledExample::new(vec![0.0], Label::One),
        ];
        // All scores positive: with bias 0 both class-0 examples are missed.
        let scores = [0.2, 0.4, 0.8];
        assert_eq!(count_misses(&examples, &scores, 0.0), 2);

        let bias = tune_bias(&examples, &scores, 0.0);
        assert_eq!(count_misses(&examples, &scores, bias), 0);
        assert!((bias + 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_tune_bias_keeps_current_when_optimal() {
        let examples = vec![
            LabeledExample::new(vec![0.0], Label::Zero),
            LabeledExample::new(vec![0.0], Label::One),
        ];
        let scores = [-0.5, 0.5];
        assert_eq!(tune_bias(&examples, &scores, 0.0), 0.0);
    }

    #[test]
    fn test_random_seeds_reproducible() {
        let a = random_seeds(3, 16, 42);
        let b = random_seeds(3, 16, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|s| s.len() == 16));
        assert!(a.iter().flatten().all(|x| (0.0..TAU).contains(x)));
        assert_ne!(random_seeds(1, 4, 1), random_seeds(1, 4, 2));
    }
}

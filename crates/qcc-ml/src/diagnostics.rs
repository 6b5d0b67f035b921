//! Diagnostic events emitted during a training run.
//!
//! A [`DiagnosticSink`] is injected per run through
//! [`Optimizer::with_sink`](crate::Optimizer::with_sink). Training behaves
//! identically whether or not a sink is attached.

use std::fmt;

use tracing::{debug, info};

/// Notable points in a training run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// Training begins.
    TrainingStarted {
        /// Number of restarts (seeds).
        restarts: usize,
        /// Number of training examples.
        examples: usize,
        /// Parameters per seed.
        parameters: usize,
    },
    /// A restart begins.
    RestartStarted {
        /// Seed index.
        restart: usize,
        /// Full training loss at the seed.
        initial_loss: f64,
    },
    /// One descent step finished.
    Iteration {
        /// Seed index.
        restart: usize,
        /// Zero-based iteration number.
        iteration: usize,
        /// Full training loss after the step.
        loss: f64,
        /// Step size used.
        learning_rate: f64,
    },
    /// A restart finished.
    RestartFinished {
        /// Seed index.
        restart: usize,
        /// Final training loss.
        loss: f64,
        /// Misclassified training examples.
        training_misses: usize,
        /// Iterations performed.
        iterations: usize,
        /// Whether the tolerance criterion stopped the restart.
        converged: bool,
    },
    /// The best restart was chosen.
    BestSelected {
        /// Seed index of the winner.
        restart: usize,
        /// Its training loss.
        loss: f64,
        /// Its bias.
        bias: f64,
    },
}

impl fmt::Display for TrainingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingEvent::TrainingStarted {
                restarts,
                examples,
                parameters,
            } => write!(
                f,
                "Training {parameters} parameters on {examples} examples from {restarts} starting points"
            ),
            TrainingEvent::RestartStarted {
                restart,
                initial_loss,
            } => write!(f, "Restart {restart}: initial loss {initial_loss:.6}"),
            TrainingEvent::Iteration {
                restart,
                iteration,
                loss,
                learning_rate,
            } => write!(
                f,
                "Restart {restart}, iteration {iteration}: loss {loss:.6} (lr {learning_rate:.4})"
            ),
            TrainingEvent::RestartFinished {
                restart,
                loss,
                training_misses,
                iterations,
                converged,
            } => write!(
                f,
                "Restart {restart} finished after {iterations} iterations: loss {loss:.6}, \
                 {training_misses} training misses{}",
                if *converged { " (converged)" } else { "" }
            ),
            TrainingEvent::BestSelected {
                restart,
                loss,
                bias,
            } => write!(
                f,
                "Selected restart {restart} with loss {loss:.6} and bias {bias:.6}"
            ),
        }
    }
}

/// Receiver of training diagnostics.
///
/// Restarts may run on several threads at once, so sinks must be `Sync`.
pub trait DiagnosticSink: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &TrainingEvent);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&TrainingEvent) + Send + Sync,
{
    fn on_event(&self, event: &TrainingEvent) {
        self(event);
    }
}

/// Forwards events to `tracing`: milestones at info, iterations at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn on_event(&self, event: &TrainingEvent) {
        match event {
            TrainingEvent::Iteration { .. } | TrainingEvent::RestartStarted { .. } => {
                debug!("{event}");
            }
            _ => info!("{event}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &TrainingEvent| seen.lock().unwrap().push(event.to_string());
        sink.on_event(&TrainingEvent::RestartStarted {
            restart: 2,
            initial_loss: 1.5,
        });
        assert_eq!(seen.lock().unwrap()[0], "Restart 2: initial loss 1.500000");
    }

    #[test]
    fn test_finished_message_marks_convergence() {
        let event = TrainingEvent::RestartFinished {
            restart: 0,
            loss: 0.25,
            training_misses: 1,
            iterations: 12,
            converged: true,
        };
        assert!(event.to_string().ends_with("(converged)"));
    }
}

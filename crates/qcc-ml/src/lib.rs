//! `qcc-ml` - variational quantum circuit classifier.
//!
//! A binary classifier whose model is a parameterized circuit run on the
//! [`qcc_sim`] statevector engine:
//!
//! - [`ClassifierCircuit`] encodes a feature vector as rotation angles,
//!   applies layered trainable Ry/Rz blocks with CZ entanglers and reads
//!   ⟨Z⟩ on one qubit as the score.
//! - [`Optimizer`] runs gradient descent from several seeds (optionally on
//!   a rayon pool) and keeps the restart with the lowest training loss.
//! - [`Evaluator`] counts misclassifications of a (parameters, bias) pair.
//!
//! # Example
//!
//! ```rust
//! use qcc_ml::{
//!     ClassifierCircuit, ClassifierStructure, Evaluator, Label, LabeledExample, Optimizer,
//!     TrainingOptions,
//! };
//!
//! let examples = vec![
//!     LabeledExample::new(vec![0.0, 0.0], Label::Zero),
//!     LabeledExample::new(vec![1.0, 1.0], Label::One),
//! ];
//! let circuit = ClassifierCircuit::new(ClassifierStructure::new(2, 1)).unwrap();
//! let options = TrainingOptions::default().with_learning_rate(0.5);
//!
//! let result = Optimizer::new(circuit.clone(), options)
//!     .train(&examples, &[vec![0.0; 4]])
//!     .unwrap();
//! let misses = Evaluator::new(circuit)
//!     .count_misses(&examples, &result.parameters, result.bias)
//!     .unwrap();
//! assert_eq!(misses, 0);
//! ```

pub mod circuit;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod loss;
pub mod model;
pub mod optimizer;

pub use circuit::{ClassifierCircuit, ClassifierStructure, Encoding, decide};
pub use config::{ClassifierConfig, ConfigError, LoggingConfig, QccConfig};
pub use dataset::{Dataset, Label, LabeledExample};
pub use diagnostics::{DiagnosticSink, TracingSink, TrainingEvent};
pub use error::{MlError, MlResult};
pub use evaluator::{ConfusionMatrix, Evaluator, ValidationReport};
pub use loss::Loss;
pub use model::TrainedModel;
pub use optimizer::{GradientMethod, Optimizer, TrainingOptions, TrainingResult, random_seeds};
pub use qcc_sim::ErrorKind;

//! Error types for classifier training and validation.

use qcc_sim::{ErrorKind, SimError};
use thiserror::Error;

/// Errors produced while loading data, training or validating a classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MlError {
    /// Training was requested on an empty training set.
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// No starting points were supplied.
    #[error("At least one parameter seed is required")]
    NoSeeds,

    /// A parameter vector does not match the circuit structure.
    #[error("Expected {expected} parameters, got {got}{}", format_seed_context(.seed))]
    ParameterLengthMismatch {
        /// Number of parameters the circuit consumes.
        expected: usize,
        /// Length of the supplied vector.
        got: usize,
        /// Index of the offending seed, when the vector came from a seed list.
        seed: Option<usize>,
    },

    /// A feature vector does not match the circuit's feature dimension.
    #[error("Expected {expected} features, got {got}")]
    FeatureDimensionMismatch {
        /// Feature dimension of the circuit.
        expected: usize,
        /// Length of the supplied vector.
        got: usize,
    },

    /// A label is neither 0/1 nor -1/+1.
    #[error("Invalid label {0}: expected 0, 1, -1 or +1")]
    InvalidLabel(i64),

    /// An input value is NaN or infinite.
    #[error("Non-finite value in {what}{}", format_index_context(.index))]
    NonFinite {
        /// Which input held the value.
        what: String,
        /// Position within that input, for vectors.
        index: Option<usize>,
    },

    /// The dataset document has an inconsistent shape.
    #[error("Malformed dataset: {0}")]
    DatasetShape(String),

    /// The circuit structure is unusable.
    #[error("Invalid classifier structure: {0}")]
    InvalidStructure(String),

    /// The readout qubit lies outside the register.
    #[error("Readout qubit {qubit} out of range for {num_qubits} qubits")]
    ReadoutOutOfRange {
        /// Requested readout qubit.
        qubit: usize,
        /// Register width.
        num_qubits: usize,
    },

    /// Training options are out of range.
    #[error("Invalid training options: {0}")]
    InvalidOptions(String),

    /// The state vector drifted during training.
    #[error("Numeric instability in restart {restart}, iteration {iteration}: {source}")]
    NumericInstability {
        /// Restart (seed index) that failed.
        restart: usize,
        /// Iteration within the restart.
        iteration: usize,
        /// The engine error.
        #[source]
        source: SimError,
    },

    /// Engine error outside of a training iteration.
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MlError::NumericInstability { .. } => ErrorKind::NumericInstability,
            MlError::ReadoutOutOfRange { .. } => ErrorKind::Index,
            MlError::Sim(e) => e.kind(),
            _ => ErrorKind::Configuration,
        }
    }
}

#[allow(clippy::ref_option)]
fn format_seed_context(seed: &Option<usize>) -> String {
    match seed {
        Some(index) => format!(" (seed {index})"),
        None => String::new(),
    }
}

#[allow(clippy::ref_option)]
fn format_index_context(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!(" at index {index}"),
        None => String::new(),
    }
}

/// Result type for classifier operations.
pub type MlResult<T> = Result<T, MlError>;

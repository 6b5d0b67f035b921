//! Error types for the statevector engine.

use thiserror::Error;

use crate::qubit::QubitId;

/// Coarse classification of engine and training failures.
///
/// Every variant is fatal: callers surface it and abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, shape or arity mismatch.
    Configuration,
    /// The state vector left the unit sphere.
    NumericInstability,
    /// Out-of-range qubit or feature index.
    Index,
}

/// Errors produced by the statevector engine.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SimError {
    /// A qubit index is outside the register.
    #[error("Qubit {qubit} out of range for a {num_qubits}-qubit register{}", format_gate_context(.gate))]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Register width.
        num_qubits: usize,
        /// Gate being applied, if any.
        gate: Option<&'static str>,
    },

    /// A gate was given the wrong number of qubits.
    #[error("Gate '{gate}' acts on {expected} qubits, got {got}")]
    GateArity {
        /// Gate name.
        gate: &'static str,
        /// Arity of the gate.
        expected: usize,
        /// Number of qubits supplied.
        got: usize,
    },

    /// The same qubit appears twice in one instruction.
    #[error("Duplicate qubit {qubit} in gate '{gate}'")]
    DuplicateQubit {
        /// The repeated qubit.
        qubit: QubitId,
        /// Gate name.
        gate: &'static str,
    },

    /// Register width is zero or exceeds [`MAX_QUBITS`](crate::MAX_QUBITS).
    #[error("Register width {0} is not supported (must be 1..={max})", max = crate::MAX_QUBITS)]
    UnsupportedWidth(usize),

    /// A circuit was run on an engine of a different width.
    #[error("Circuit '{circuit}' has {expected} qubits but the statevector has {got}")]
    WidthMismatch {
        /// Circuit name.
        circuit: String,
        /// Circuit width.
        expected: usize,
        /// Engine width.
        got: usize,
    },

    /// The squared norm drifted away from 1 after a gate.
    #[error("Norm drift after gate '{gate}' at position {position}: |psi|^2 = {norm_sqr}")]
    NormDrift {
        /// Gate that was applied last.
        gate: &'static str,
        /// Position of the instruction in its circuit (0 for standalone gates).
        position: usize,
        /// Observed squared norm.
        norm_sqr: f64,
    },
}

impl SimError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::QubitOutOfRange { .. } => ErrorKind::Index,
            SimError::NormDrift { .. } => ErrorKind::NumericInstability,
            SimError::GateArity { .. }
            | SimError::DuplicateQubit { .. }
            | SimError::UnsupportedWidth(_)
            | SimError::WidthMismatch { .. } => ErrorKind::Configuration,
        }
    }
}

#[allow(clippy::ref_option)]
fn format_gate_context(gate: &Option<&'static str>) -> String {
    match gate {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for engine operations.
pub type SimResult<T> = Result<T, SimError>;

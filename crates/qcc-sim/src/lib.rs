//! `qcc-sim` - statevector engine for the qcc quantum circuit classifier.
//!
//! Holds the full 2^n amplitude vector of a small register, applies gates in
//! place and reads out analytic expectation values. There is no sampling
//! noise in readout; [`Statevector::sample`] exists for diagnostics only.
//!
//! Every gate application re-checks that the state stays on the unit sphere
//! (within [`NORM_TOLERANCE`]); a drift is reported as
//! [`SimError::NormDrift`] instead of being silently renormalized.
//!
//! # Example
//!
//! ```rust
//! use qcc_sim::{Circuit, Pauli, QubitId, Statevector};
//!
//! let mut circuit = Circuit::with_size("bell", 2);
//! circuit.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
//!
//! let mut sv = Statevector::new(2).unwrap();
//! sv.run(&circuit).unwrap();
//! let z0 = sv.expectation(Pauli::Z, QubitId(0)).unwrap();
//! assert!(z0.abs() < 1e-12);
//! ```
//!
//! # Memory
//!
//! | Qubits | Memory |
//! |--------|--------|
//! | 10 | ~16 KB |
//! | 16 | ~1 MB |
//! | 20 | ~16 MB |
//! | 24 | ~256 MB |

pub mod circuit;
pub mod error;
pub mod gate;
pub mod qubit;
pub mod statevector;

pub use circuit::{Circuit, Instruction};
pub use error::{ErrorKind, SimError, SimResult};
pub use gate::{Gate, Pauli};
pub use qubit::QubitId;
pub use statevector::Statevector;

/// Largest register the engine will allocate.
pub const MAX_QUBITS: usize = 24;

/// Allowed deviation of Σ|aᵢ|² from 1 after any gate.
pub const NORM_TOLERANCE: f64 = 1e-9;

//! Flat gate sequences.
//!
//! A [`Circuit`] is an ordered list of [`Instruction`]s over a fixed-width
//! register. Every builder method validates its qubits before appending, so
//! a circuit that exists is always structurally valid for its width.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::gate::Gate;
use crate::qubit::QubitId;

/// A gate applied to specific qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The gate.
    pub gate: Gate,
    /// Qubits the gate acts on, in gate order (control first).
    pub qubits: Vec<QubitId>,
}

impl Instruction {
    /// Create a single-qubit instruction.
    pub fn single_qubit_gate(gate: Gate, qubit: QubitId) -> Self {
        Self {
            gate,
            qubits: vec![qubit],
        }
    }

    /// Create a two-qubit instruction.
    pub fn two_qubit_gate(gate: Gate, q0: QubitId, q1: QubitId) -> Self {
        Self {
            gate,
            qubits: vec![q0, q1],
        }
    }
}

/// Check arity, range and distinctness of `qubits` for `gate`.
pub(crate) fn validate_qubits(gate: &Gate, qubits: &[QubitId], num_qubits: usize) -> SimResult<()> {
    let expected = gate.num_qubits();
    if qubits.len() != expected {
        return Err(SimError::GateArity {
            gate: gate.name(),
            expected,
            got: qubits.len(),
        });
    }
    for (i, q) in qubits.iter().enumerate() {
        if q.index() >= num_qubits {
            return Err(SimError::QubitOutOfRange {
                qubit: *q,
                num_qubits,
                gate: Some(gate.name()),
            });
        }
        if qubits[..i].contains(q) {
            return Err(SimError::DuplicateQubit {
                qubit: *q,
                gate: gate.name(),
            });
        }
    }
    Ok(())
}

/// An ordered gate sequence over `num_qubits` qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    num_qubits: usize,
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create an empty circuit over `num_qubits` qubits.
    pub fn with_size(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            instructions: Vec::new(),
        }
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register width.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Instructions in application order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn num_ops(&self) -> usize {
        self.instructions.len()
    }

    /// Number of parameterized instructions.
    pub fn num_parameterized_ops(&self) -> usize {
        self.instructions
            .iter()
            .filter(|inst| inst.gate.is_parameterized())
            .count()
    }

    /// Append an instruction after validating it against the register.
    pub fn apply(&mut self, instruction: Instruction) -> SimResult<&mut Self> {
        validate_qubits(&instruction.gate, &instruction.qubits, self.num_qubits)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::H, qubit))
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::X, qubit))
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::Y, qubit))
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::Z, qubit))
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::Rx(theta), qubit))
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::Ry(theta), qubit))
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(Gate::Rz(theta), qubit))
    }

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate(Gate::CX, control, target))
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate(Gate::CZ, control, target))
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> SimResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate(Gate::Swap, q1, q2))
    }
}

//! Statevector simulation engine.

use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::PI;
use tracing::trace;

use crate::circuit::{Circuit, Instruction, validate_qubits};
use crate::error::{SimError, SimResult};
use crate::gate::{Gate, Pauli};
use crate::qubit::QubitId;
use crate::{MAX_QUBITS, NORM_TOLERANCE};

/// A statevector representing a quantum state.
///
/// One instance is owned by exactly one evaluation context; it is reset
/// between circuit evaluations and never shared.
#[derive(Debug, Clone)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> SimResult<Self> {
        check_width(num_qubits)?;
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Ok(Self {
            amplitudes,
            num_qubits,
        })
    }

    /// Wrap raw amplitudes. The length must be a power of two; the state is
    /// not renormalized, so a drifted input fails on the next gate.
    pub fn from_amplitudes(amplitudes: Vec<Complex64>) -> SimResult<Self> {
        let len = amplitudes.len();
        if !len.is_power_of_two() {
            return Err(SimError::UnsupportedWidth(len));
        }
        let num_qubits = len.trailing_zeros() as usize;
        check_width(num_qubits)?;
        Ok(Self {
            amplitudes,
            num_qubits,
        })
    }

    /// Return to |0...0⟩ over `num_qubits` qubits, reusing the allocation
    /// when the width is unchanged.
    pub fn reset(&mut self, num_qubits: usize) -> SimResult<()> {
        check_width(num_qubits)?;
        if num_qubits == self.num_qubits {
            self.amplitudes.fill(Complex64::new(0.0, 0.0));
        } else {
            self.amplitudes = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
            self.num_qubits = num_qubits;
        }
        self.amplitudes[0] = Complex64::new(1.0, 0.0);
        Ok(())
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The raw amplitudes, indexed by basis state.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Squared norm of the state, Σ|aᵢ|².
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(Complex64::norm_sqr).sum()
    }

    /// Reset to the circuit's width and apply every instruction.
    pub fn run(&mut self, circuit: &Circuit) -> SimResult<()> {
        self.reset(circuit.num_qubits())?;
        self.apply_circuit(circuit)
    }

    /// Apply every instruction of `circuit` to the current state.
    pub fn apply_circuit(&mut self, circuit: &Circuit) -> SimResult<()> {
        if circuit.num_qubits() != self.num_qubits {
            return Err(SimError::WidthMismatch {
                circuit: circuit.name().to_string(),
                expected: circuit.num_qubits(),
                got: self.num_qubits,
            });
        }
        trace!(
            circuit = circuit.name(),
            num_ops = circuit.num_ops(),
            "applying circuit"
        );
        for (position, instruction) in circuit.instructions().iter().enumerate() {
            self.apply_at(instruction, position)?;
        }
        Ok(())
    }

    /// Apply a single instruction.
    pub fn apply(&mut self, instruction: &Instruction) -> SimResult<()> {
        self.apply_at(instruction, 0)
    }

    /// Apply a gate to specific qubits, then verify the state is still normalized.
    pub fn apply_gate(&mut self, gate: &Gate, qubits: &[QubitId]) -> SimResult<()> {
        self.apply_gate_at(gate, qubits, 0)
    }

    fn apply_at(&mut self, instruction: &Instruction, position: usize) -> SimResult<()> {
        self.apply_gate_at(&instruction.gate, &instruction.qubits, position)
    }

    fn apply_gate_at(&mut self, gate: &Gate, qubits: &[QubitId], position: usize) -> SimResult<()> {
        validate_qubits(gate, qubits, self.num_qubits)?;
        let q: Vec<usize> = qubits.iter().map(|q| q.index()).collect();

        match *gate {
            Gate::I => {}
            Gate::X => self.apply_x(q[0]),
            Gate::Y => self.apply_y(q[0]),
            Gate::Z => self.apply_z(q[0]),
            Gate::H => self.apply_h(q[0]),
            Gate::S => self.apply_phase(q[0], PI / 2.0),
            Gate::T => self.apply_phase(q[0], PI / 4.0),
            Gate::Rx(theta) => self.apply_rx(q[0], theta),
            Gate::Ry(theta) => self.apply_ry(q[0], theta),
            Gate::Rz(theta) => self.apply_rz(q[0], theta),
            Gate::CX => self.apply_cx(q[0], q[1]),
            Gate::CZ => self.apply_cz(q[0], q[1]),
            Gate::Swap => self.apply_swap(q[0], q[1]),
        }

        let norm_sqr = self.norm_sqr();
        let drift = (norm_sqr - 1.0).abs();
        if drift.is_nan() || drift > NORM_TOLERANCE {
            return Err(SimError::NormDrift {
                gate: gate.name(),
                position,
                norm_sqr,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Readout
    // =========================================================================

    /// Analytic expectation value of a Pauli observable on one qubit, in [-1, 1].
    pub fn expectation(&self, observable: Pauli, qubit: QubitId) -> SimResult<f64> {
        let mask = self.mask_for(qubit)?;
        let mut value = 0.0;
        match observable {
            Pauli::Z => {
                for (i, amp) in self.amplitudes.iter().enumerate() {
                    if i & mask == 0 {
                        value += amp.norm_sqr();
                    } else {
                        value -= amp.norm_sqr();
                    }
                }
            }
            Pauli::X | Pauli::Y => {
                for i in 0..self.amplitudes.len() {
                    if i & mask == 0 {
                        let z = self.amplitudes[i].conj() * self.amplitudes[i | mask];
                        value += 2.0 * if observable == Pauli::X { z.re } else { z.im };
                    }
                }
            }
        }
        Ok(value.clamp(-1.0, 1.0))
    }

    /// Probability of measuring `qubit` in |1⟩.
    pub fn probability_one(&self, qubit: QubitId) -> SimResult<f64> {
        let mask = self.mask_for(qubit)?;
        let p = self
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, amp)| amp.norm_sqr())
            .sum::<f64>();
        Ok(p.clamp(0.0, 1.0))
    }

    /// Sample a measurement outcome of the full register.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let r: f64 = rng.r#gen();

        let mut cumulative = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            cumulative += amp.norm_sqr();
            if r < cumulative {
                return i;
            }
        }

        // Rounding can leave the cumulative sum a hair below 1.
        self.amplitudes.len() - 1
    }

    /// Convert measurement outcome to bitstring (qubit 0 first).
    pub fn outcome_to_bitstring(&self, outcome: usize) -> String {
        format!("{:0width$b}", outcome, width = self.num_qubits)
            .chars()
            .rev()
            .collect()
    }

    fn mask_for(&self, qubit: QubitId) -> SimResult<usize> {
        if qubit.index() >= self.num_qubits {
            return Err(SimError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
                gate: None,
            });
        }
        Ok(1 << qubit.index())
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                self.amplitudes.swap(i, i | mask);
            }
        }
    }

    fn apply_y(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_z(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask != 0 {
                *amp = -*amp;
            }
        }
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase = Complex64::from_polar(1.0, theta);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask != 0 {
                *amp *= phase;
            }
        }
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let neg_i_s = Complex64::new(0.0, -(theta / 2.0).sin());
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = neg_i_s * a + c * b;
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask == 0 {
                *amp *= phase_0;
            } else {
                *amp *= phase_1;
            }
        }
    }

    // =========================================================================
    // Two-qubit gate implementations
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..self.amplitudes.len() {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        let both = (1 << control) | (1 << target);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & both == both {
                *amp = -*amp;
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..self.amplitudes.len() {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                let j = (i & !mask1) | mask2;
                self.amplitudes.swap(i, j);
            }
        }
    }
}

fn check_width(num_qubits: usize) -> SimResult<()> {
    if num_qubits == 0 || num_qubits > MAX_QUBITS {
        return Err(SimError::UnsupportedWidth(num_qubits));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2).unwrap();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_hadamard() {
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_h(0);

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2).unwrap();
        sv.apply_h(0);
        sv.apply_cx(0, 1);

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_x_gate() {
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_x(0);

        assert!(approx_eq(sv.amplitudes[0], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_ry_pi_flips() {
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_ry(0, PI);
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_reset_reuses_and_resizes() {
        let mut sv = Statevector::new(2).unwrap();
        sv.apply_h(1);
        sv.reset(2).unwrap();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert_eq!(sv.amplitudes.len(), 4);

        sv.reset(3).unwrap();
        assert_eq!(sv.num_qubits(), 3);
        assert_eq!(sv.amplitudes.len(), 8);
    }

    #[test]
    fn test_unsupported_width() {
        assert!(matches!(
            Statevector::new(0),
            Err(SimError::UnsupportedWidth(0))
        ));
        assert!(Statevector::new(MAX_QUBITS + 1).is_err());
    }

    #[test]
    fn test_norm_drift_detected() {
        let amps = vec![Complex64::new(1.0, 0.0), Complex64::new(0.5, 0.0)];
        let mut sv = Statevector::from_amplitudes(amps).unwrap();
        let err = sv.apply_gate(&Gate::H, &[QubitId(0)]).unwrap_err();
        assert!(matches!(err, SimError::NormDrift { gate: "h", .. }));
    }

    #[test]
    fn test_sample_deterministic() {
        // |1⟩ state should always sample to 1
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_x(0);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sv.sample(&mut rng), 1);
        }
    }

    #[test]
    fn test_bitstring_little_endian() {
        let sv = Statevector::new(3).unwrap();
        assert_eq!(sv.outcome_to_bitstring(0b001), "100");
        assert_eq!(sv.outcome_to_bitstring(0b110), "011");
    }
}

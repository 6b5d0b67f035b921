//! Classifier circuit: angle encoding plus layered Ry/Rz variational blocks.
//!
//! Architecture per layer:
//! 1. Data encoding: `Ry(scale * x[i] + offset)` on qubit `i`
//!    (first layer always; later layers only when re-uploading)
//! 2. Variational: `Ry(theta)` on each qubit, then `Rz(phi)` on each qubit
//! 3. Entangling: CZ ring (a single CZ for two qubits, none for one)
//!
//! The score is the analytic ⟨Z⟩ of the readout qubit, in [-1, 1]. An
//! example is classified as 1 iff `score + bias > 0`; a sum of exactly zero
//! is class 0.
//!
//! Re-uploading is off by default. With it on and scale π/2, a feature of 1
//! encodes every qubit into |+⟩ twice around a CZ ring, and the all-zero
//! parameter vector is a stationary point of the score for any circuit with
//! two or more layers.

use std::f64::consts::FRAC_PI_2;

use qcc_sim::{Circuit, MAX_QUBITS, Pauli, QubitId, Statevector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dataset::Label;
use crate::error::{MlError, MlResult};

/// Linear feature-to-angle map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Encoding {
    /// Multiplier applied to each feature.
    pub scale: f64,
    /// Constant added after scaling.
    pub offset: f64,
    /// Repeat the encoding block before every variational layer.
    pub reupload: bool,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            scale: FRAC_PI_2,
            offset: 0.0,
            reupload: false,
        }
    }
}

impl Encoding {
    /// Rotation angle for one feature value.
    #[inline]
    pub fn angle(&self, feature: f64) -> f64 {
        self.scale * feature + self.offset
    }
}

/// Fixed shape of the classifier circuit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierStructure {
    /// Register width; also the feature dimension.
    pub num_qubits: usize,
    /// Number of variational layers.
    pub layers: usize,
    /// Feature encoding.
    #[serde(default)]
    pub encoding: Encoding,
    /// Qubit whose ⟨Z⟩ is the score.
    #[serde(default)]
    pub readout_qubit: usize,
}

impl ClassifierStructure {
    /// A structure with default encoding and readout on qubit 0.
    pub fn new(num_qubits: usize, layers: usize) -> Self {
        Self {
            num_qubits,
            layers,
            encoding: Encoding::default(),
            readout_qubit: 0,
        }
    }

    /// Infer the layer count from a parameter vector length.
    pub fn for_seed_length(num_qubits: usize, seed_len: usize) -> MlResult<Self> {
        let per_layer = 2 * num_qubits;
        if per_layer == 0 || seed_len == 0 || seed_len % per_layer != 0 {
            return Err(MlError::InvalidStructure(format!(
                "{seed_len} parameters cannot be split into layers of {per_layer} \
                 (2 rotations x {num_qubits} qubits)"
            )));
        }
        Ok(Self::new(num_qubits, seed_len / per_layer))
    }

    /// Override the encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Override the readout qubit.
    #[must_use]
    pub fn with_readout_qubit(mut self, qubit: usize) -> Self {
        self.readout_qubit = qubit;
        self
    }

    /// Parameters consumed per variational layer.
    pub fn parameters_per_layer(&self) -> usize {
        2 * self.num_qubits
    }

    /// Total number of trainable rotation angles.
    pub fn num_parameters(&self) -> usize {
        self.parameters_per_layer() * self.layers
    }

    /// Length of the feature vectors the circuit accepts.
    pub fn feature_dimension(&self) -> usize {
        self.num_qubits
    }

    /// Check the structure is buildable.
    pub fn validate(&self) -> MlResult<()> {
        if self.num_qubits == 0 || self.num_qubits > MAX_QUBITS {
            return Err(MlError::InvalidStructure(format!(
                "num_qubits must be in 1..={MAX_QUBITS}, got {}",
                self.num_qubits
            )));
        }
        if self.layers == 0 {
            return Err(MlError::InvalidStructure(
                "at least one layer is required".into(),
            ));
        }
        if self.readout_qubit >= self.num_qubits {
            return Err(MlError::ReadoutOutOfRange {
                qubit: self.readout_qubit,
                num_qubits: self.num_qubits,
            });
        }
        if !self.encoding.scale.is_finite() || !self.encoding.offset.is_finite() {
            return Err(MlError::InvalidStructure(
                "encoding scale and offset must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Maps (features, parameters) to a gate sequence and a score.
///
/// Stateless: every call builds a fresh circuit and runs it on a state that
/// is reset first, so identical inputs give bit-identical scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierCircuit {
    structure: ClassifierStructure,
}

impl ClassifierCircuit {
    /// Create a classifier circuit for a validated structure.
    pub fn new(structure: ClassifierStructure) -> MlResult<Self> {
        structure.validate()?;
        Ok(Self { structure })
    }

    /// The structure this circuit was built from.
    pub fn structure(&self) -> &ClassifierStructure {
        &self.structure
    }

    /// Total number of trainable parameters.
    pub fn num_parameters(&self) -> usize {
        self.structure.num_parameters()
    }

    /// Feature dimension.
    pub fn feature_dimension(&self) -> usize {
        self.structure.feature_dimension()
    }

    /// Fail unless `parameters` has exactly the expected length.
    pub fn check_parameters(&self, parameters: &[f64]) -> MlResult<()> {
        if parameters.len() != self.num_parameters() {
            return Err(MlError::ParameterLengthMismatch {
                expected: self.num_parameters(),
                got: parameters.len(),
                seed: None,
            });
        }
        Ok(())
    }

    /// Fail unless `features` has exactly the expected length and every
    /// value is finite.
    pub fn check_features(&self, features: &[f64]) -> MlResult<()> {
        if features.len() != self.feature_dimension() {
            return Err(MlError::FeatureDimensionMismatch {
                expected: self.feature_dimension(),
                got: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|x| !x.is_finite()) {
            return Err(MlError::NonFinite {
                what: "features".into(),
                index: Some(index),
            });
        }
        Ok(())
    }

    /// Build the gate sequence for one example.
    pub fn build(&self, features: &[f64], parameters: &[f64]) -> MlResult<Circuit> {
        self.check_features(features)?;
        self.check_parameters(parameters)?;

        let n = self.structure.num_qubits;
        let encoding = self.structure.encoding;
        let mut circuit = Circuit::with_size("qcc_classifier", n);

        for (layer, weights) in parameters
            .chunks_exact(self.structure.parameters_per_layer())
            .enumerate()
        {
            if layer == 0 || encoding.reupload {
                for (q, &x) in features.iter().enumerate() {
                    circuit.ry(encoding.angle(x), QubitId::from(q))?;
                }
            }

            let (ry, rz) = weights.split_at(n);
            for (q, &theta) in ry.iter().enumerate() {
                circuit.ry(theta, QubitId::from(q))?;
            }
            for (q, &phi) in rz.iter().enumerate() {
                circuit.rz(phi, QubitId::from(q))?;
            }

            for q in 0..n.saturating_sub(1) {
                circuit.cz(QubitId::from(q), QubitId::from(q + 1))?;
            }
            if n > 2 {
                circuit.cz(QubitId::from(n - 1), QubitId(0))?;
            }
        }

        Ok(circuit)
    }

    /// Raw score of one example: ⟨Z⟩ on the readout qubit.
    pub fn evaluate(&self, features: &[f64], parameters: &[f64]) -> MlResult<f64> {
        let mut state = Statevector::new(self.structure.num_qubits)?;
        self.evaluate_with(&mut state, features, parameters)
    }

    /// Like [`evaluate`](Self::evaluate), reusing a caller-owned state buffer.
    pub fn evaluate_with(
        &self,
        state: &mut Statevector,
        features: &[f64],
        parameters: &[f64],
    ) -> MlResult<f64> {
        let circuit = self.build(features, parameters)?;
        state.run(&circuit)?;
        let score = state.expectation(Pauli::Z, QubitId::from(self.structure.readout_qubit))?;
        Ok(score)
    }

    /// Shot-based estimate of the score: the mean of ±1 readout outcomes
    /// over `shots` samples of the final state.
    pub fn sample_score<R: Rng + ?Sized>(
        &self,
        state: &mut Statevector,
        features: &[f64],
        parameters: &[f64],
        shots: usize,
        rng: &mut R,
    ) -> MlResult<f64> {
        if shots == 0 {
            return Err(MlError::InvalidOptions("shots must be at least 1".into()));
        }
        let circuit = self.build(features, parameters)?;
        state.run(&circuit)?;

        let mask = 1 << self.structure.readout_qubit;
        let mut total = 0i64;
        for shot in 0..shots {
            let outcome = state.sample(rng);
            if shot == 0 {
                trace!(bitstring = %state.outcome_to_bitstring(outcome), "first sampled outcome");
            }
            total += if (outcome & mask) == 0 { 1 } else { -1 };
        }
        Ok(total as f64 / shots as f64)
    }

    /// Predicted class of one example.
    pub fn classify(&self, features: &[f64], parameters: &[f64], bias: f64) -> MlResult<Label> {
        Ok(decide(self.evaluate(features, parameters)?, bias))
    }
}

/// Decision rule: class 1 iff `score + bias > 0`, so a tie is class 0.
#[inline]
pub fn decide(score: f64, bias: f64) -> Label {
    if score + bias > 0.0 {
        Label::One
    } else {
        Label::Zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count() {
        assert_eq!(ClassifierStructure::new(4, 2).num_parameters(), 16);
        assert_eq!(ClassifierStructure::new(2, 1).num_parameters(), 4);
        assert_eq!(ClassifierStructure::new(8, 3).num_parameters(), 48);
    }

    #[test]
    fn test_for_seed_length() {
        let s = ClassifierStructure::for_seed_length(4, 16).unwrap();
        assert_eq!(s.layers, 2);
        assert!(ClassifierStructure::for_seed_length(3, 16).is_err());
        assert!(ClassifierStructure::for_seed_length(4, 0).is_err());
    }

    #[test]
    fn test_gate_count() {
        let circuit = ClassifierCircuit::new(ClassifierStructure::new(4, 2)).unwrap();
        let built = circuit.build(&[0.1; 4], &[0.0; 16]).unwrap();
        // 4 encoding + 2 * (8 variational + 4 CZ ring).
        assert_eq!(built.num_ops(), 4 + 2 * (8 + 4));
    }

    #[test]
    fn test_reupload_repeats_encoding() {
        let structure = ClassifierStructure::new(4, 2).with_encoding(Encoding {
            reupload: true,
            ..Encoding::default()
        });
        let circuit = ClassifierCircuit::new(structure).unwrap();
        let built = circuit.build(&[0.1; 4], &[0.0; 16]).unwrap();
        // Per layer: 4 encoding + 8 variational + 4 CZ (ring).
        assert_eq!(built.num_ops(), 2 * (4 + 8 + 4));
    }

    #[test]
    fn test_non_finite_feature_rejected() {
        let circuit = ClassifierCircuit::new(ClassifierStructure::new(2, 1)).unwrap();
        let err = circuit.evaluate(&[0.0, f64::NAN], &[0.0; 4]).unwrap_err();
        assert!(matches!(err, MlError::NonFinite { index: Some(1), .. }));
        assert_eq!(err.kind(), qcc_sim::ErrorKind::Configuration);
    }

    #[test]
    fn test_sample_score_on_basis_states() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let circuit = ClassifierCircuit::new(ClassifierStructure::new(1, 1)).unwrap();
        let mut state = Statevector::new(1).unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        // Ry(pi/2 * 0) leaves |0>; Ry(pi/2 * 2) = Ry(pi) flips it to |1>.
        let up = circuit
            .sample_score(&mut state, &[0.0], &[0.0, 0.0], 64, &mut rng)
            .unwrap();
        let down = circuit
            .sample_score(&mut state, &[2.0], &[0.0, 0.0], 64, &mut rng)
            .unwrap();
        assert_eq!(up, 1.0);
        assert_eq!(down, -1.0);
        assert!(
            circuit
                .sample_score(&mut state, &[0.0], &[0.0, 0.0], 0, &mut rng)
                .is_err()
        );
    }

    #[test]
    fn test_single_encoding_without_reupload() {
        let structure = ClassifierStructure::new(2, 3).with_encoding(Encoding {
            reupload: false,
            ..Encoding::default()
        });
        let circuit = ClassifierCircuit::new(structure).unwrap();
        let built = circuit.build(&[0.1, 0.2], &[0.0; 12]).unwrap();
        // 2 encoding + 3 * (4 variational + 1 CZ).
        assert_eq!(built.num_ops(), 2 + 3 * 5);
    }

    #[test]
    fn test_decide_tie_breaks_to_zero() {
        assert_eq!(decide(0.0, 0.0), Label::Zero);
        assert_eq!(decide(0.25, -0.25), Label::Zero);
        assert_eq!(decide(1e-12, 0.0), Label::One);
        assert_eq!(decide(-1e-12, 0.0), Label::Zero);
    }

    #[test]
    fn test_readout_out_of_range() {
        let structure = ClassifierStructure::new(2, 1).with_readout_qubit(2);
        assert!(matches!(
            ClassifierCircuit::new(structure),
            Err(MlError::ReadoutOutOfRange { .. })
        ));
    }
}

//! Serialisable trained classifier.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::circuit::{ClassifierCircuit, ClassifierStructure};
use crate::dataset::Label;
use crate::error::{MlError, MlResult};

/// Circuit structure plus the trained (parameters, bias) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Circuit shape the parameters belong to.
    pub structure: ClassifierStructure,
    /// Rotation angles.
    pub parameters: Vec<f64>,
    /// Decision bias.
    pub bias: f64,
}

impl TrainedModel {
    /// Build the classifier circuit and check the parameter length against it.
    pub fn circuit(&self) -> MlResult<ClassifierCircuit> {
        let circuit = ClassifierCircuit::new(self.structure)?;
        circuit.check_parameters(&self.parameters)?;
        Ok(circuit)
    }

    /// Predicted class of one feature vector.
    pub fn classify(&self, features: &[f64]) -> MlResult<Label> {
        self.circuit()?
            .classify(features, &self.parameters, self.bias)
    }

    /// Parse a model from JSON and validate it.
    pub fn from_json_str(json: &str) -> MlResult<Self> {
        let model: TrainedModel = serde_json::from_str(json)?;
        if !model.bias.is_finite() || model.parameters.iter().any(|p| !p.is_finite()) {
            return Err(MlError::InvalidStructure(
                "model contains non-finite parameters".into(),
            ));
        }
        model.circuit()?;
        Ok(model)
    }

    /// Load a model from disk.
    pub fn from_path(path: impl AsRef<Path>) -> MlResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Render as pretty JSON.
    pub fn to_json_string(&self) -> MlResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the model to disk as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> MlResult<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_parameter_count() {
        let json = r#"{"structure": {"num_qubits": 2, "layers": 1}, "parameters": [0.0, 0.0], "bias": 0.0}"#;
        assert!(matches!(
            TrainedModel::from_json_str(json),
            Err(MlError::ParameterLengthMismatch {
                expected: 4,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_structure_defaults_fill_in() {
        let json = r#"{"structure": {"num_qubits": 1, "layers": 1}, "parameters": [0.5, 0.0], "bias": -0.1}"#;
        let model = TrainedModel::from_json_str(json).unwrap();
        assert!(!model.structure.encoding.reupload);
        assert_eq!(model.structure.readout_qubit, 0);
    }
}

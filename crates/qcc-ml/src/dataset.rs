//! Labeled datasets and their JSON wire format.
//!
//! The document shape is
//!
//! ```json
//! {
//!   "trainingData":   { "features": [[0.1, 0.2], ...], "labels": [0, ...] },
//!   "validationData": { "features": [[0.3, 0.4], ...], "labels": [1, ...] }
//! }
//! ```
//!
//! Labels may use the 0/1 or the -1/+1 convention; both map onto [`Label`].

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, MlResult};

/// Binary class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "i64")]
pub enum Label {
    /// Class 0 (also written -1).
    Zero,
    /// Class 1.
    One,
}

impl Label {
    /// The class index, 0 or 1.
    pub fn class(self) -> u8 {
        match self {
            Label::Zero => 0,
            Label::One => 1,
        }
    }

    /// Bipolar encoding used by the loss: -1 for class 0, +1 for class 1.
    pub fn sign(self) -> f64 {
        match self {
            Label::Zero => -1.0,
            Label::One => 1.0,
        }
    }
}

impl TryFrom<i64> for Label {
    type Error = MlError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 | -1 => Ok(Label::Zero),
            1 => Ok(Label::One),
            other => Err(MlError::InvalidLabel(other)),
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.class()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class())
    }
}

/// A feature vector with its true label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    /// Feature values.
    pub features: Vec<f64>,
    /// True class.
    pub label: Label,
}

impl LabeledExample {
    /// Create a labeled example.
    pub fn new(features: Vec<f64>, label: Label) -> Self {
        Self { features, label }
    }
}

/// Training and validation splits, loaded once and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    training: Vec<LabeledExample>,
    validation: Vec<LabeledExample>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataset {
    training_data: RawLabeledData,
    validation_data: RawLabeledData,
}

#[derive(Deserialize)]
struct RawLabeledData {
    features: Vec<Vec<f64>>,
    labels: Vec<i64>,
}

impl Dataset {
    /// Build a dataset from already-labeled splits, validating their shape.
    pub fn new(training: Vec<LabeledExample>, validation: Vec<LabeledExample>) -> MlResult<Self> {
        let dataset = Self {
            training,
            validation,
        };
        dataset.check_dimensions()?;
        Ok(dataset)
    }

    /// Parse a dataset document.
    pub fn from_json_str(json: &str) -> MlResult<Self> {
        let raw: RawDataset = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse a dataset document from a reader.
    pub fn from_reader<R: Read>(reader: R) -> MlResult<Self> {
        let raw: RawDataset = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    /// Load a dataset document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> MlResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let dataset = Self::from_reader(BufReader::new(file))?;
        debug!(
            path = %path.display(),
            training = dataset.training.len(),
            validation = dataset.validation.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    fn from_raw(raw: RawDataset) -> MlResult<Self> {
        let training = zip_split("trainingData", raw.training_data)?;
        let validation = zip_split("validationData", raw.validation_data)?;
        Self::new(training, validation)
    }

    /// Training examples.
    pub fn training(&self) -> &[LabeledExample] {
        &self.training
    }

    /// Validation examples.
    pub fn validation(&self) -> &[LabeledExample] {
        &self.validation
    }

    /// Common feature dimension, or `None` when both splits are empty.
    pub fn feature_dimension(&self) -> Option<usize> {
        self.training
            .iter()
            .chain(&self.validation)
            .map(|ex| ex.features.len())
            .next()
    }

    fn check_dimensions(&self) -> MlResult<()> {
        let Some(dim) = self.feature_dimension() else {
            return Ok(());
        };
        if dim == 0 {
            return Err(MlError::DatasetShape(
                "feature vectors must not be empty".into(),
            ));
        }
        for (split, examples) in [("trainingData", &self.training), ("validationData", &self.validation)] {
            for (i, ex) in examples.iter().enumerate() {
                if ex.features.len() != dim {
                    return Err(MlError::DatasetShape(format!(
                        "{split}.features[{i}] has {} values, expected {dim}",
                        ex.features.len()
                    )));
                }
                if let Some(j) = ex.features.iter().position(|x| !x.is_finite()) {
                    return Err(MlError::DatasetShape(format!(
                        "{split}.features[{i}][{j}] is not a finite number"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn zip_split(split: &str, raw: RawLabeledData) -> MlResult<Vec<LabeledExample>> {
    if raw.features.len() != raw.labels.len() {
        return Err(MlError::DatasetShape(format!(
            "{split} has {} feature vectors but {} labels",
            raw.features.len(),
            raw.labels.len()
        )));
    }
    raw.features
        .into_iter()
        .zip(raw.labels)
        .map(|(features, label)| Ok(LabeledExample::new(features, Label::try_from(label)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_conventions() {
        assert_eq!(Label::try_from(0).unwrap(), Label::Zero);
        assert_eq!(Label::try_from(-1).unwrap(), Label::Zero);
        assert_eq!(Label::try_from(1).unwrap(), Label::One);
        assert!(matches!(Label::try_from(2), Err(MlError::InvalidLabel(2))));
    }

    #[test]
    fn test_label_sign() {
        assert_eq!(Label::Zero.sign(), -1.0);
        assert_eq!(Label::One.sign(), 1.0);
    }

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{
            "trainingData": {"features": [[0.0, 0.5], [1.0, 0.25]], "labels": [0, 1]},
            "validationData": {"features": [[0.5, 0.5]], "labels": [-1]}
        }"#;
        let ds = Dataset::from_json_str(json).unwrap();
        assert_eq!(ds.training().len(), 2);
        assert_eq!(ds.validation()[0].label, Label::Zero);
        assert_eq!(ds.feature_dimension(), Some(2));
    }

    #[test]
    fn test_label_count_mismatch() {
        let json = r#"{
            "trainingData": {"features": [[0.0]], "labels": [0, 1]},
            "validationData": {"features": [], "labels": []}
        }"#;
        assert!(matches!(
            Dataset::from_json_str(json),
            Err(MlError::DatasetShape(_))
        ));
    }

    #[test]
    fn test_ragged_features() {
        let json = r#"{
            "trainingData": {"features": [[0.0, 1.0]], "labels": [0]},
            "validationData": {"features": [[0.0]], "labels": [1]}
        }"#;
        let err = Dataset::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("validationData.features[0]"));
    }
}

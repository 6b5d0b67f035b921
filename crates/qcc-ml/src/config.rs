//! Run configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QCC_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values
//!
//! ```yaml
//! classifier:
//!   num_qubits: 4        # default: feature dimension of the dataset
//!   layers: 2            # default: inferred from the seed length
//!   encoding: { scale: 1.5707963, offset: 0.0, reupload: false }
//!   readout_qubit: 0
//! training:
//!   learning_rate: 0.1
//!   max_iterations: 200
//!   tolerance: 1.0e-6
//!   loss: hinge
//!   gradient: { method: parameter_shift }
//!   parallel: true
//! logging:
//!   level: info
//!   timestamps: true
//!   report_interval: 10
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::{ClassifierStructure, Encoding};
use crate::error::MlResult;
use crate::loss::Loss;
use crate::optimizer::TrainingOptions;

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QccConfig {
    /// Circuit shape.
    pub classifier: ClassifierConfig,
    /// Optimizer settings.
    pub training: TrainingOptions,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Circuit shape; unset sizes are inferred from the data and seeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Register width. Defaults to the dataset's feature dimension.
    pub num_qubits: Option<usize>,
    /// Variational layers. Defaults to seed length / (2 * num_qubits).
    pub layers: Option<usize>,
    /// Feature encoding.
    pub encoding: Encoding,
    /// Qubit whose ⟨Z⟩ is the score.
    pub readout_qubit: usize,
}

impl ClassifierConfig {
    /// Resolve into a concrete structure.
    ///
    /// `feature_dimension` fills in `num_qubits`; `seed_len` fills in `layers`.
    pub fn resolve(&self, feature_dimension: usize, seed_len: usize) -> MlResult<ClassifierStructure> {
        let num_qubits = self.num_qubits.unwrap_or(feature_dimension);
        let structure = match self.layers {
            Some(layers) => ClassifierStructure::new(num_qubits, layers),
            None => ClassifierStructure::for_seed_length(num_qubits, seed_len)?,
        };
        let structure = structure
            .with_encoding(self.encoding)
            .with_readout_qubit(self.readout_qubit);
        structure.validate()?;
        Ok(structure)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level: error, warn, info, debug, trace.
    pub level: String,
    /// Print timestamped training diagnostics to the console.
    pub timestamps: bool,
    /// Print every n-th iteration event (0 disables iteration lines).
    pub report_interval: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            timestamps: true,
            report_interval: 10,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(String),
    /// YAML parse error.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl QccConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: QccConfig =
            serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml_str(&contents)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => QccConfig::default(),
        };
        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `QCC_*` environment overrides.
    #[must_use]
    pub fn merge_env(self) -> Self {
        self.merge_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (used by `merge_env`).
    #[must_use]
    pub fn merge_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("QCC_LEARNING_RATE").and_then(|v| v.parse().ok()) {
            self.training.learning_rate = val;
        }
        if let Some(val) = lookup("QCC_MAX_ITERATIONS").and_then(|v| v.parse().ok()) {
            self.training.max_iterations = val;
        }
        if let Some(val) = lookup("QCC_TOLERANCE").and_then(|v| v.parse().ok()) {
            self.training.tolerance = val;
        }
        if let Some(loss) = lookup("QCC_LOSS").and_then(|v| Loss::from_name(&v)) {
            self.training.loss = loss;
        }
        if let Some(val) = lookup("QCC_PARALLEL").and_then(|v| v.parse().ok()) {
            self.training.parallel = val;
        }
        if let Some(level) = lookup("QCC_LOG_LEVEL") {
            self.logging.level = level;
        }
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.training
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.classifier.num_qubits == Some(0) {
            return Err(ConfigError::ValidationError(
                "classifier.num_qubits must be at least 1".into(),
            ));
        }
        if self.classifier.layers == Some(0) {
            return Err(ConfigError::ValidationError(
                "classifier.layers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = QccConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.training.loss, Loss::Hinge);
        assert!(config.classifier.num_qubits.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = QccConfig::from_yaml_str("training:\n  learning_rate: 0.5\n").unwrap();
        assert_eq!(config.training.learning_rate, 0.5);
        assert_eq!(config.training.max_iterations, 200);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_invalid_log_level() {
        let err = QccConfig::from_yaml_str("logging:\n  level: loud\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("QCC_LEARNING_RATE", "0.25"),
            ("QCC_MAX_ITERATIONS", "7"),
            ("QCC_LOSS", "logistic"),
            ("QCC_PARALLEL", "false"),
            ("QCC_TOLERANCE", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = QccConfig::default().merge_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.training.learning_rate, 0.25);
        assert_eq!(config.training.max_iterations, 7);
        assert_eq!(config.training.loss, Loss::Logistic);
        assert!(!config.training.parallel);
        // Unparseable values are ignored.
        assert_eq!(config.training.tolerance, 1e-6);
    }

    #[test]
    fn test_resolve_infers_sizes() {
        let structure = ClassifierConfig::default().resolve(4, 16).unwrap();
        assert_eq!(structure.num_qubits, 4);
        assert_eq!(structure.layers, 2);

        let explicit = ClassifierConfig {
            num_qubits: Some(2),
            layers: Some(3),
            ..ClassifierConfig::default()
        };
        assert_eq!(explicit.resolve(4, 16).unwrap().num_parameters(), 12);
        assert!(ClassifierConfig::default().resolve(3, 16).is_err());
    }
}

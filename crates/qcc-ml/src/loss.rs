//! Margin losses.
//!
//! Both losses are functions of the margin `m = y * (score + bias)` with the
//! bipolar label `y` in {-1, +1}. The training loss is the mean over examples.

use serde::{Deserialize, Serialize};

/// Per-example penalty on the margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// `max(0, 1 - m)`.
    #[default]
    Hinge,
    /// `ln(1 + e^(-m))`.
    Logistic,
}

impl Loss {
    /// Loss at margin `m`.
    pub fn value(self, margin: f64) -> f64 {
        match self {
            Loss::Hinge => (1.0 - margin).max(0.0),
            // softplus(-m), stable for large |m|
            Loss::Logistic => (-margin).max(0.0) + (-margin.abs()).exp().ln_1p(),
        }
    }

    /// Derivative with respect to the margin. The hinge kink at `m = 1` uses
    /// the zero subgradient.
    pub fn derivative(self, margin: f64) -> f64 {
        match self {
            Loss::Hinge => {
                if margin < 1.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Loss::Logistic => {
                if margin >= 0.0 {
                    let e = (-margin).exp();
                    -e / (1.0 + e)
                } else {
                    -1.0 / (1.0 + margin.exp())
                }
            }
        }
    }

    /// Parse a loss name as used in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hinge" => Some(Loss::Hinge),
            "logistic" | "log" => Some(Loss::Logistic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hinge() {
        assert_eq!(Loss::Hinge.value(2.0), 0.0);
        assert_eq!(Loss::Hinge.value(1.0), 0.0);
        assert_eq!(Loss::Hinge.value(0.0), 1.0);
        assert_eq!(Loss::Hinge.value(-1.0), 2.0);
        assert_eq!(Loss::Hinge.derivative(0.5), -1.0);
        assert_eq!(Loss::Hinge.derivative(1.0), 0.0);
    }

    #[test]
    fn test_logistic_matches_closed_form() {
        for &m in &[-30.0_f64, -2.0, -0.1, 0.0, 0.7, 5.0, 40.0] {
            let expected = (1.0 + (-m).exp()).ln();
            assert!((Loss::Logistic.value(m) - expected).abs() < 1e-9, "m = {m}");
        }
        assert!((Loss::Logistic.derivative(0.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_derivative_matches_finite_difference() {
        let h = 1e-6;
        for &m in &[-3.0, -0.5, 0.25, 2.0] {
            let fd = (Loss::Logistic.value(m + h) - Loss::Logistic.value(m - h)) / (2.0 * h);
            assert!((Loss::Logistic.derivative(m) - fd).abs() < 1e-6, "m = {m}");
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Loss::from_name("Hinge"), Some(Loss::Hinge));
        assert_eq!(Loss::from_name("logistic"), Some(Loss::Logistic));
        assert_eq!(Loss::from_name("mse"), None);
    }
}

//! Error types for run setup.
//!
//! Every variant here is fatal at setup time: a run is never started with a
//! configuration that fails validation.

use thiserror::Error;

/// Result alias for the core crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Configuration errors detected before any solver step runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A physical or simulation reference quantity is non-positive or not finite.
    #[error("Invalid unit configuration: {quantity} must be finite and > 0 (got {value})")]
    InvalidUnitConfiguration {
        /// Name of the offending quantity
        quantity: &'static str,
        /// Value that was supplied
        value: f64,
    },

    /// Rotation window bounds or cadence are inconsistent.
    #[error("Invalid rotation window: {reason}")]
    InvalidRotationWindow {
        /// What is wrong with the window
        reason: String,
    },

    /// Output timing parameters are inconsistent.
    #[error("Invalid output sampling: {reason}")]
    InvalidSampling {
        /// What is wrong with the sampling setup
        reason: String,
    },

    /// Simulation box sizing failed.
    #[error("Invalid domain: {reason}")]
    InvalidDomain {
        /// What is wrong with the domain request
        reason: String,
    },
}

impl CoreError {
    /// Check that `value` is finite and strictly positive.
    pub(crate) fn require_positive(quantity: &'static str, value: f64) -> CoreResult<f64> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Self::InvalidUnitConfiguration { quantity, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert_eq!(CoreError::require_positive("length", 2.0), Ok(2.0));
        assert!(CoreError::require_positive("length", 0.0).is_err());
        assert!(CoreError::require_positive("length", -1.0).is_err());
        assert!(CoreError::require_positive("length", f64::NAN).is_err());
        assert!(CoreError::require_positive("length", f64::INFINITY).is_err());
    }

    #[test]
    fn test_error_message_names_quantity() {
        let err = CoreError::require_positive("si_viscosity", -3.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("si_viscosity"));
        assert!(msg.contains("-3"));
    }
}

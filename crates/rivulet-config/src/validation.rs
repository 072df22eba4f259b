//! Range checks for engine settings.
//!
//! Every check reports the offending field by name so a caller can point at
//! the line of a settings file. [`check_all`] collects every failure instead
//! of stopping at the first one.
//!
//! ```rust
//! use rivulet_config::validation::{ValidationError, check_range};
//!
//! assert!(check_range("sample_rate", 48000.0, 8000.0, 384_000.0).is_ok());
//! let err = check_range("frames_per_block", 4.0, 16.0, 8192.0).unwrap_err();
//! assert!(matches!(err, ValidationError::OutOfRange { .. }));
//! ```

use thiserror::Error;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric setting outside its allowed range.
    #[error("setting '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the setting.
        param: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Setting present but malformed.
    #[error("invalid format for setting '{param}': {reason}")]
    InvalidFormat {
        /// Name of the setting.
        param: String,
        /// Description of the format error.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks `min <= value <= max`.
pub fn check_range(param: &str, value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            param: param.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Folds a list of check results into one.
///
/// Returns the single error unchanged when exactly one check failed, and
/// [`ValidationError::Multiple`] when several did.
pub fn check_all(results: impl IntoIterator<Item = ValidationResult<()>>) -> ValidationResult<()> {
    let mut errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        assert!(check_range("x", 1.0, 1.0, 2.0).is_ok());
        assert!(check_range("x", 2.0, 1.0, 2.0).is_ok());
        assert!(check_range("x", 2.5, 1.0, 2.0).is_err());
    }

    #[test]
    fn nan_is_out_of_range() {
        assert!(check_range("x", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn single_failure_is_not_wrapped() {
        let result = check_all([Ok(()), check_range("a", 5.0, 0.0, 1.0)]);
        assert!(matches!(result, Err(ValidationError::OutOfRange { ref param, .. }) if param == "a"));
    }

    #[test]
    fn several_failures_are_collected() {
        let result = check_all([check_range("a", 5.0, 0.0, 1.0), check_range("b", -1.0, 0.0, 1.0)]);
        let Err(ValidationError::Multiple(errors)) = result else {
            panic!("expected Multiple");
        };
        assert_eq!(errors.len(), 2);
        let text = ValidationError::Multiple(errors).to_string();
        assert!(text.contains("'a'") && text.contains("'b'"));
    }
}

use super::models::substance::SubstanceKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PropertyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing parameter '{parameter}' for '{substance}'")]
    MissingParameter {
        substance: String,
        parameter: &'static str,
    },

    #[error("No {kind} named '{name}' in the materials database")]
    NotFound { kind: SubstanceKind, name: String },

    #[error("Invalid structure identifier: '{0}'")]
    InvalidStructure(String),
}

impl PropertyError {
    pub(crate) fn missing(substance: &str, parameter: &'static str) -> Self {
        Self::MissingParameter {
            substance: substance.to_string(),
            parameter,
        }
    }

    pub(crate) fn unknown_name(category: &str, name: &str, valid: &[&str]) -> Self {
        Self::InvalidInput(format!(
            "Invalid {}: '{}'. Valid values are: {}",
            category,
            name,
            valid.join(", ")
        ))
    }
}

/// Rejects values outside the closed unit interval.
pub(crate) fn check_fraction(value: f64, what: &str) -> Result<f64, PropertyError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(PropertyError::InvalidInput(format!(
            "{} must be between 0 and 1, got {}",
            what, value
        )))
    }
}

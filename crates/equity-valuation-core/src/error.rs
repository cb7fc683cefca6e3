use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid assumption: {0}")]
    InvalidAssumption(String),

    #[error("Missing data: {field} is required for {context}")]
    MissingData { field: String, context: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ValuationError {
    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        ValuationError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: &str, context: &str) -> Self {
        ValuationError::MissingData {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Assumptions whose arithmetic leaves the `Decimal` range.
    pub(crate) fn overflow(context: &str) -> Self {
        ValuationError::InvalidAssumption(format!(
            "{context} exceeds the representable decimal range"
        ))
    }
}

impl From<serde_json::Error> for ValuationError {
    fn from(e: serde_json::Error) -> Self {
        ValuationError::Serialization(e.to_string())
    }
}

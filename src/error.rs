//! Error types for robust-cvar.

use thiserror::Error;

/// Error type for robust-cvar operations.
///
/// A solve that finishes as infeasible or unbounded is not an error; it is
/// reported through [`crate::portfolio::Outcome::NotSolved`].
#[derive(Debug, Error)]
pub enum CvarError {
    /// Scenario data is inconsistent with the branching or instruments.
    #[error("Invalid scenario data: {0}")]
    InvalidScenario(String),

    /// A model parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A variable name was declared twice.
    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    /// A constraint references a variable that was never declared.
    #[error("Constraint {constraint} references unknown variable {variable}")]
    UnknownVariable { constraint: String, variable: String },

    /// Lower bound above upper bound.
    #[error("Invalid bounds for {name}: lower {lower} > upper {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    /// A coefficient or right-hand side is NaN or infinite.
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    /// The selected backend cannot express part of the model.
    #[error("Backend {backend} does not support {feature}")]
    Unsupported {
        backend: &'static str,
        feature: String,
    },

    /// Solver error.
    #[error("Solver error: {0}")]
    SolverError(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Scenario document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O failure while reading input or writing an LP file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for robust-cvar operations.
pub type Result<T> = std::result::Result<T, CvarError>;

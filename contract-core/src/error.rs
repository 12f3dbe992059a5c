//! Configuration errors
//!
//! Raised before any optimization is attempted: a malformed type set or cost
//! model never reaches the solvers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Type distribution is empty")]
    EmptyTypeSet,

    #[error("Duplicate agent type: {0}")]
    DuplicateType(String),

    #[error("Agent type '{name}' has non-positive efficiency theta={theta}")]
    InvalidTheta { name: String, theta: f64 },

    #[error("Agent type '{name}' has probability {prob} outside (0, 1]")]
    InvalidProbability { name: String, prob: f64 },

    #[error("Type probabilities sum to {0}, expected 1")]
    ProbabilitySum(f64),

    #[error("Cost coefficients must be non-negative (c1={c1}, c2={c2})")]
    InvalidCost { c1: f64, c2: f64 },

    #[error("Numerical epsilon must be positive, got {0}")]
    InvalidEpsilon(f64),

    #[error("Total resource pool must be positive, got {0} Hz")]
    InvalidResourcePool(f64),

    #[error("Invalid simulation setting: {0}")]
    InvalidSetting(String),
}

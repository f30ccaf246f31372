//! Error types for the assessment core.
//!
//! Only contract violations by the caller surface as errors. Insufficient
//! data is an abstention and degenerate inputs produce `UNKNOWN` results,
//! so neither appears here.

use thiserror::Error;

/// A feature vector handed to the core did not satisfy its contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// A feature carried a JSON value that is neither a number nor null.
    #[error("feature '{name}' must be a number or null, got {kind}")]
    NonNumericFeature { name: String, kind: &'static str },

    /// A feature value was NaN or infinite.
    #[error("feature '{name}' must be finite, got {value}")]
    NonFiniteFeature { name: String, value: f64 },

    /// The batch document did not have the expected shape.
    #[error("malformed entity batch: {0}")]
    MalformedBatch(String),
}

/// Weight, threshold or band configuration is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("weight configured for unknown agent type '{0}'")]
    UnknownAgentType(String),

    #[error("no weight configured for agent type '{0}'")]
    MissingWeight(String),

    #[error("weight for '{name}' must be finite, got {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("dimension weights must have a positive sum, got {0:.6}")]
    WeightSum(f64),

    #[error("dimension weight for '{name}' must be non-negative, got {value}")]
    NegativeDimensionWeight { name: String, value: f64 },

    #[error("{what} thresholds must be strictly descending within [0, 100]: {detail}")]
    Thresholds { what: &'static str, detail: String },

    #[error("abstention threshold for '{name}' must lie in [0, 1], got {value}")]
    AbstentionThreshold { name: String, value: f64 },
}

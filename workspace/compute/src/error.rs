use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// The AI answer was not the JSON object we asked for
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field was present but held a value we cannot use
    #[error("Invalid field `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },

    /// Error from decimal operations
    #[error("Decimal error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;

//! Error types for costplan
//!
//! This module defines the error types used throughout the costplan library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Per-component outcomes such as an unsupported resource type, missing usage
//! data, or a price that could not be found are not errors. They are recorded
//! on the resource tree as [`PriceState`](crate::types::PriceState) values so
//! one bad component never aborts a whole evaluation.
//!
//! # Example
//!
//! ```
//! use costplan_core::error::{CostplanError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to CostplanError
//!     let _file = std::fs::read_to_string("nonexistent.json")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for costplan operations
#[derive(Error, Debug)]
pub enum CostplanError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An attribute filter pattern that does not compile
    #[error("Invalid attribute pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as written in the filter
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// The price catalog rejected or garbled a lookup
    ///
    /// Always treated as transient by the price resolver.
    #[error("Price catalog error: {0}")]
    Catalog(String),

    /// The evaluation run was cancelled before it finished
    #[error("Evaluation cancelled")]
    Cancelled,
}

impl CostplanError {
    /// Whether retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Catalog(_) | Self::Io(_))
    }
}

/// Convenience type alias for Results in costplan
pub type Result<T> = std::result::Result<T, CostplanError>;

//! Custom error types for denada operations.
//!
//! Only malformed input and invalid configuration are errors; algorithmic
//! outcomes like non-convergence, rejected pair merges, and ambiguous chimera
//! calls are reported through result diagnostics and metrics instead.

use thiserror::Error;

/// Result type alias for denada operations
pub type Result<T> = std::result::Result<T, DenadaError>;

/// Error type for denada operations
#[derive(Error, Debug)]
pub enum DenadaError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Invalid fraction or probability threshold
    #[error("Invalid fraction '{parameter}': {value} (must be in ({min}, {max}])")]
    InvalidFrequency {
        /// The parameter name
        parameter: String,
        /// The invalid frequency value
        value: f64,
        /// Exclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTQ", "sequence table")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Malformed sequence or quality data
    #[error("Invalid sequence: {reason}")]
    InvalidSequence {
        /// Explanation of the problem
        reason: String,
    },

    /// Forward and reverse inputs disagree on the number of reads
    #[error("Mismatched read pair counts: {forward} forward reads vs {reverse} reverse reads")]
    PairCountMismatch {
        /// Number of forward reads seen
        forward: u64,
        /// Number of reverse reads seen
        reverse: u64,
    },

    /// An operation was given nothing to work on
    #[error("Empty input: {context}")]
    EmptyInput {
        /// What was empty
        context: String,
    },
}

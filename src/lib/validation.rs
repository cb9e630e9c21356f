//! Input validation utilities
//!
//! This module provides common validation functions for command-line
//! parameters and file paths with consistent error messages.
//!
//! All validation functions use structured error types from [`crate::errors`]
//! to provide rich contextual information when validation fails.

use crate::errors::{DenadaError, Result};
use std::fmt::Display;
use std::path::Path;

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Forward FASTQ")
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use denada_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/reads.fastq", "Input FASTQ");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(DenadaError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that multiple files exist
///
/// # Arguments
/// * `files` - Slice of (path, description) tuples
///
/// # Errors
/// Returns an error for the first file that doesn't exist
///
/// # Example
/// ```no_run
/// use denada_lib::validation::validate_files_exist;
/// use std::path::PathBuf;
///
/// let files = vec![
///     (PathBuf::from("sample1.fastq"), "Sample FASTQ"),
///     (PathBuf::from("sample2.fastq"), "Sample FASTQ"),
/// ];
/// validate_files_exist(&files).unwrap();
/// ```
pub fn validate_files_exist<P: AsRef<Path>>(files: &[(P, &str)]) -> Result<()> {
    for (path, desc) in files {
        validate_file_exists(path, desc)?;
    }
    Ok(())
}

/// Validate that a fraction or probability threshold is in (0.0, 1.0]
///
/// Zero is excluded: a zero threshold would make every comparison pass and
/// is always a configuration mistake.
///
/// # Arguments
/// * `value` - Value to validate
/// * `name` - Name of the parameter for error messages
///
/// # Errors
/// Returns an error if the value is not in (0.0, 1.0]
///
/// # Example
/// ```
/// use denada_lib::validation::validate_fraction;
///
/// validate_fraction(1e-40, "omega").unwrap();
/// validate_fraction(0.9, "min-sample-fraction").unwrap();
///
/// let result = validate_fraction(1.5, "omega");
/// assert!(result.is_err());
/// ```
pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(DenadaError::InvalidFrequency {
            parameter: name.to_string(),
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Arguments
/// * `value` - Value to validate
/// * `name` - Name of the parameter for error messages
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use denada_lib::validation::validate_positive;
///
/// validate_positive(10, "max-iterations").unwrap();
///
/// let result = validate_positive(0, "max-iterations");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(DenadaError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

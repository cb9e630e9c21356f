//! Helper utilities for integration tests.

pub mod assertions;
pub mod fastq_generator;

pub use assertions::*;
pub use fastq_generator::*;

//! Structured metric types and TSV writer for denada operations.
//!
//! This module provides:
//! - [`Metric`] and [`ProcessingMetrics`] traits for extensible metric types
//! - Metric structs for denoising, pair merging, and chimera removal
//! - [`ErrorRateRow`] for emitting learned error-rate matrices
//! - [`write_metrics`] / [`write_metrics_auto`] for TSV file output

use std::path::Path;

use anyhow::Context;
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// This ensures consistent float formatting across all metrics output.
///
/// # Example
/// ```
/// use denada_lib::metrics::format_float;
/// assert_eq!(format_float(0.9), "0.900000");
/// assert_eq!(format_float(0.0), "0.000000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// Formats a count with thousands separators.
///
/// # Panics
///
/// Cannot panic: input is always valid UTF-8 since it comes from `u64::to_string()`.
///
/// # Examples
///
/// ```
/// use denada_lib::metrics::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(123), "123");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();

    bytes
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join(",")
}

/// A metric type that can be serialized to TSV files.
///
/// All metric types in denada implement this trait, providing a consistent
/// interface for serialization and identification.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}

/// Common interface for metrics that track processing pipeline counts.
///
/// This trait provides a consistent way to access input, output, and filtered
/// counts across different metric types, enabling generic summary output.
pub trait ProcessingMetrics {
    /// Total number of input items (reads, pairs, sequences) processed.
    fn total_input(&self) -> u64;

    /// Total number of output items produced.
    fn total_output(&self) -> u64;

    /// Total number of items filtered out or rejected.
    fn total_filtered(&self) -> u64;

    /// Processing efficiency as a percentage (output / input * 100).
    fn efficiency(&self) -> f64 {
        if self.total_input() == 0 {
            0.0
        } else {
            #[expect(clippy::cast_precision_loss, reason = "read counts never exceed 2^53")]
            let result = self.total_output() as f64 / self.total_input() as f64 * 100.0;
            result
        }
    }
}

/// Per-sample metrics for a denoising run.
///
/// One row per sample: how many reads and uniques went in, how many
/// partitions came out, and whether the error-model loop converged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DenoiseMetrics {
    /// Sample name (file stem of the input FASTQ)
    pub sample: String,
    /// Total reads dereplicated for this sample
    pub total_reads: u64,
    /// Distinct sequences after dereplication
    pub unique_sequences: u64,
    /// Partitions (denoised sequence variants) inferred
    pub partitions: u64,
    /// Alternation rounds of the partition/error-model loop
    pub iterations: u64,
    /// Whether the loop reached a fixed point before the iteration cap
    pub converged: bool,
    /// Largest error-rate change in the final round
    pub final_error_delta: f64,
    /// Fraction of reads that changed partition in the final round
    pub reassigned_fraction: f64,
}

impl DenoiseMetrics {
    /// Creates empty denoising metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for DenoiseMetrics {
    fn metric_name() -> &'static str {
        "denoise"
    }
}

/// Metrics for a pair-merging run.
///
/// Pair counts are in read pairs (weighted by abundance), not distinct
/// forward/reverse combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MergeMetrics {
    /// Read pairs considered for merging
    pub total_pairs: u64,
    /// Read pairs successfully merged
    pub merged_pairs: u64,
    /// Read pairs rejected: no overlap of the required length
    pub rejected_no_overlap: u64,
    /// Read pairs rejected: too many mismatches in the best overlap
    pub rejected_mismatches: u64,
    /// Read pairs rejected: too many ambiguous positions in the overlap
    pub rejected_ambiguous: u64,
    /// Distinct merged sequences produced
    pub merged_sequences: u64,
}

impl MergeMetrics {
    /// Creates empty merging metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for MergeMetrics {
    fn metric_name() -> &'static str {
        "merge"
    }
}

impl ProcessingMetrics for MergeMetrics {
    fn total_input(&self) -> u64 {
        self.total_pairs
    }

    fn total_output(&self) -> u64 {
        self.merged_pairs
    }

    fn total_filtered(&self) -> u64 {
        self.rejected_no_overlap + self.rejected_mismatches + self.rejected_ambiguous
    }
}

/// Metrics for a chimera-removal run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BimeraMetrics {
    /// Sequences examined as chimera candidates
    pub sequences_tested: u64,
    /// Sequences flagged as chimeric
    pub chimeric_sequences: u64,
    /// Sequences retained
    pub genuine_sequences: u64,
    /// Total reads across all tested sequences
    pub total_reads: u64,
    /// Reads removed with the chimeric sequences
    pub reads_removed: u64,
}

impl BimeraMetrics {
    /// Creates empty chimera-removal metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for BimeraMetrics {
    fn metric_name() -> &'static str {
        "bimera"
    }
}

impl ProcessingMetrics for BimeraMetrics {
    fn total_input(&self) -> u64 {
        self.sequences_tested
    }

    fn total_output(&self) -> u64 {
        self.genuine_sequences
    }

    fn total_filtered(&self) -> u64 {
        self.chimeric_sequences
    }
}

/// One row of a per-sequence chimera call table.
///
/// Chimeric rows carry the two parent sequences and the breakpoint (prefix
/// length taken from the left parent); genuine rows leave those columns
/// empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BimeraCallRow {
    /// The sequence under scrutiny
    pub sequence: String,
    /// Total reads across samples
    pub total_abundance: u64,
    /// Whether the sequence was flagged as chimeric
    pub chimeric: bool,
    /// Prefix length taken from the left parent
    pub breakpoint: Option<usize>,
    /// Abundance-fold evidence: min(parent abundances) / candidate abundance
    pub score: f64,
    /// Left (prefix) parent sequence
    pub left_parent: Option<String>,
    /// Right (suffix) parent sequence
    pub right_parent: Option<String>,
}

impl Metric for BimeraCallRow {
    fn metric_name() -> &'static str {
        "bimera call"
    }
}

/// One row of a learned error-rate matrix: the sixteen substitution
/// probabilities for a single quality bucket.
///
/// Column names follow the `ref>obs` convention, so `A>G` is the probability
/// of observing G where the true base is A.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ErrorRateRow {
    /// Quality bucket (rounded mean Phred score)
    pub quality: u8,
    #[serde(rename = "A>A")]
    pub a_to_a: f64,
    #[serde(rename = "A>C")]
    pub a_to_c: f64,
    #[serde(rename = "A>G")]
    pub a_to_g: f64,
    #[serde(rename = "A>T")]
    pub a_to_t: f64,
    #[serde(rename = "C>A")]
    pub c_to_a: f64,
    #[serde(rename = "C>C")]
    pub c_to_c: f64,
    #[serde(rename = "C>G")]
    pub c_to_g: f64,
    #[serde(rename = "C>T")]
    pub c_to_t: f64,
    #[serde(rename = "G>A")]
    pub g_to_a: f64,
    #[serde(rename = "G>C")]
    pub g_to_c: f64,
    #[serde(rename = "G>G")]
    pub g_to_g: f64,
    #[serde(rename = "G>T")]
    pub g_to_t: f64,
    #[serde(rename = "T>A")]
    pub t_to_a: f64,
    #[serde(rename = "T>C")]
    pub t_to_c: f64,
    #[serde(rename = "T>G")]
    pub t_to_g: f64,
    #[serde(rename = "T>T")]
    pub t_to_t: f64,
}

impl ErrorRateRow {
    /// Builds a row from a quality bucket and its 4x4 substitution matrix
    /// (indexed `[ref][obs]` in A, C, G, T order).
    #[must_use]
    pub fn new(quality: u8, rates: &[[f64; 4]; 4]) -> Self {
        Self {
            quality,
            a_to_a: rates[0][0],
            a_to_c: rates[0][1],
            a_to_g: rates[0][2],
            a_to_t: rates[0][3],
            c_to_a: rates[1][0],
            c_to_c: rates[1][1],
            c_to_g: rates[1][2],
            c_to_t: rates[1][3],
            g_to_a: rates[2][0],
            g_to_c: rates[2][1],
            g_to_g: rates[2][2],
            g_to_t: rates[2][3],
            t_to_a: rates[3][0],
            t_to_c: rates[3][1],
            t_to_g: rates[3][2],
            t_to_t: rates[3][3],
        }
    }
}

impl Metric for ErrorRateRow {
    fn metric_name() -> &'static str {
        "error rate"
    }
}

/// Write metrics to a TSV file with consistent error handling.
///
/// This is a convenience wrapper around `DelimFile::write_tsv` that provides
/// consistent error messages across all commands.
///
/// # Arguments
/// * `path` - Path to the output TSV file
/// * `metrics` - The metrics to write (must implement Serialize)
/// * `description` - Human-readable description of the metrics for error messages
///
/// # Errors
/// Returns an error if the file cannot be created or written to
///
/// # Example
/// ```no_run
/// use denada_lib::metrics::write_metrics;
/// use serde::Serialize;
/// use std::path::Path;
///
/// #[derive(Serialize)]
/// struct MyMetrics {
///     count: usize,
///     value: f64,
/// }
///
/// let metrics = vec![
///     MyMetrics { count: 10, value: 1.5 },
///     MyMetrics { count: 20, value: 2.5 },
/// ];
///
/// write_metrics(Path::new("metrics.txt"), &metrics, "processing").unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Serialize>(
    path: P,
    metrics: &[T],
    description: &str,
) -> anyhow::Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, metrics)
        .with_context(|| format!("Failed to write {} metrics: {}", description, path_ref.display()))
}

/// Write metrics implementing the Metric trait to a TSV file.
///
/// This version uses the metric's own name for error messages, providing
/// a more concise API when the metrics type is known at compile time.
///
/// # Arguments
/// * `path` - Path to the output TSV file
/// * `metrics` - The metrics to write (must implement Metric)
///
/// # Errors
/// Returns an error if the file cannot be created or written to
///
/// # Example
/// ```no_run
/// use denada_lib::metrics::{write_metrics_auto, MergeMetrics};
/// use std::path::Path;
///
/// let metrics = vec![MergeMetrics::default()];
/// write_metrics_auto(Path::new("metrics.txt"), &metrics).unwrap();
/// ```
pub fn write_metrics_auto<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> anyhow::Result<()> {
    write_metrics(path, metrics, T::metric_name())
}

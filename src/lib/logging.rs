//! Enhanced logging utilities for formatted output.
//!
//! This module provides consistent, user-friendly logging utilities for metrics,
//! progress tracking, and operation summaries.

use std::time::{Duration, Instant};

use crate::metrics::{format_count, BimeraMetrics, DenoiseMetrics, MergeMetrics};

/// Formats a percentage with specified decimal places.
///
/// # Arguments
///
/// * `value` - The fraction (0.0-1.0) to format as percentage
/// * `decimals` - Number of decimal places to include
///
/// # Returns
///
/// A string formatted as "XX.XX%" (e.g., "95.43%")
///
/// # Examples
///
/// ```
/// use denada_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(0.5, 1), "50.0%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form.
///
/// # Arguments
///
/// * `duration` - The duration to format
///
/// # Returns
///
/// A human-readable string (e.g., "2m 15s", "1h 30m", "45s")
///
/// # Examples
///
/// ```
/// use denada_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate (items per second) with appropriate units.
///
/// # Arguments
///
/// * `count` - Number of items processed
/// * `duration` - Time taken to process items
///
/// # Returns
///
/// A formatted rate string (e.g., "1,234 items/s", "50.0 items/min")
///
/// # Examples
///
/// ```
/// use denada_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 items/s");
/// assert_eq!(format_rate(600, Duration::from_secs(60)), "10 items/s");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        let items_per_min = count as f64 / (secs / 60.0);
        format!("{items_per_min:.1} items/min")
    }
}

/// Logs a formatted summary of denoising metrics.
///
/// Outputs read and partition counts plus the convergence outcome of the
/// error-model loop.
///
/// # Arguments
///
/// * `metrics` - The denoising metrics to summarize
///
/// # Examples
///
/// ```no_run
/// use denada_lib::logging::log_denoise_summary;
/// use denada_lib::metrics::DenoiseMetrics;
///
/// let mut metrics = DenoiseMetrics::new();
/// metrics.sample = "sample1".to_string();
/// metrics.total_reads = 10_000;
/// metrics.unique_sequences = 1_200;
/// metrics.partitions = 85;
///
/// log_denoise_summary(&metrics);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn log_denoise_summary(metrics: &DenoiseMetrics) {
    log::info!("Denoising Summary ({}):", metrics.sample);
    log::info!("  Input reads: {}", format_count(metrics.total_reads));
    log::info!("  Unique sequences: {}", format_count(metrics.unique_sequences));
    log::info!("  Partitions: {}", format_count(metrics.partitions));

    if metrics.unique_sequences > 0 {
        let collapse = metrics.partitions as f64 / metrics.unique_sequences as f64;
        log::info!("  Partitions per unique: {}", format_percent(collapse, 2));
    }

    let outcome = if metrics.converged { "converged" } else { "not converged" };
    log::info!("  Iterations: {} ({})", metrics.iterations, outcome);
    log::info!("  Final error-rate delta: {:.3e}", metrics.final_error_delta);
}

/// Logs a formatted summary of pair-merging metrics.
///
/// Outputs pair counts, the merge rate, and a breakdown of rejection reasons
/// sorted by frequency.
///
/// # Arguments
///
/// * `metrics` - The merging metrics to summarize
///
/// # Examples
///
/// ```no_run
/// use denada_lib::logging::log_merge_summary;
/// use denada_lib::metrics::MergeMetrics;
///
/// let mut metrics = MergeMetrics::new();
/// metrics.total_pairs = 10_000;
/// metrics.merged_pairs = 9_200;
/// metrics.rejected_no_overlap = 800;
///
/// log_merge_summary(&metrics);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn log_merge_summary(metrics: &MergeMetrics) {
    log::info!("Pair Merging Summary:");
    log::info!("  Read pairs: {}", format_count(metrics.total_pairs));
    log::info!("  Merged pairs: {}", format_count(metrics.merged_pairs));

    if metrics.total_pairs > 0 {
        let merge_rate = metrics.merged_pairs as f64 / metrics.total_pairs as f64;
        log::info!("  Merge rate: {}", format_percent(merge_rate, 2));
    }

    let mut reasons = [
        ("No overlap found", metrics.rejected_no_overlap),
        ("Too many overlap mismatches", metrics.rejected_mismatches),
        ("Too many ambiguous positions", metrics.rejected_ambiguous),
    ];
    if reasons.iter().any(|(_, count)| *count > 0) {
        log::info!("  Rejection reasons:");
        reasons.sort_by(|a, b| b.1.cmp(&a.1));
        for (reason, count) in reasons.iter().filter(|(_, count)| *count > 0) {
            log::info!("    {}: {}", reason, format_count(*count));
        }
    }

    log::info!("  Distinct merged sequences: {}", format_count(metrics.merged_sequences));
}

/// Logs a formatted summary of chimera-removal metrics.
///
/// Outputs tested/flagged sequence counts and the fraction of reads removed.
///
/// # Arguments
///
/// * `metrics` - The chimera-removal metrics to summarize
///
/// # Examples
///
/// ```no_run
/// use denada_lib::logging::log_bimera_summary;
/// use denada_lib::metrics::BimeraMetrics;
///
/// let mut metrics = BimeraMetrics::new();
/// metrics.sequences_tested = 500;
/// metrics.chimeric_sequences = 40;
/// metrics.genuine_sequences = 460;
///
/// log_bimera_summary(&metrics);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn log_bimera_summary(metrics: &BimeraMetrics) {
    log::info!("Chimera Removal Summary:");
    log::info!("  Sequences tested: {}", format_count(metrics.sequences_tested));
    log::info!("  Chimeric: {}", format_count(metrics.chimeric_sequences));
    log::info!("  Retained: {}", format_count(metrics.genuine_sequences));

    if metrics.sequences_tested > 0 {
        let chimeric_rate = metrics.chimeric_sequences as f64 / metrics.sequences_tested as f64;
        log::info!("  Chimeric fraction: {}", format_percent(chimeric_rate, 2));
    }

    if metrics.total_reads > 0 {
        let read_fraction = metrics.reads_removed as f64 / metrics.total_reads as f64;
        log::info!(
            "  Reads removed: {} ({})",
            format_count(metrics.reads_removed),
            format_percent(read_fraction, 2)
        );
    }
}

/// Operation timing and summary helper.
///
/// Tracks operation timing and provides formatted summary output.
///
/// # Examples
///
/// ```no_run
/// use denada_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Processing reads");
///
/// // ... do work ...
///
/// timer.log_completion(10_000); // Log with item count
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}

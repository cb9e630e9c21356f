//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Args;

use denada_lib::align::AlignScoring;
use denada_lib::denoise::DenoiseOptions;

/// Common threading options for parallel processing.
///
/// The `--threads N` option caps the worker pool at N threads. When unset,
/// the pool sizes itself to the available cores.
#[derive(Debug, Clone, Default, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads (default: all available cores)
    #[arg(short = '@', short_alias = 't', long = "threads")]
    pub threads: Option<usize>,
}

impl ThreadingOptions {
    /// Creates threading options with an explicit thread count.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self { threads: Some(threads) }
    }

    /// Creates threading options that defer to the core count.
    #[must_use]
    pub fn none() -> Self {
        Self { threads: None }
    }

    /// Builds the global worker pool when an explicit count was given.
    ///
    /// The pool can only be built once per process, so commands call this
    /// exactly once before any parallel work.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread count is zero or the pool was already
    /// built.
    pub fn initialize(&self) -> anyhow::Result<()> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                bail!("--threads must be at least 1, got {}", threads);
            }
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .context("Failed to build the worker thread pool")?;
        }
        Ok(())
    }

    /// Returns a log message describing the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self.threads {
            None => "Using all available cores".to_string(),
            Some(n) => format!("Using {n} threads"),
        }
    }
}

/// Options for writing run metrics to a TSV file.
#[derive(Debug, Clone, Default, Args)]
pub struct MetricsOptions {
    /// Optional output TSV file for run metrics
    #[arg(short = 'm', long = "metrics")]
    pub metrics: Option<PathBuf>,
}

impl MetricsOptions {
    /// Returns true if metrics output is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Options controlling the banded aligner used to compare sequences.
#[derive(Debug, Clone, Args)]
pub struct AlignmentOptions {
    /// Score for a matching base
    #[arg(long = "match-score", default_value = "5")]
    pub match_score: i32,

    /// Penalty for a mismatching base (must be negative)
    #[arg(long = "mismatch", default_value = "-4", allow_negative_numbers = true)]
    pub mismatch: i32,

    /// Penalty per gap position (must be negative)
    #[arg(long = "gap", default_value = "-8", allow_negative_numbers = true)]
    pub gap: i32,

    /// Band half-width around the alignment diagonal (0 disables banding)
    #[arg(long = "band-width", default_value = "16")]
    pub band_width: usize,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        let scoring = AlignScoring::default();
        Self {
            match_score: scoring.match_score,
            mismatch: scoring.mismatch,
            gap: scoring.gap,
            band_width: scoring.band,
        }
    }
}

impl AlignmentOptions {
    /// Validates the alignment options.
    ///
    /// # Errors
    ///
    /// Returns an error if the match score is not positive or either penalty
    /// is not negative.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.match_score <= 0 {
            bail!("match-score ({}) must be positive", self.match_score);
        }
        if self.mismatch >= 0 {
            bail!("mismatch ({}) must be negative", self.mismatch);
        }
        if self.gap >= 0 {
            bail!("gap ({}) must be negative", self.gap);
        }
        Ok(())
    }

    /// Converts to the scoring parameters the aligner consumes.
    #[must_use]
    pub fn to_scoring(&self) -> AlignScoring {
        AlignScoring {
            match_score: self.match_score,
            mismatch: self.mismatch,
            gap: self.gap,
            band: self.band_width,
        }
    }
}

/// Common options for the denoising loop (denoise, merge).
#[derive(Debug, Clone, Args)]
pub struct DenoisingOptions {
    /// Significance threshold below which a sequence seeds a new partition
    #[arg(long = "omega", default_value = "1e-40")]
    pub omega: f64,

    /// Maximum partition/refit rounds before giving up on convergence
    #[arg(long = "max-iterations", default_value = "10")]
    pub max_iterations: usize,

    /// Convergence tolerance for error rates and read reassignment
    #[arg(long = "tolerance", default_value = "1e-7")]
    pub tolerance: f64,

    /// Pseudocount added to transition counts when refitting error rates
    #[arg(long = "pseudocount", default_value = "1.0")]
    pub pseudocount: f64,
}

impl Default for DenoisingOptions {
    fn default() -> Self {
        let options = DenoiseOptions::default();
        Self {
            omega: options.omega,
            max_iterations: options.max_iterations,
            tolerance: options.tolerance,
            pseudocount: options.pseudocount,
        }
    }
}

impl DenoisingOptions {
    /// Validates the denoising options.
    ///
    /// # Errors
    ///
    /// Returns an error if omega is outside (0, 1], the iteration cap is
    /// zero, or the tolerance or pseudocount is not a positive finite number.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.omega > 0.0 && self.omega <= 1.0) {
            bail!("omega ({}) must be in (0, 1]", self.omega);
        }
        if self.max_iterations == 0 {
            bail!("max-iterations must be at least 1");
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            bail!("tolerance ({}) must be a positive finite number", self.tolerance);
        }
        if !(self.pseudocount > 0.0 && self.pseudocount.is_finite()) {
            bail!("pseudocount ({}) must be a positive finite number", self.pseudocount);
        }
        Ok(())
    }

    /// Combines these options with alignment scoring into the full set the
    /// denoiser consumes.
    #[must_use]
    pub fn to_options(&self, scoring: AlignScoring) -> DenoiseOptions {
        DenoiseOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            omega: self.omega,
            pseudocount: self.pseudocount,
            scoring,
        }
    }
}

/// Derives a sample name from a FASTQ path by dropping the directory and any
/// `.fastq`/`.fq` extension, gzipped or not.
#[must_use]
pub fn sample_name_from_path(path: &Path) -> String {
    let file_name =
        path.file_name().map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy());
    let mut trimmed = file_name.as_ref();
    for suffix in [".gz", ".fastq", ".fq"] {
        trimmed = trimmed.strip_suffix(suffix).unwrap_or(trimmed);
    }
    if trimmed.is_empty() { file_name.to_string() } else { trimmed.to_string() }
}

/// Derives a sample name from a read-one FASTQ path, additionally dropping a
/// trailing `_R1`, `.R1`, or `_1` read marker.
#[must_use]
pub fn pair_sample_name(path: &Path) -> String {
    let name = sample_name_from_path(path);
    for marker in ["_R1", ".R1", "_1"] {
        if let Some(stripped) = name.strip_suffix(marker) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    name
}

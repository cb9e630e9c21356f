//! Self-consistent denoising of a dereplicated sample.
//!
//! Partitioning needs an error model and the error model is estimated from
//! partitioned data, so neither can be computed first. The loop here starts
//! from a quality-derived prior, alternates a full partition pass with a
//! model refit, and stops once both sides agree: the refit moves no rate by
//! more than the tolerance and no meaningful fraction of reads changes
//! partition. Hitting the iteration cap is reported, not fatal; the last
//! state is still usable.

use log::{info, warn};

use crate::align::{AlignScoring, AlignmentCache};
use crate::derep::UniqueSequence;
use crate::errors::{DenadaError, Result};
use crate::model::{ErrorModel, TransitionCounts};
use crate::partition::{partition_uniques, PartitionParams, PartitionSet};
use crate::validation::{validate_fraction, validate_positive};

/// Tuning knobs for the denoising loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenoiseOptions {
    /// Cap on partition/refit rounds before giving up on convergence
    pub max_iterations: usize,
    /// Convergence tolerance applied to both the largest per-cell error-rate
    /// change and the read-weighted reassignment fraction
    pub tolerance: f64,
    /// Partition-forming significance threshold
    pub omega: f64,
    /// Pseudocount added to every transition cell during model estimation
    pub pseudocount: f64,
    /// Alignment scoring for transition profiles
    pub scoring: AlignScoring,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-7,
            omega: 1e-40,
            pseudocount: 1.0,
            scoring: AlignScoring::default(),
        }
    }
}

impl DenoiseOptions {
    /// Validates option values, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.max_iterations, "max-iterations")?;
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(DenadaError::InvalidParameter {
                parameter: "tolerance".to_string(),
                reason: format!("Must be a positive finite number, got: {}", self.tolerance),
            });
        }
        validate_fraction(self.omega, "omega")?;
        if !(self.pseudocount > 0.0 && self.pseudocount.is_finite()) {
            return Err(DenadaError::InvalidParameter {
                parameter: "pseudocount".to_string(),
                reason: format!("Must be a positive finite number, got: {}", self.pseudocount),
            });
        }
        Ok(())
    }
}

/// How the denoising loop ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenoiseDiagnostics {
    /// Number of partition/refit rounds executed
    pub iterations: usize,
    /// Whether both the model and the assignment stabilized within tolerance
    pub converged: bool,
    /// Largest per-cell error-rate change in the final refit
    pub final_error_delta: f64,
    /// Read-weighted fraction of reads that changed partition in the final
    /// round; 1.0 on the first round by definition
    pub reassigned_fraction: f64,
}

/// Output of [`denoise`]: the final partitioning, the refit error model, and
/// convergence diagnostics.
#[derive(Debug, Clone)]
pub struct DenoiseResult {
    pub partitions: PartitionSet,
    pub model: ErrorModel,
    pub diagnostics: DenoiseDiagnostics,
}

/// Runs the self-consistency loop over a dereplicated sample.
///
/// `uniques` must be the output of [`crate::derep::Dereplicator::finish`]
/// (abundance-descending order). Returns an error only for empty input or
/// invalid options; failure to converge is reported through
/// [`DenoiseDiagnostics`].
#[allow(clippy::cast_precision_loss)]
pub fn denoise(uniques: &[UniqueSequence], options: &DenoiseOptions) -> Result<DenoiseResult> {
    options.validate()?;
    if uniques.is_empty() {
        return Err(DenadaError::EmptyInput {
            context: "no unique sequences to denoise".to_string(),
        });
    }

    let params = PartitionParams { omega: options.omega, scoring: options.scoring };
    let total_reads: u64 = uniques.iter().map(UniqueSequence::abundance).sum();

    let mut model = ErrorModel::quality_prior();
    let mut cache = AlignmentCache::new();
    let mut prev_centers: Option<Vec<usize>> = None;
    let mut iteration = 0;

    let (set, diagnostics) = loop {
        iteration += 1;

        let set = partition_uniques(uniques, &model, &mut cache, &params);
        let refit = refit_model(uniques, &set, &cache, &model, options.pseudocount);
        let delta = refit.max_abs_delta(&model);
        model = refit;

        let centers = center_by_unique(&set, uniques.len());
        let reassigned = match &prev_centers {
            None => 1.0,
            Some(prev) => {
                let moved: u64 = uniques
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| prev[i] != centers[i])
                    .map(|(_, u)| u.abundance())
                    .sum();
                moved as f64 / total_reads as f64
            }
        };
        prev_centers = Some(centers);

        info!(
            "Iteration {}: {} partitions, error delta {:.3e}, {:.3}% of reads reassigned",
            iteration,
            set.len(),
            delta,
            reassigned * 100.0
        );

        let converged = delta < options.tolerance && reassigned < options.tolerance;
        if converged || iteration >= options.max_iterations {
            let diagnostics = DenoiseDiagnostics {
                iterations: iteration,
                converged,
                final_error_delta: delta,
                reassigned_fraction: reassigned,
            };
            break (set, diagnostics);
        }
    };

    if !diagnostics.converged {
        warn!(
            "Denoising did not converge after {} iterations (error delta {:.3e}, {:.3}% reassigned); using the final state",
            diagnostics.iterations,
            diagnostics.final_error_delta,
            diagnostics.reassigned_fraction * 100.0
        );
    }

    Ok(DenoiseResult { partitions: set, model, diagnostics })
}

/// Denoised output sequences: each partition center with the partition's
/// total read count, sorted abundance-descending with sequence as the
/// tie-break.
#[must_use]
pub fn denoised_sequences(
    uniques: &[UniqueSequence],
    partitions: &PartitionSet,
) -> Vec<(Vec<u8>, u64)> {
    let mut out: Vec<(Vec<u8>, u64)> = partitions
        .partitions()
        .iter()
        .map(|p| (uniques[p.center()].sequence().to_vec(), p.reads()))
        .collect();
    out.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Re-estimates the error model from the current partitioning. Every member
/// contributes its transitions against its partition center, weighted by
/// abundance; centers contribute pure matches.
#[allow(clippy::cast_possible_truncation)]
fn refit_model(
    uniques: &[UniqueSequence],
    set: &PartitionSet,
    cache: &AlignmentCache,
    previous: &ErrorModel,
    pseudocount: f64,
) -> ErrorModel {
    let mut counts = TransitionCounts::new();
    for partition in set.partitions() {
        let center = partition.center() as u32;
        for member in partition.members() {
            let profile = cache
                .get(member.unique as u32, center)
                .expect("profile cached for every assigned pair");
            counts.observe_profile(profile, uniques[member.unique].abundance());
        }
    }
    ErrorModel::estimate(&counts, previous, pseudocount)
}

/// For each unique index, the unique index of its partition center.
fn center_by_unique(set: &PartitionSet, n: usize) -> Vec<usize> {
    let mut centers = vec![0usize; n];
    for partition in set.partitions() {
        for member in partition.members() {
            centers[member.unique] = partition.center();
        }
    }
    centers
}

//! Quality-stratified substitution error model.
//!
//! The model holds, for every quality bucket, a 4x4 matrix of probabilities
//! `rate[ref][obs]`: the chance that a true `ref` base is read as `obs` at
//! that quality. Natural-log copies are kept alongside so that scoring an
//! alignment is a sum of lookups rather than a product of probabilities that
//! would underflow on realistic read lengths.
//!
//! Before any data has been seen, rates come from the nominal meaning of the
//! Phred scale ([`ErrorModel::quality_prior`]). Refitting tallies observed
//! transitions into [`TransitionCounts`] and re-estimates each row with
//! pseudocount smoothing; rows with no observations keep the previous model's
//! values so sparse quality buckets never collapse to zero.

use crate::align::TransitionProfile;
use crate::metrics::ErrorRateRow;
use crate::phred::{
    ln_one_minus_exp, phred_to_error_prob, phred_to_ln_error_prob, MAX_PHRED, MIN_PHRED,
};

/// Substitution probabilities for one quality bucket, indexed `[ref][obs]`
/// in A, C, G, T order.
pub type SubstitutionMatrix = [[f64; 4]; 4];

/// One bucket per integer quality score.
const NUM_BUCKETS: usize = MAX_PHRED as usize + 1;

const LN_THREE: f64 = 1.098_612_288_668_109_8;

/// Per-quality substitution probabilities with precomputed logs.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorModel {
    rates: Vec<SubstitutionMatrix>,
    ln_rates: Vec<SubstitutionMatrix>,
}

impl ErrorModel {
    /// Builds the prior model implied by the Phred scale: at quality `q` the
    /// total error probability is `10^(-q/10)`, split evenly across the three
    /// substitutions.
    ///
    /// Qualities below [`MIN_PHRED`] are clamped up to it, which keeps every
    /// rate strictly inside (0, 1).
    #[must_use]
    pub fn quality_prior() -> Self {
        let mut rates = Vec::with_capacity(NUM_BUCKETS);
        let mut ln_rates = Vec::with_capacity(NUM_BUCKETS);

        for quality in 0..NUM_BUCKETS {
            #[allow(clippy::cast_possible_truncation)]
            let clamped = (quality as u8).max(MIN_PHRED);
            let err = phred_to_error_prob(clamped);
            let ln_err = phred_to_ln_error_prob(clamped);

            let mut matrix = [[err / 3.0; 4]; 4];
            let mut ln_matrix = [[ln_err - LN_THREE; 4]; 4];
            for base in 0..4 {
                matrix[base][base] = 1.0 - err;
                ln_matrix[base][base] = ln_one_minus_exp(ln_err);
            }
            rates.push(matrix);
            ln_rates.push(ln_matrix);
        }

        Self { rates, ln_rates }
    }

    fn from_rates(rates: Vec<SubstitutionMatrix>) -> Self {
        let ln_rates = rates
            .iter()
            .map(|matrix| {
                let mut ln_matrix = [[0.0; 4]; 4];
                for (ln_row, row) in ln_matrix.iter_mut().zip(matrix) {
                    for (ln_cell, &cell) in ln_row.iter_mut().zip(row) {
                        *ln_cell = cell.ln();
                    }
                }
                ln_matrix
            })
            .collect();
        Self { rates, ln_rates }
    }

    /// Re-estimates the model from observed transition counts.
    ///
    /// Each `(quality, ref)` row becomes `(count + pseudocount) /
    /// (row_total + 4 * pseudocount)`; rows with no observations inherit the
    /// corresponding row of `prior` unchanged.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(counts: &TransitionCounts, prior: &Self, pseudocount: f64) -> Self {
        let rates = counts
            .counts
            .iter()
            .enumerate()
            .map(|(quality, matrix)| {
                let mut out = prior.rates[quality];
                for (ref_base, row) in matrix.iter().enumerate() {
                    let row_total: u64 = row.iter().sum();
                    if row_total == 0 {
                        continue;
                    }
                    let denominator = row_total as f64 + 4.0 * pseudocount;
                    for (obs_base, &count) in row.iter().enumerate() {
                        out[ref_base][obs_base] = (count as f64 + pseudocount) / denominator;
                    }
                }
                out
            })
            .collect();
        Self::from_rates(rates)
    }

    /// The substitution probability for one `(quality, ref, obs)` cell.
    #[must_use]
    pub fn rate(&self, quality: u8, ref_index: u8, obs_index: u8) -> f64 {
        self.rates[quality as usize][ref_index as usize][obs_index as usize]
    }

    /// Natural log of [`ErrorModel::rate`].
    #[must_use]
    pub fn ln_rate(&self, quality: u8, ref_index: u8, obs_index: u8) -> f64 {
        self.ln_rates[quality as usize][ref_index as usize][obs_index as usize]
    }

    /// The full 4x4 matrix for one quality bucket.
    #[must_use]
    pub fn substitution_matrix(&self, quality: u8) -> &SubstitutionMatrix {
        &self.rates[quality as usize]
    }

    /// Log-probability that a read generated from the profile's center would
    /// come out as the profile's query: the sum of per-column log rates.
    #[must_use]
    pub fn ln_lambda(&self, profile: &TransitionProfile) -> f64 {
        profile
            .transitions()
            .iter()
            .map(|t| self.ln_rates[t.quality as usize][t.ref_index as usize][t.obs_index as usize])
            .sum()
    }

    /// Largest absolute difference between any rate cell of two models.
    #[must_use]
    pub fn max_abs_delta(&self, other: &Self) -> f64 {
        let mut max_delta: f64 = 0.0;
        for (a, b) in self.rates.iter().zip(&other.rates) {
            for (a_row, b_row) in a.iter().zip(b) {
                for (a_cell, b_cell) in a_row.iter().zip(b_row) {
                    max_delta = max_delta.max((a_cell - b_cell).abs());
                }
            }
        }
        max_delta
    }

    /// Converts the model to TSV rows, one per quality bucket.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_metric_rows(&self) -> Vec<ErrorRateRow> {
        self.rates
            .iter()
            .enumerate()
            .map(|(quality, matrix)| ErrorRateRow::new(quality as u8, matrix))
            .collect()
    }
}

/// Abundance-weighted tallies of observed transitions, one matrix per
/// quality bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCounts {
    counts: Vec<[[u64; 4]; 4]>,
}

impl Default for TransitionCounts {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionCounts {
    /// Creates zeroed counts.
    #[must_use]
    pub fn new() -> Self {
        Self { counts: vec![[[0; 4]; 4]; NUM_BUCKETS] }
    }

    /// Tallies every column of a profile, weighted by the abundance of the
    /// unique sequence the profile belongs to.
    pub fn observe_profile(&mut self, profile: &TransitionProfile, weight: u64) {
        for t in profile.transitions() {
            self.counts[t.quality as usize][t.ref_index as usize][t.obs_index as usize] += weight;
        }
    }

    /// Adds another tally into this one. Used to reduce per-thread partials.
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            for (my_row, their_row) in mine.iter_mut().zip(theirs) {
                for (my_cell, their_cell) in my_row.iter_mut().zip(their_row) {
                    *my_cell += their_cell;
                }
            }
        }
    }

    /// The tally for one `(quality, ref, obs)` cell.
    #[must_use]
    pub fn count(&self, quality: u8, ref_index: u8, obs_index: u8) -> u64 {
        self.counts[quality as usize][ref_index as usize][obs_index as usize]
    }

    /// Total observations across all cells.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .map(|matrix| matrix.iter().map(|row| row.iter().sum::<u64>()).sum::<u64>())
            .sum()
    }
}

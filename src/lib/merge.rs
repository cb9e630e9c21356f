//! Overlap merging of denoised read pairs.
//!
//! Merging happens after each direction has been denoised separately. Pair
//! links from dereplication map each (forward unique, reverse unique) pair
//! onto a (forward partition, reverse partition) combination, and the
//! combination's reads merge via the two partition centers rather than the
//! raw reads. A combination either yields one merged sequence or is rejected
//! whole; rejection is counted, never fatal.

use ahash::AHashMap;
use log::warn;

use crate::align::AlignScoring;
use crate::derep::{PairLink, UniqueSequence};
use crate::dna::{reverse_complement, NO_CALL_BASE};
use crate::errors::Result;
use crate::metrics::MergeMetrics;
use crate::partition::PartitionSet;
use crate::validation::validate_positive;

/// Tuning knobs for pair merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    /// Minimum overlap length for an acceptable merge
    pub min_overlap: usize,
    /// Maximum mismatches tolerated within the overlap
    pub max_mismatches: usize,
    /// Maximum `N` columns tolerated within the overlap
    pub max_ambiguous: usize,
    /// Match/mismatch scores used to rank candidate overlap offsets
    pub scoring: AlignScoring,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            min_overlap: 12,
            max_mismatches: 0,
            max_ambiguous: 0,
            scoring: AlignScoring::default(),
        }
    }
}

impl MergeOptions {
    /// Validates option values.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.min_overlap, "min-overlap")
    }
}

/// One merged output sequence.
///
/// When several partition combinations produce byte-identical merged output,
/// their abundances accumulate onto a single record; the overlap fields and
/// partition back-references describe the first contributing combination in
/// (forward, reverse) partition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSequence {
    /// The merged sequence
    pub sequence: Vec<u8>,
    /// Total reads across contributing combinations
    pub abundance: u64,
    /// Length of the accepted overlap
    pub overlap_len: usize,
    /// Mismatch columns within the overlap
    pub mismatches: usize,
    /// `N` columns within the overlap
    pub ambiguous: usize,
    /// Index of the forward partition that produced this sequence
    pub forward_partition: usize,
    /// Index of the reverse partition that produced this sequence
    pub reverse_partition: usize,
}

/// The best-scoring placement of the reverse center against the forward
/// center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OverlapPlacement {
    offset: usize,
    overlap: usize,
    score: i32,
    mismatches: usize,
    ambiguous: usize,
}

/// Merges denoised pairs through their partition centers.
///
/// `links` must come from the same [`crate::derep::PairedDereplicator`] run
/// that produced the unique lists, and the partition sets from denoising
/// those lists. Returns merged sequences sorted abundance-descending (ties:
/// sequence ascending) together with the merge tallies.
#[allow(clippy::cast_precision_loss)]
pub fn merge_pairs(
    forward_uniques: &[UniqueSequence],
    forward_partitions: &PartitionSet,
    reverse_uniques: &[UniqueSequence],
    reverse_partitions: &PartitionSet,
    links: &[PairLink],
    options: &MergeOptions,
) -> Result<(Vec<MergedSequence>, MergeMetrics)> {
    options.validate()?;

    let mut metrics = MergeMetrics::new();

    // Collapse links onto partition combinations
    let mut combinations: AHashMap<(usize, usize), u64> = AHashMap::new();
    for link in links {
        let forward = forward_partitions.assignment()[link.forward];
        let reverse = reverse_partitions.assignment()[link.reverse];
        *combinations.entry((forward, reverse)).or_insert(0) += link.count;
        metrics.total_pairs += link.count;
    }
    let mut ordered: Vec<((usize, usize), u64)> = combinations.into_iter().collect();
    ordered.sort_unstable_by_key(|&(combo, _)| combo);

    let mut merged: AHashMap<Vec<u8>, MergedSequence> = AHashMap::new();

    for ((forward, reverse), count) in ordered {
        let forward_center =
            forward_uniques[forward_partitions.partitions()[forward].center()].sequence();
        let reverse_center =
            reverse_uniques[reverse_partitions.partitions()[reverse].center()].sequence();
        let reverse_rc = reverse_complement(reverse_center);

        let placement = match best_overlap(forward_center, &reverse_rc, options) {
            Some(placement) => placement,
            None => {
                metrics.rejected_no_overlap += count;
                continue;
            }
        };
        if placement.mismatches > options.max_mismatches {
            metrics.rejected_mismatches += count;
            continue;
        }
        if placement.ambiguous > options.max_ambiguous {
            metrics.rejected_ambiguous += count;
            continue;
        }

        let sequence = assemble(forward_center, &reverse_rc, placement.offset, placement.overlap);
        metrics.merged_pairs += count;

        match merged.get_mut(&sequence) {
            Some(existing) => existing.abundance += count,
            None => {
                merged.insert(
                    sequence.clone(),
                    MergedSequence {
                        sequence,
                        abundance: count,
                        overlap_len: placement.overlap,
                        mismatches: placement.mismatches,
                        ambiguous: placement.ambiguous,
                        forward_partition: forward,
                        reverse_partition: reverse,
                    },
                );
            }
        }
    }

    // Sequences are unique keys, so this sort is a total order
    let mut output: Vec<MergedSequence> = merged.into_values().collect();
    output.sort_unstable_by(|a, b| {
        b.abundance.cmp(&a.abundance).then_with(|| a.sequence.cmp(&b.sequence))
    });
    metrics.merged_sequences = output.len() as u64;

    if metrics.total_pairs > 0 && metrics.merged_pairs * 2 < metrics.total_pairs {
        warn!(
            "Merged only {} of {} read pairs ({:.1}%); check overlap and mismatch settings",
            metrics.merged_pairs,
            metrics.total_pairs,
            metrics.merged_pairs as f64 / metrics.total_pairs as f64 * 100.0
        );
    }

    Ok((output, metrics))
}

/// Scans every placement of the reverse-complemented center along the forward
/// center and returns the best-scoring one, preferring longer overlaps on
/// score ties. Returns `None` when no placement reaches `min_overlap`.
fn best_overlap(
    forward: &[u8],
    reverse_rc: &[u8],
    options: &MergeOptions,
) -> Option<OverlapPlacement> {
    let flen = forward.len();
    let rlen = reverse_rc.len();
    if flen < options.min_overlap || rlen < options.min_overlap {
        return None;
    }

    let mut best: Option<OverlapPlacement> = None;
    for offset in 0..=flen - options.min_overlap {
        let overlap = (flen - offset).min(rlen);
        let mut score = 0i32;
        let mut mismatches = 0;
        let mut ambiguous = 0;
        for j in 0..overlap {
            let f = forward[offset + j];
            let r = reverse_rc[j];
            if f == NO_CALL_BASE || r == NO_CALL_BASE {
                ambiguous += 1;
            } else if f == r {
                score += options.scoring.match_score;
            } else {
                score += options.scoring.mismatch;
                mismatches += 1;
            }
        }
        let candidate = OverlapPlacement { offset, overlap, score, mismatches, ambiguous };
        let better = match best {
            None => true,
            Some(current) => {
                candidate.score > current.score
                    || (candidate.score == current.score && candidate.overlap > current.overlap)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Builds the merged sequence for an accepted placement. Within the overlap
/// the forward base wins; an `N` defers to the other strand.
fn assemble(forward: &[u8], reverse_rc: &[u8], offset: usize, overlap: usize) -> Vec<u8> {
    let mut sequence = Vec::with_capacity(forward.len() + reverse_rc.len() - overlap);
    sequence.extend_from_slice(&forward[..offset]);
    for j in 0..overlap {
        let f = forward[offset + j];
        let r = reverse_rc[j];
        sequence.push(if f == NO_CALL_BASE { r } else { f });
    }
    if forward.len() - offset >= reverse_rc.len() {
        // Reverse contained in forward: the forward tail continues
        sequence.extend_from_slice(&forward[offset + overlap..]);
    } else {
        sequence.extend_from_slice(&reverse_rc[overlap..]);
    }
    sequence
}

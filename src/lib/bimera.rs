//! Two-parent chimera (bimera) detection.
//!
//! A PCR chimera is a sequence assembled from two real templates: a prefix
//! from one parent and a suffix from another, joined at a single breakpoint.
//! Detection walks candidates from most to least abundant so that parents are
//! always judged before anything they could have produced; flagged sequences
//! never vouch for later candidates. All comparisons are ungapped.

use clap::ValueEnum;

use crate::errors::{DenadaError, Result};
use crate::metrics::BimeraMetrics;
use crate::table::SequenceTable;
use crate::validation::{validate_fraction, validate_positive};

/// Tuning knobs for chimera detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BimeraOptions {
    /// Mismatch budget for the combined parent explanation
    pub max_mismatches: usize,
    /// Parents must be at least this many fold more abundant than the
    /// candidate
    pub min_fold: f64,
    /// Minimum parent abundance
    pub min_parent_abundance: u64,
    /// Consensus mode: flag a sequence when at least this fraction of the
    /// samples containing it flag it
    pub min_sample_fraction: f64,
}

impl Default for BimeraOptions {
    fn default() -> Self {
        Self {
            max_mismatches: 0,
            min_fold: 2.0,
            min_parent_abundance: 2,
            min_sample_fraction: 0.9,
        }
    }
}

impl BimeraOptions {
    /// Validates option values.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_fold >= 1.0 && self.min_fold.is_finite()) {
            return Err(DenadaError::InvalidParameter {
                parameter: "min-fold".to_string(),
                reason: format!("Must be at least 1, got: {}", self.min_fold),
            });
        }
        validate_positive(self.min_parent_abundance, "min-parent-abundance")?;
        validate_fraction(self.min_sample_fraction, "min-sample-fraction")?;
        Ok(())
    }
}

/// One sequence under scrutiny, borrowed from the caller's storage.
#[derive(Debug, Clone, Copy)]
pub struct BimeraCandidate<'a> {
    pub sequence: &'a [u8],
    pub abundance: u64,
}

/// Verdict for one candidate.
///
/// For chimeric calls, `parents` holds the (left, right) candidate indices,
/// `breakpoint` the prefix length taken from the left parent, and `score` the
/// abundance-fold evidence `min(ab(left), ab(right)) / ab(candidate)`.
/// Genuine calls carry no parent information.
#[derive(Debug, Clone, PartialEq)]
pub struct BimeraCall {
    /// Index of the candidate in the input order
    pub sequence: usize,
    pub chimeric: bool,
    pub parents: Option<(usize, usize)>,
    pub breakpoint: Option<usize>,
    pub score: f64,
}

impl BimeraCall {
    fn genuine(sequence: usize) -> Self {
        Self { sequence, chimeric: false, parents: None, breakpoint: None, score: 0.0 }
    }
}

/// Detection mode for [`remove_bimeras`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BimeraMode {
    /// Detect once over column totals pooled across samples
    Pooled,
    /// Detect per sample, then flag by majority vote
    Consensus,
}

/// Span invalid marker: the parent is shorter than the compared span.
const INVALID_SPAN: u32 = u32::MAX;

/// Cumulative mismatch arrays for one potential parent against the candidate.
struct ParentSpans {
    parent: usize,
    abundance: u64,
    /// `left[k]`: mismatches of candidate[0..k] vs the parent prefix
    left: Vec<u32>,
    /// `right[k]`: mismatches of candidate[k..] vs the parent suffix
    right: Vec<u32>,
}

/// The best per-breakpoint explanation from one side.
#[derive(Debug, Clone, Copy)]
struct SideBest {
    mismatches: u32,
    abundance: u64,
    parent: usize,
}

/// The winning parent pair for a candidate.
#[derive(Debug, Clone, Copy)]
struct PairChoice {
    total: u32,
    abundance_sum: u64,
    left: usize,
    left_abundance: u64,
    right: usize,
    right_abundance: u64,
    breakpoint: usize,
}

/// Classifies every candidate as genuine or chimeric.
///
/// Candidates are examined in abundance-descending order (ties: smaller
/// sequence first) regardless of input order; the returned calls are in input
/// order. Candidate sequences should be distinct.
pub fn find_bimeras(
    candidates: &[BimeraCandidate<'_>],
    options: &BimeraOptions,
) -> Result<Vec<BimeraCall>> {
    options.validate()?;

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_unstable_by(|&a, &b| {
        candidates[b]
            .abundance
            .cmp(&candidates[a].abundance)
            .then_with(|| candidates[a].sequence.cmp(candidates[b].sequence))
    });

    let mut accepted: Vec<usize> = Vec::new();
    let mut calls: Vec<BimeraCall> = Vec::with_capacity(candidates.len());

    for &index in &order {
        let call = classify(index, candidates, &accepted, options);
        if !call.chimeric {
            accepted.push(index);
        }
        calls.push(call);
    }

    calls.sort_unstable_by_key(|call| call.sequence);
    Ok(calls)
}

/// Judges one candidate against the accepted sequences so far.
#[allow(clippy::cast_precision_loss)]
fn classify(
    index: usize,
    candidates: &[BimeraCandidate<'_>],
    accepted: &[usize],
    options: &BimeraOptions,
) -> BimeraCall {
    let candidate = &candidates[index];
    let m = candidate.sequence.len();

    let parents: Vec<ParentSpans> = accepted
        .iter()
        .filter(|&&p| {
            let parent = &candidates[p];
            parent.abundance > candidate.abundance
                && parent.abundance as f64 >= options.min_fold * candidate.abundance as f64
                && parent.abundance >= options.min_parent_abundance
        })
        .map(|&p| parent_spans(candidate.sequence, candidates[p].sequence, p, candidates[p].abundance))
        .collect();

    if parents.len() < 2 || m < 2 {
        return BimeraCall::genuine(index);
    }

    let best_pair = match best_parent_pair(&parents, m) {
        Some(pair) => pair,
        None => return BimeraCall::genuine(index),
    };

    let budget = options.max_mismatches as u32;
    // A single parent that explains the whole candidate within the same
    // budget means a shared region, not a chimera
    let single_best = parents
        .iter()
        .flat_map(|spans| [spans.left[m], spans.right[0]])
        .min()
        .unwrap_or(INVALID_SPAN);

    if best_pair.total <= budget && single_best > budget {
        let score =
            best_pair.left_abundance.min(best_pair.right_abundance) as f64 / candidate.abundance as f64;
        BimeraCall {
            sequence: index,
            chimeric: true,
            parents: Some((best_pair.left, best_pair.right)),
            breakpoint: Some(best_pair.breakpoint),
            score,
        }
    } else {
        BimeraCall::genuine(index)
    }
}

/// Cumulative prefix/suffix mismatches of the candidate against one parent.
/// Spans longer than the parent are marked invalid.
fn parent_spans(candidate: &[u8], parent: &[u8], index: usize, abundance: u64) -> ParentSpans {
    let m = candidate.len();
    let plen = parent.len();
    let max_span = m.min(plen);

    let mut left = vec![INVALID_SPAN; m + 1];
    left[0] = 0;
    let mut mismatches = 0u32;
    for k in 1..=max_span {
        if candidate[k - 1] != parent[k - 1] {
            mismatches += 1;
        }
        left[k] = mismatches;
    }

    let mut right = vec![INVALID_SPAN; m + 1];
    right[m] = 0;
    let mut mismatches = 0u32;
    for span in 1..=max_span {
        if candidate[m - span] != parent[plen - span] {
            mismatches += 1;
        }
        right[m - span] = mismatches;
    }

    ParentSpans { parent: index, abundance, left, right }
}

/// Finds the best (left parent, right parent, breakpoint) combination:
/// fewest total mismatches, then higher combined parent abundance, then
/// smallest breakpoint. The two parents are always distinct.
fn best_parent_pair(parents: &[ParentSpans], m: usize) -> Option<PairChoice> {
    // Top two explanations per side and breakpoint, so a distinct pair is
    // always available when two parents cover a breakpoint
    let mut left_best: Vec<[Option<SideBest>; 2]> = vec![[None, None]; m + 1];
    let mut right_best: Vec<[Option<SideBest>; 2]> = vec![[None, None]; m + 1];
    for spans in parents {
        for k in 1..m {
            if spans.left[k] != INVALID_SPAN {
                push_top_two(
                    &mut left_best[k],
                    SideBest { mismatches: spans.left[k], abundance: spans.abundance, parent: spans.parent },
                );
            }
            if spans.right[k] != INVALID_SPAN {
                push_top_two(
                    &mut right_best[k],
                    SideBest { mismatches: spans.right[k], abundance: spans.abundance, parent: spans.parent },
                );
            }
        }
    }

    let mut best: Option<PairChoice> = None;
    for k in 1..m {
        for (li, ri) in [(0, 0), (0, 1), (1, 0)] {
            let (Some(left), Some(right)) = (left_best[k][li], right_best[k][ri]) else {
                continue;
            };
            if left.parent == right.parent {
                continue;
            }
            let candidate = PairChoice {
                total: left.mismatches + right.mismatches,
                abundance_sum: left.abundance + right.abundance,
                left: left.parent,
                left_abundance: left.abundance,
                right: right.parent,
                right_abundance: right.abundance,
                breakpoint: k,
            };
            let better = match best {
                None => true,
                Some(current) => {
                    candidate.total < current.total
                        || (candidate.total == current.total
                            && candidate.abundance_sum > current.abundance_sum)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Slots a value into a two-entry best list ordered by fewest mismatches,
/// then higher abundance, then lower parent index.
fn push_top_two(slots: &mut [Option<SideBest>; 2], value: SideBest) {
    let better = |a: SideBest, b: SideBest| {
        a.mismatches < b.mismatches
            || (a.mismatches == b.mismatches
                && (a.abundance > b.abundance
                    || (a.abundance == b.abundance && a.parent < b.parent)))
    };
    match slots[0] {
        None => slots[0] = Some(value),
        Some(first) if better(value, first) => {
            slots[1] = slots[0];
            slots[0] = Some(value);
        }
        Some(_) => match slots[1] {
            None => slots[1] = Some(value),
            Some(second) if better(value, second) => slots[1] = Some(value),
            Some(_) => {}
        },
    }
}

/// Detects and removes chimeric columns from a sequence table.
///
/// Pooled mode judges each column once on its pooled total; consensus mode
/// judges per sample and flags columns chimeric in at least
/// `min_sample_fraction` of the samples containing them. The filtered table
/// keeps the surviving columns in their original order.
#[allow(clippy::cast_precision_loss)]
pub fn remove_bimeras(
    table: &SequenceTable,
    options: &BimeraOptions,
    mode: BimeraMode,
) -> Result<(SequenceTable, Vec<BimeraCall>, BimeraMetrics)> {
    let calls = match mode {
        BimeraMode::Pooled => {
            let totals = table.column_totals();
            let candidates: Vec<BimeraCandidate<'_>> = table
                .sequences()
                .iter()
                .zip(&totals)
                .map(|(sequence, &abundance)| BimeraCandidate { sequence, abundance })
                .collect();
            find_bimeras(&candidates, options)?
        }
        BimeraMode::Consensus => consensus_calls(table, options)?,
    };

    let filtered = table.filter_sequences(|i, _| !calls[i].chimeric);

    let totals = table.column_totals();
    let mut metrics = BimeraMetrics::new();
    metrics.sequences_tested = table.num_sequences() as u64;
    metrics.total_reads = table.total();
    for call in &calls {
        if call.chimeric {
            metrics.chimeric_sequences += 1;
            metrics.reads_removed += totals[call.sequence];
        } else {
            metrics.genuine_sequences += 1;
        }
    }

    Ok((filtered, calls, metrics))
}

/// Per-sample detection followed by a fraction vote per column.
#[allow(clippy::cast_precision_loss)]
fn consensus_calls(table: &SequenceTable, options: &BimeraOptions) -> Result<Vec<BimeraCall>> {
    options.validate()?;
    let columns = table.num_sequences();
    let mut present_in = vec![0u64; columns];
    let mut flagged_in = vec![0u64; columns];
    let mut first_flag: Vec<Option<BimeraCall>> = vec![None; columns];

    for sample in 0..table.num_samples() {
        let row = table.row(sample);
        let member_columns: Vec<usize> = (0..columns).filter(|&c| row[c] > 0).collect();
        let candidates: Vec<BimeraCandidate<'_>> = member_columns
            .iter()
            .map(|&c| BimeraCandidate { sequence: &table.sequences()[c], abundance: row[c] })
            .collect();

        let sample_calls = find_bimeras(&candidates, options)?;
        for (local, call) in sample_calls.iter().enumerate() {
            let column = member_columns[local];
            present_in[column] += 1;
            if call.chimeric {
                flagged_in[column] += 1;
                if first_flag[column].is_none() {
                    first_flag[column] = Some(BimeraCall {
                        sequence: column,
                        chimeric: true,
                        parents: call
                            .parents
                            .map(|(l, r)| (member_columns[l], member_columns[r])),
                        breakpoint: call.breakpoint,
                        score: call.score,
                    });
                }
            }
        }
    }

    let calls = (0..columns)
        .map(|column| {
            let chimeric = present_in[column] > 0
                && flagged_in[column] as f64
                    >= options.min_sample_fraction * present_in[column] as f64;
            match (chimeric, first_flag[column].take()) {
                (true, Some(call)) => call,
                _ => BimeraCall::genuine(column),
            }
        })
        .collect();
    Ok(calls)
}

//! Divisive partitioning of unique sequences.
//!
//! Starting from a single partition seeded on the most abundant unique, the
//! engine alternates two moves until neither changes anything:
//!
//! 1. **Shuffle**: every unique joins the partition whose center explains it
//!    best (highest log-lambda under the current error model).
//! 2. **Bud**: the unique whose abundance is least explainable as error
//!    production from its center (smallest Poisson p-value) founds a new
//!    partition, provided that p-value clears the `omega` threshold.
//!
//! Singletons never bud and partition centers never leave their own
//! partition, so the loop adds at most one partition per unique and always
//! terminates. All scoring runs over frozen snapshots with deferred writes;
//! results are identical for any thread count.

use rayon::prelude::*;
use statrs::function::gamma::gamma_lr;

use crate::align::{align_transitions, AlignScoring, AlignmentCache};
use crate::derep::UniqueSequence;
use crate::model::ErrorModel;
use crate::phred::quality_bucket;

/// Tuning knobs for the partition engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionParams {
    /// Partition-forming significance threshold on the abundance p-value
    pub omega: f64,
    /// Alignment scoring used to build transition profiles
    pub scoring: AlignScoring,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self { omega: 1e-40, scoring: AlignScoring::default() }
    }
}

/// One unique sequence's standing within its partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionMember {
    /// Index into the unique list
    pub unique: usize,
    /// Log-lambda against the partition center
    pub ln_lambda: f64,
    /// Abundance p-value against the partition center; centers carry 1.0
    pub p_value: f64,
}

/// A partition: its center unique, its members, and its total read count.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    center: usize,
    members: Vec<PartitionMember>,
    reads: u64,
}

impl Partition {
    /// Index of the center unique (the most abundant member).
    #[must_use]
    pub fn center(&self) -> usize {
        self.center
    }

    /// Members in ascending unique-index order. Always includes the center.
    #[must_use]
    pub fn members(&self) -> &[PartitionMember] {
        &self.members
    }

    /// Total reads across all members.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of member uniques.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the partition has no members. Never true for output of
    /// [`partition_uniques`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The complete partitioning of a unique list.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
    assignment: Vec<usize>,
}

impl PartitionSet {
    /// The partitions, in founding order (partition 0 is the seed).
    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// For each unique index, the index of its partition.
    #[must_use]
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Number of partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// True when there are no partitions (empty input).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Total reads across all partitions.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.partitions.iter().map(Partition::reads).sum()
    }
}

/// P(X >= abundance | X >= 1) for X ~ Poisson(expected).
///
/// This is the chance that error production from a center, expected to yield
/// `expected` reads of this sequence, would yield at least the observed
/// abundance given that the sequence was seen at all. Singletons always
/// return 1.0: one read is consistent with any positive expectation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn abundance_p_value(abundance: u64, expected: f64) -> f64 {
    if abundance <= 1 {
        return 1.0;
    }
    if !(expected > 0.0) {
        // Expectation has underflowed to zero yet two or more reads exist
        return 0.0;
    }
    // P(X >= a) equals the regularized lower incomplete gamma P(a, e)
    let numerator = gamma_lr(abundance as f64, expected);
    let denominator = -(-expected).exp_m1();
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}

/// Partitions uniques under a fixed error model, returning the fixed point of
/// the shuffle/bud loop.
///
/// The cache carries transition profiles forward between calls; profiles
/// depend only on sequence pairs, so reusing them across model refits is
/// sound.
#[must_use]
pub fn partition_uniques(
    uniques: &[UniqueSequence],
    model: &ErrorModel,
    cache: &mut AlignmentCache,
    params: &PartitionParams,
) -> PartitionSet {
    let n = uniques.len();
    if n == 0 {
        return PartitionSet { partitions: Vec::new(), assignment: Vec::new() };
    }

    let bucketed: Vec<Vec<u8>> = uniques
        .iter()
        .map(|u| u.quals().iter().map(|&q| quality_bucket(q)).collect())
        .collect();

    let mut centers = vec![seed_index(uniques)];
    let mut assignment = vec![0usize; n];

    loop {
        let ln_lambdas = stabilize(uniques, &bucketed, model, cache, params, &mut centers, &mut assignment);
        let partitions = build_partitions(uniques, &assignment, &centers, &ln_lambdas);

        match select_bud(&partitions, uniques, params.omega) {
            Some(bud) => {
                assignment[bud] = centers.len();
                centers.push(bud);
            }
            None => {
                let set = PartitionSet { partitions, assignment };
                debug_assert_eq!(
                    set.total_reads(),
                    uniques.iter().map(UniqueSequence::abundance).sum::<u64>()
                );
                return set;
            }
        }
    }
}

/// Most abundant unique, ties to the lowest index.
fn seed_index(uniques: &[UniqueSequence]) -> usize {
    let mut seed = 0;
    for (i, unique) in uniques.iter().enumerate().skip(1) {
        if unique.abundance() > uniques[seed].abundance() {
            seed = i;
        }
    }
    seed
}

/// Runs shuffle passes and center recomputation to a fixed point for the
/// current set of centers, returning the final log-lambda table
/// (`ln_lambdas[unique][partition]`).
fn stabilize(
    uniques: &[UniqueSequence],
    bucketed: &[Vec<u8>],
    model: &ErrorModel,
    cache: &mut AlignmentCache,
    params: &PartitionParams,
    centers: &mut Vec<usize>,
    assignment: &mut [usize],
) -> Vec<Vec<f64>> {
    let n = uniques.len();
    loop {
        ensure_profiles(uniques, bucketed, centers, cache, &params.scoring);
        let ln_lambdas = lambda_table(n, centers, cache, model);

        // Shuffle to a fixed point against these centers. Each unique moving
        // strictly improves its own score, so this settles quickly; the cap
        // guards against oscillation from snapshot tie-breaks.
        for _ in 0..=n + 1 {
            if shuffle_pass(uniques, centers, &ln_lambdas, assignment) == 0 {
                break;
            }
        }

        let new_centers = recompute_centers(uniques, assignment, centers.len());
        if new_centers == *centers {
            return ln_lambdas;
        }
        *centers = new_centers;
    }
}

/// Computes and caches profiles for every (unique, center) pair not yet
/// cached. Misses are aligned in parallel; the ordered collect keeps the
/// merge deterministic.
#[allow(clippy::cast_possible_truncation)]
fn ensure_profiles(
    uniques: &[UniqueSequence],
    bucketed: &[Vec<u8>],
    centers: &[usize],
    cache: &mut AlignmentCache,
    scoring: &AlignScoring,
) {
    let mut missing = Vec::new();
    for i in 0..uniques.len() {
        for &c in centers {
            if !cache.contains(i as u32, c as u32) {
                missing.push((i as u32, c as u32));
            }
        }
    }

    let computed: Vec<_> = missing
        .into_par_iter()
        .map(|(i, c)| {
            let profile = align_transitions(
                uniques[i as usize].sequence(),
                &bucketed[i as usize],
                uniques[c as usize].sequence(),
                scoring,
            );
            ((i, c), profile)
        })
        .collect();

    cache.extend(computed);
}

#[allow(clippy::cast_possible_truncation)]
fn lambda_table(
    n: usize,
    centers: &[usize],
    cache: &AlignmentCache,
    model: &ErrorModel,
) -> Vec<Vec<f64>> {
    (0..n)
        .into_par_iter()
        .map(|i| {
            centers
                .iter()
                .map(|&c| {
                    let profile = cache
                        .get(i as u32, c as u32)
                        .expect("profile cached for every unique/center pair");
                    model.ln_lambda(profile)
                })
                .collect()
        })
        .collect()
}

/// One deferred-write shuffle pass: scores every unique against a frozen
/// read-count snapshot, then applies all moves at once. Returns the number of
/// uniques that changed partition.
fn shuffle_pass(
    uniques: &[UniqueSequence],
    centers: &[usize],
    ln_lambdas: &[Vec<f64>],
    assignment: &mut [usize],
) -> usize {
    let n = uniques.len();

    let mut reads = vec![0u64; centers.len()];
    for (i, &p) in assignment.iter().enumerate() {
        reads[p] += uniques[i].abundance();
    }

    // Centers are pinned to their own partitions
    let mut pinned = vec![usize::MAX; n];
    for (p, &c) in centers.iter().enumerate() {
        pinned[c] = p;
    }

    let best: Vec<usize> = (0..n)
        .into_par_iter()
        .map(|i| {
            if pinned[i] != usize::MAX {
                return pinned[i];
            }
            let mut best_p = 0;
            for p in 1..centers.len() {
                let ln = ln_lambdas[i][p];
                let best_ln = ln_lambdas[i][best_p];
                // Strict comparisons keep the lowest partition index on full
                // ties; equal lambdas prefer the larger partition.
                if ln > best_ln || (ln == best_ln && reads[p] > reads[best_p]) {
                    best_p = p;
                }
            }
            best_p
        })
        .collect();

    let mut changed = 0;
    for (slot, new_p) in assignment.iter_mut().zip(best) {
        if *slot != new_p {
            *slot = new_p;
            changed += 1;
        }
    }
    changed
}

/// Most abundant member of each partition, ties to the lowest unique index.
fn recompute_centers(
    uniques: &[UniqueSequence],
    assignment: &[usize],
    num_partitions: usize,
) -> Vec<usize> {
    let mut centers = vec![usize::MAX; num_partitions];
    for (i, &p) in assignment.iter().enumerate() {
        let current = centers[p];
        if current == usize::MAX || uniques[i].abundance() > uniques[current].abundance() {
            centers[p] = i;
        }
    }
    centers
}

/// Groups members by partition and computes each member's abundance p-value
/// against its center.
#[allow(clippy::cast_precision_loss)]
fn build_partitions(
    uniques: &[UniqueSequence],
    assignment: &[usize],
    centers: &[usize],
    ln_lambdas: &[Vec<f64>],
) -> Vec<Partition> {
    let mut reads = vec![0u64; centers.len()];
    for (i, &p) in assignment.iter().enumerate() {
        reads[p] += uniques[i].abundance();
    }

    let mut partitions: Vec<Partition> = centers
        .iter()
        .zip(&reads)
        .map(|(&center, &reads)| Partition { center, members: Vec::new(), reads })
        .collect();

    for (i, &p) in assignment.iter().enumerate() {
        let ln_lambda = ln_lambdas[i][p];
        let p_value = if i == partitions[p].center {
            1.0
        } else {
            // exp is deferred until after adding the read-count log so a
            // deeply negative lambda cannot underflow prematurely
            let expected = (ln_lambda + (partitions[p].reads as f64).ln()).exp();
            abundance_p_value(uniques[i].abundance(), expected)
        };
        partitions[p].members.push(PartitionMember { unique: i, ln_lambda, p_value });
    }

    partitions
}

/// The most significant non-center unique, if it clears `omega`: smallest
/// p-value, ties to higher abundance, then lower unique index.
fn select_bud(partitions: &[Partition], uniques: &[UniqueSequence], omega: f64) -> Option<usize> {
    let mut best: Option<(f64, u64, usize)> = None;

    for partition in partitions {
        for member in partition.members() {
            if member.unique == partition.center() {
                continue;
            }
            let abundance = uniques[member.unique].abundance();
            let better = match best {
                None => true,
                Some((best_p, best_ab, best_idx)) => {
                    member.p_value < best_p
                        || (member.p_value == best_p
                            && (abundance > best_ab
                                || (abundance == best_ab && member.unique < best_idx)))
                }
            };
            if better {
                best = Some((member.p_value, abundance, member.unique));
            }
        }
    }

    best.filter(|&(p_value, _, _)| p_value < omega).map(|(_, _, unique)| unique)
}

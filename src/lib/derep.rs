//! Dereplication: collapsing raw reads into unique sequences.
//!
//! Denoising operates on unique sequences, each carrying the number of reads
//! that collapsed into it and a per-position quality profile averaged over
//! those reads. This module provides the accumulators that build them, for
//! single reads and for read pairs.
//!
//! Output ordering is always abundance descending with ties broken by the
//! sequence itself, so downstream stages see a deterministic arrangement
//! regardless of input order or hash-map internals.

use ahash::AHashMap;

use crate::dna::normalize_base;
use crate::errors::{DenadaError, Result};

/// A unique sequence with its read count and averaged quality profile.
///
/// Invariants enforced at construction: the sequence is non-empty and drawn
/// from {A,C,G,T,N}, the abundance is at least 1, and the quality profile has
/// one entry per base.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueSequence {
    sequence: Vec<u8>,
    abundance: u64,
    quals: Vec<f64>,
}

impl UniqueSequence {
    /// Creates a unique sequence, normalizing bases to uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`DenadaError::InvalidSequence`] for an empty sequence, a zero
    /// abundance, a quality profile of the wrong length, or a base outside
    /// {A,C,G,T,N}.
    pub fn new(sequence: &[u8], abundance: u64, quals: Vec<f64>) -> Result<Self> {
        if abundance == 0 {
            return Err(DenadaError::InvalidSequence {
                reason: "abundance must be at least 1".to_string(),
            });
        }
        if quals.len() != sequence.len() {
            return Err(DenadaError::InvalidSequence {
                reason: format!(
                    "quality profile length ({}) does not match sequence length ({})",
                    quals.len(),
                    sequence.len()
                ),
            });
        }
        let sequence = validate_bases(sequence)?;
        Ok(Self { sequence, abundance, quals })
    }

    /// Creates a unique sequence with every position at the same quality.
    pub fn with_uniform_quality(sequence: &[u8], abundance: u64, quality: u8) -> Result<Self> {
        let quals = vec![f64::from(quality); sequence.len()];
        Self::new(sequence, abundance, quals)
    }

    /// The sequence bases (uppercase {A,C,G,T,N}).
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Number of reads that collapsed into this sequence.
    #[must_use]
    pub fn abundance(&self) -> u64 {
        self.abundance
    }

    /// Mean quality per position across the collapsed reads.
    #[must_use]
    pub fn quals(&self) -> &[f64] {
        &self.quals
    }

    /// Sequence length in bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True when the sequence has no bases. Never true for a validated value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Normalizes a read to uppercase {A,C,G,T,N}, rejecting anything else.
fn validate_bases(seq: &[u8]) -> Result<Vec<u8>> {
    if seq.is_empty() {
        return Err(DenadaError::InvalidSequence { reason: "empty sequence".to_string() });
    }
    seq.iter()
        .enumerate()
        .map(|(i, &base)| {
            normalize_base(base).ok_or_else(|| DenadaError::InvalidSequence {
                reason: format!("unsupported base '{}' at position {i}", base as char),
            })
        })
        .collect()
}

/// Per-sequence accumulator state.
#[derive(Debug, Clone)]
struct SeqData {
    count: u64,
    qual_sums: Vec<f64>,
}

impl SeqData {
    fn new(len: usize) -> Self {
        Self { count: 0, qual_sums: vec![0.0; len] }
    }

    fn add(&mut self, quals: &[u8]) {
        self.count += 1;
        for (sum, &q) in self.qual_sums.iter_mut().zip(quals) {
            *sum += f64::from(q);
        }
    }
}

/// Converts an accumulation map into the canonical sorted unique list.
fn into_sorted_uniques(map: AHashMap<Vec<u8>, SeqData>) -> Vec<UniqueSequence> {
    let mut uniques: Vec<UniqueSequence> = map
        .into_iter()
        .map(|(sequence, data)| {
            let n = data.count as f64;
            let quals = data.qual_sums.iter().map(|&s| s / n).collect();
            UniqueSequence { sequence, abundance: data.count, quals }
        })
        .collect();
    uniques
        .sort_by(|a, b| b.abundance.cmp(&a.abundance).then_with(|| a.sequence.cmp(&b.sequence)));
    uniques
}

/// Streaming dereplicator for single-end reads.
///
/// # Example
///
/// ```
/// use denada_lib::derep::Dereplicator;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut derep = Dereplicator::new();
/// derep.add(b"ACGT", &[30, 30, 30, 30])?;
/// derep.add(b"ACGT", &[40, 40, 40, 40])?;
/// derep.add(b"TTTT", &[35, 35, 35, 35])?;
///
/// let uniques = derep.finish();
/// assert_eq!(uniques.len(), 2);
/// assert_eq!(uniques[0].sequence(), b"ACGT");
/// assert_eq!(uniques[0].abundance(), 2);
/// assert_eq!(uniques[0].quals()[0], 35.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Dereplicator {
    counts: AHashMap<Vec<u8>, SeqData>,
    total_reads: u64,
}

impl Dereplicator {
    /// Creates an empty dereplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one read with its per-base Phred qualities (not ASCII encoded).
    ///
    /// # Errors
    ///
    /// Returns [`DenadaError::InvalidSequence`] for empty reads, reads with
    /// bases outside {A,C,G,T,N}, or a quality string of the wrong length.
    pub fn add(&mut self, seq: &[u8], quals: &[u8]) -> Result<()> {
        if quals.len() != seq.len() {
            return Err(DenadaError::InvalidSequence {
                reason: format!(
                    "quality length ({}) does not match sequence length ({})",
                    quals.len(),
                    seq.len()
                ),
            });
        }
        let normalized = validate_bases(seq)?;
        let len = normalized.len();
        self.counts.entry(normalized).or_insert_with(|| SeqData::new(len)).add(quals);
        self.total_reads += 1;
        Ok(())
    }

    /// Total reads added so far.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.total_reads
    }

    /// Number of distinct sequences seen so far.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.counts.len()
    }

    /// Finalizes into unique sequences, abundance descending then sequence
    /// ascending.
    #[must_use]
    pub fn finish(self) -> Vec<UniqueSequence> {
        into_sorted_uniques(self.counts)
    }
}

/// Pools finished unique lists from several samples into one combined list.
///
/// Shared sequences have their abundances summed and their per-position mean
/// qualities combined as abundance-weighted means. The result is ordered like
/// [`Dereplicator::finish`].
#[must_use]
pub fn pool_uniques(samples: &[Vec<UniqueSequence>]) -> Vec<UniqueSequence> {
    let mut acc: AHashMap<Vec<u8>, SeqData> = AHashMap::new();
    for uniques in samples {
        for unique in uniques {
            let entry =
                acc.entry(unique.sequence().to_vec()).or_insert_with(|| SeqData::new(unique.len()));
            entry.count += unique.abundance();
            let weight = unique.abundance() as f64;
            for (sum, &q) in entry.qual_sums.iter_mut().zip(unique.quals()) {
                *sum += q * weight;
            }
        }
    }
    into_sorted_uniques(acc)
}

/// A dereplicated read-pair combination: which forward unique and which
/// reverse unique it collapsed into, and how many read pairs did so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairLink {
    /// Index into the forward unique list
    pub forward: usize,
    /// Index into the reverse unique list
    pub reverse: usize,
    /// Number of read pairs with this combination
    pub count: u64,
}

/// The output of paired dereplication: two unique lists plus the links
/// connecting them.
#[derive(Debug, Clone)]
pub struct PairedUniques {
    /// Unique forward sequences, abundance descending
    pub forward: Vec<UniqueSequence>,
    /// Unique reverse sequences, abundance descending
    pub reverse: Vec<UniqueSequence>,
    /// Pair combinations, sorted by (forward, reverse) index
    pub links: Vec<PairLink>,
}

/// Pair accumulator state.
#[derive(Debug, Clone)]
struct PairData {
    count: u64,
    forward_qual_sums: Vec<f64>,
    reverse_qual_sums: Vec<f64>,
}

/// Streaming dereplicator for read pairs.
///
/// Forward and reverse reads are dereplicated independently (so each side can
/// be denoised on its own), while the links record which combinations of
/// forward and reverse uniques occurred and how often. The merger consumes
/// the links after denoising.
#[derive(Debug, Default)]
pub struct PairedDereplicator {
    pairs: AHashMap<(Vec<u8>, Vec<u8>), PairData>,
    total_pairs: u64,
}

impl PairedDereplicator {
    /// Creates an empty paired dereplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one read pair with per-base Phred qualities (not ASCII encoded).
    ///
    /// # Errors
    ///
    /// Returns [`DenadaError::InvalidSequence`] if either read fails the same
    /// checks as [`Dereplicator::add`].
    pub fn add(
        &mut self,
        fwd_seq: &[u8],
        fwd_quals: &[u8],
        rev_seq: &[u8],
        rev_quals: &[u8],
    ) -> Result<()> {
        if fwd_quals.len() != fwd_seq.len() || rev_quals.len() != rev_seq.len() {
            return Err(DenadaError::InvalidSequence {
                reason: "quality length does not match sequence length".to_string(),
            });
        }
        let fwd = validate_bases(fwd_seq)?;
        let rev = validate_bases(rev_seq)?;

        let entry = self.pairs.entry((fwd, rev)).or_insert_with(|| PairData {
            count: 0,
            forward_qual_sums: vec![0.0; fwd_seq.len()],
            reverse_qual_sums: vec![0.0; rev_seq.len()],
        });
        entry.count += 1;
        for (sum, &q) in entry.forward_qual_sums.iter_mut().zip(fwd_quals) {
            *sum += f64::from(q);
        }
        for (sum, &q) in entry.reverse_qual_sums.iter_mut().zip(rev_quals) {
            *sum += f64::from(q);
        }
        self.total_pairs += 1;
        Ok(())
    }

    /// Total read pairs added so far.
    #[must_use]
    pub fn total_pairs(&self) -> u64 {
        self.total_pairs
    }

    /// Finalizes into forward and reverse unique lists plus pair links.
    #[must_use]
    pub fn finish(self) -> PairedUniques {
        let mut forward_acc: AHashMap<Vec<u8>, SeqData> = AHashMap::new();
        let mut reverse_acc: AHashMap<Vec<u8>, SeqData> = AHashMap::new();

        for ((fseq, rseq), data) in &self.pairs {
            let fwd = forward_acc
                .entry(fseq.clone())
                .or_insert_with(|| SeqData::new(fseq.len()));
            fwd.count += data.count;
            for (sum, &s) in fwd.qual_sums.iter_mut().zip(&data.forward_qual_sums) {
                *sum += s;
            }
            let rev = reverse_acc
                .entry(rseq.clone())
                .or_insert_with(|| SeqData::new(rseq.len()));
            rev.count += data.count;
            for (sum, &s) in rev.qual_sums.iter_mut().zip(&data.reverse_qual_sums) {
                *sum += s;
            }
        }

        let forward = into_sorted_uniques(forward_acc);
        let reverse = into_sorted_uniques(reverse_acc);

        let forward_index: AHashMap<&[u8], usize> =
            forward.iter().enumerate().map(|(i, u)| (u.sequence(), i)).collect();
        let reverse_index: AHashMap<&[u8], usize> =
            reverse.iter().enumerate().map(|(i, u)| (u.sequence(), i)).collect();

        let mut links: Vec<PairLink> = self
            .pairs
            .iter()
            .map(|((fseq, rseq), data)| PairLink {
                forward: forward_index[fseq.as_slice()],
                reverse: reverse_index[rseq.as_slice()],
                count: data.count,
            })
            .collect();
        links.sort_by_key(|link| (link.forward, link.reverse));

        PairedUniques { forward, reverse, links }
    }
}

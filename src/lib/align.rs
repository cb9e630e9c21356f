//! Banded global alignment between unique sequences and partition centers.
//!
//! The error model only cares about which substitutions an alignment implies,
//! so the aligner returns a [`TransitionProfile`]: one `(ref, obs, quality)`
//! triple per aligned column. Columns with a gap on either side and columns
//! containing an N are excluded.
//!
//! Alignment is the hot inner loop of partitioning. Two things keep it cheap:
//! a band around the diagonal (amplicon reads of the same locus rarely need
//! more than a few indels), and the identity fast path, since most uniques
//! differ from their center by substitutions only at equal length. Profiles
//! depend only on the sequence pair, never on the current error rates, so
//! they are cached across model refits.

use ahash::AHashMap;

use crate::dna::base_index;

/// Scoring parameters for the banded global aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignScoring {
    /// Score for matching bases
    pub match_score: i32,
    /// Penalty for mismatching bases
    pub mismatch: i32,
    /// Penalty per gap position
    pub gap: i32,
    /// Band half-width around the diagonal; 0 disables banding
    pub band: usize,
}

impl Default for AlignScoring {
    fn default() -> Self {
        Self { match_score: 5, mismatch: -4, gap: -8, band: 16 }
    }
}

/// One aligned column: the center base, the observed base, and the observed
/// base's quality bucket. Base values are indices into [`crate::dna::BASES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub ref_index: u8,
    pub obs_index: u8,
    pub quality: u8,
}

/// The substitution transitions implied by one pairwise alignment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionProfile {
    transitions: Vec<Transition>,
}

impl TransitionProfile {
    /// The aligned columns in left-to-right order.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Number of scored columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// True when no column was scored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Number of columns where the observed base differs from the center.
    #[must_use]
    pub fn mismatches(&self) -> usize {
        self.transitions.iter().filter(|t| t.ref_index != t.obs_index).count()
    }
}

// Traceback codes
const TB_DIAG: u8 = 0;
const TB_UP: u8 = 1; // gap in target, query base consumed
const TB_LEFT: u8 = 2; // gap in query, target base consumed

/// Out-of-band sentinel. Half of `i32::MIN` leaves headroom for adding gap
/// penalties without overflow.
const NEG_SCORE: i32 = i32::MIN / 2;

fn substitution_score(query_base: u8, target_base: u8, scoring: &AlignScoring) -> i32 {
    match (base_index(query_base), base_index(target_base)) {
        (Some(q), Some(t)) if q == t => scoring.match_score,
        (Some(_), Some(_)) => scoring.mismatch,
        // N columns are neutral
        _ => 0,
    }
}

/// Aligns `query` (with one quality bucket per base) against `target` and
/// returns the substitution transitions of the best global alignment.
///
/// Ties in the dynamic program are broken in a fixed order (diagonal, then
/// gap-in-target, then gap-in-query), so the result is deterministic for a
/// given input pair.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn align_transitions(
    query: &[u8],
    query_quals: &[u8],
    target: &[u8],
    scoring: &AlignScoring,
) -> TransitionProfile {
    debug_assert_eq!(query.len(), query_quals.len());

    // Identity fast path, no DP needed
    if query == target {
        let transitions = query
            .iter()
            .zip(query_quals)
            .filter_map(|(&base, &quality)| {
                base_index(base).map(|idx| Transition {
                    ref_index: idx as u8,
                    obs_index: idx as u8,
                    quality,
                })
            })
            .collect();
        return TransitionProfile { transitions };
    }

    let qlen = query.len();
    let tlen = target.len();
    let cols = tlen + 1;

    // Widen the band by the length difference so the end corner stays
    // reachable.
    let band = if scoring.band == 0 { None } else { Some(scoring.band + qlen.abs_diff(tlen)) };

    let mut scores = vec![NEG_SCORE; (qlen + 1) * cols];
    let mut trace = vec![TB_DIAG; (qlen + 1) * cols];
    scores[0] = 0;

    let edge = band.unwrap_or(usize::MAX);
    for i in 1..=qlen.min(edge) {
        scores[i * cols] = i as i32 * scoring.gap;
        trace[i * cols] = TB_UP;
    }
    for j in 1..=tlen.min(edge) {
        scores[j] = j as i32 * scoring.gap;
        trace[j] = TB_LEFT;
    }

    for i in 1..=qlen {
        let (lo, hi) = match band {
            Some(w) => (1.max(i.saturating_sub(w)), tlen.min(i + w)),
            None => (1, tlen),
        };
        for j in lo..=hi {
            let diag = scores[(i - 1) * cols + (j - 1)]
                + substitution_score(query[i - 1], target[j - 1], scoring);
            let up = scores[(i - 1) * cols + j] + scoring.gap;
            let left = scores[i * cols + (j - 1)] + scoring.gap;

            let mut best = diag;
            let mut code = TB_DIAG;
            if up > best {
                best = up;
                code = TB_UP;
            }
            if left > best {
                best = left;
                code = TB_LEFT;
            }
            scores[i * cols + j] = best;
            trace[i * cols + j] = code;
        }
    }

    // Every cell on the optimal path is inside the band, so the traceback
    // only visits initialized codes.
    let mut transitions = Vec::with_capacity(qlen.min(tlen));
    let (mut i, mut j) = (qlen, tlen);
    while i > 0 || j > 0 {
        match trace[i * cols + j] {
            TB_UP => i -= 1,
            TB_LEFT => j -= 1,
            _ => {
                i -= 1;
                j -= 1;
                if let (Some(r), Some(o)) = (base_index(target[j]), base_index(query[i])) {
                    transitions.push(Transition {
                        ref_index: r as u8,
                        obs_index: o as u8,
                        quality: query_quals[i],
                    });
                }
            }
        }
    }
    transitions.reverse();

    TransitionProfile { transitions }
}

/// Cache of transition profiles keyed by `(query unique, center unique)`
/// index pairs.
///
/// Partition scoring runs in parallel over a frozen cache; misses are
/// computed off to the side and merged back in one batch so iteration order
/// never influences the contents.
#[derive(Debug, Default)]
pub struct AlignmentCache {
    entries: AHashMap<(u32, u32), TransitionProfile>,
}

impl AlignmentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the profile for a `(query, target)` pair.
    #[must_use]
    pub fn get(&self, query: u32, target: u32) -> Option<&TransitionProfile> {
        self.entries.get(&(query, target))
    }

    /// True when the pair is already cached.
    #[must_use]
    pub fn contains(&self, query: u32, target: u32) -> bool {
        self.entries.contains_key(&(query, target))
    }

    /// Inserts one profile.
    pub fn insert(&mut self, query: u32, target: u32, profile: TransitionProfile) {
        self.entries.insert((query, target), profile);
    }

    /// Merges a batch of freshly computed profiles.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = ((u32, u32), TransitionProfile)>) {
        self.entries.extend(batch);
    }

    /// Number of cached profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

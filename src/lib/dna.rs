//! DNA sequence utilities.
//!
//! This module provides the base alphabet, index encodings used by the error
//! model, complement/reverse-complement operations, and input normalization.

/// The four canonical bases, in the index order used throughout the crate.
pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// No-call base character
pub const NO_CALL_BASE: u8 = b'N';

/// Sentinel in [`BASE_TO_INDEX`] for bytes that are not canonical bases.
pub const NO_BASE_INDEX: u8 = u8::MAX;

/// Lookup table mapping base characters (upper or lower case) to indices 0-3.
///
/// `N` and every other byte map to [`NO_BASE_INDEX`].
pub static BASE_TO_INDEX: [u8; 256] = {
    let mut table = [NO_BASE_INDEX; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table
};

/// Returns the 0-3 index of a canonical base, or `None` for anything else.
///
/// # Examples
///
/// ```
/// use denada_lib::dna::base_index;
///
/// assert_eq!(base_index(b'A'), Some(0));
/// assert_eq!(base_index(b't'), Some(3));
/// assert_eq!(base_index(b'N'), None);
/// ```
#[inline]
#[must_use]
pub fn base_index(base: u8) -> Option<usize> {
    let idx = BASE_TO_INDEX[base as usize];
    if idx == NO_BASE_INDEX { None } else { Some(idx as usize) }
}

/// Complements a single DNA base, normalizing to uppercase.
///
/// Returns the Watson-Crick complement: A<->T, C<->G. `N` and any other
/// non-base byte are returned unchanged.
#[inline]
#[must_use]
pub const fn complement_base(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'T' | b't' => b'A',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        _ => base,
    }
}

/// Reverse complements a DNA sequence.
///
/// Returns the reverse complement of the input sequence, normalizing to
/// uppercase. A<->T, C<->G, N and other bases are unchanged.
///
/// # Examples
///
/// ```
/// use denada_lib::dna::reverse_complement;
///
/// assert_eq!(reverse_complement(b"ACGT"), b"ACGT".to_vec());
/// assert_eq!(reverse_complement(b"AAAA"), b"TTTT".to_vec());
/// assert_eq!(reverse_complement(b"ACGTN"), b"NACGT".to_vec());
/// ```
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&base| complement_base(base)).collect()
}

/// Normalizes a base to uppercase if it belongs to the {A,C,G,T,N} alphabet.
///
/// Returns `None` for IUPAC ambiguity codes and any other byte; callers treat
/// that as malformed input rather than silently masking it.
///
/// # Examples
///
/// ```
/// use denada_lib::dna::normalize_base;
///
/// assert_eq!(normalize_base(b'a'), Some(b'A'));
/// assert_eq!(normalize_base(b'N'), Some(b'N'));
/// assert_eq!(normalize_base(b'R'), None);
/// ```
#[inline]
#[must_use]
pub fn normalize_base(base: u8) -> Option<u8> {
    match base {
        b'A' | b'a' => Some(b'A'),
        b'C' | b'c' => Some(b'C'),
        b'G' | b'g' => Some(b'G'),
        b'T' | b't' => Some(b'T'),
        b'N' | b'n' => Some(NO_CALL_BASE),
        _ => None,
    }
}

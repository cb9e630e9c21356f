//! Phred score utilities and probability calculations.
//!
//! This module provides conversions between Phred quality scores and error
//! probabilities, in both linear and natural-log space. The error model keys
//! its substitution rates by integer quality bucket, so the helpers here also
//! map averaged (fractional) qualities onto buckets.
//!
//! Key reference for the stable `ln(1 - e^x)` computation:
//! - Equation (7) from <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>

use std::f64::consts::LN_10;

/// Natural log of 2, the threshold in the stable `ln(1 - e^x)` split
const LN_TWO: f64 = std::f64::consts::LN_2;

/// Minimum Phred score used when converting priors to probabilities (Q2).
///
/// Clamping here keeps every prior probability strictly inside (0, 1): a raw
/// Q0 would make the error probability exactly 1 and the match probability 0.
pub const MIN_PHRED: u8 = 2;

/// Maximum Phred score we handle (Q93, matching `SAMUtils.MAX_PHRED_SCORE`)
pub const MAX_PHRED: u8 = 93;

/// ASCII offset for Phred+33 (Sanger) encoded FASTQ quality strings
pub const PHRED_ASCII_OFFSET: u8 = 33;

/// Phred score type
pub type PhredScore = u8;

/// Log probability type (natural log)
pub type LogProbability = f64;

/// Converts a Phred score to a linear probability of error.
///
/// Phred score Q relates to error probability P by: Q = -10 * log10(P)
/// So: P = 10^(-Q/10)
///
/// # Examples
/// ```
/// use denada_lib::phred::phred_to_error_prob;
///
/// // Q10 corresponds to a 10% error rate
/// assert!((phred_to_error_prob(10) - 0.1).abs() < 1e-12);
///
/// // Q20 corresponds to a 1% error rate
/// assert!((phred_to_error_prob(20) - 0.01).abs() < 1e-12);
/// ```
#[inline]
#[must_use]
pub fn phred_to_error_prob(phred: PhredScore) -> f64 {
    phred_to_ln_error_prob(phred).exp()
}

/// Converts a Phred score to a log probability of error.
///
/// ln(P) = ln(10^(-Q/10)) = -Q * ln(10) / 10
///
/// # Examples
/// ```
/// use denada_lib::phred::phred_to_ln_error_prob;
///
/// let ln_error = phred_to_ln_error_prob(30);
/// assert!((ln_error - 0.001_f64.ln()).abs() < 1e-10);
/// ```
#[inline]
#[must_use]
pub fn phred_to_ln_error_prob(phred: PhredScore) -> LogProbability {
    -f64::from(phred) * LN_10 / 10.0
}

/// Computes ln(1 - e^x) for x < 0 in a numerically stable way.
///
/// For x >= -ln(2): use ln(-expm1(x)) to avoid catastrophic cancellation when
/// e^x is close to 1. For x < -ln(2): use ln1p(-exp(x)), which is stable when
/// e^x is small. Non-negative x (a probability of 1 or more) maps to -inf.
///
/// # Examples
/// ```
/// use denada_lib::phred::ln_one_minus_exp;
///
/// // ln(1 - 0.1) = ln(0.9)
/// let result = ln_one_minus_exp(0.1_f64.ln());
/// assert!((result - 0.9_f64.ln()).abs() < 1e-12);
/// ```
#[inline]
#[must_use]
pub fn ln_one_minus_exp(x: LogProbability) -> LogProbability {
    if x >= 0.0 {
        f64::NEG_INFINITY
    } else if x >= -LN_TWO {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// Maps an averaged (possibly fractional) quality onto an integer bucket.
///
/// Dereplication averages the qualities of collapsed duplicate reads, so a
/// unique sequence carries `f64` qualities; the error model is keyed by the
/// nearest integer score, clamped to `[0, MAX_PHRED]`.
///
/// # Examples
/// ```
/// use denada_lib::phred::quality_bucket;
///
/// assert_eq!(quality_bucket(34.6), 35);
/// assert_eq!(quality_bucket(34.4), 34);
/// assert_eq!(quality_bucket(120.0), 93);
/// assert_eq!(quality_bucket(-1.0), 0);
/// ```
#[inline]
#[must_use]
pub fn quality_bucket(mean_quality: f64) -> PhredScore {
    mean_quality.round().clamp(0.0, f64::from(MAX_PHRED)) as PhredScore
}

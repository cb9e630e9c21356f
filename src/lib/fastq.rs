//! FASTQ input and FASTA output for amplicon reads.
//!
//! Readers stream records straight into a dereplicator rather than collecting
//! them, so memory scales with the number of unique sequences instead of the
//! number of reads. Files ending in `.gz` are decompressed transparently.
//!
//! Qualities are expected in Phred+33 encoding; any quality character outside
//! the printable range is treated as a malformed file, not clamped.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::Io;
use seq_io::fastq::{Reader as FastqReader, Record};

use crate::derep::{Dereplicator, PairedDereplicator};
use crate::errors::DenadaError;
use crate::phred::PHRED_ASCII_OFFSET;
use crate::progress::ProgressTracker;

/// Buffer size for file readers and writers.
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Largest valid Phred+33 quality character (Q93).
const MAX_QUALITY_CHAR: u8 = 126;

/// Opens a FASTQ file for streaming, decompressing `.gz` inputs.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_fastq_reader<P: AsRef<Path>>(path: P) -> Result<FastqReader<Box<dyn BufRead + Send>>> {
    let path = path.as_ref();
    let io = Io::new(5, BUFFER_SIZE);
    let reader = io
        .new_reader(path)
        .with_context(|| format!("Failed to open FASTQ file: {}", path.display()))?;
    Ok(FastqReader::with_capacity(reader, BUFFER_SIZE))
}

/// Decodes an ASCII quality string to raw Phred scores.
fn decode_quality_scores(ascii: &[u8]) -> std::result::Result<Vec<u8>, DenadaError> {
    ascii
        .iter()
        .map(|&ch| {
            if (PHRED_ASCII_OFFSET..=MAX_QUALITY_CHAR).contains(&ch) {
                Ok(ch - PHRED_ASCII_OFFSET)
            } else {
                Err(DenadaError::InvalidSequence {
                    reason: format!(
                        "quality character 0x{ch:02x} outside the Phred+33 printable range"
                    ),
                })
            }
        })
        .collect()
}

fn record_context(head: &[u8], path: &Path) -> String {
    format!("Invalid record '{}' in {}", String::from_utf8_lossy(head), path.display())
}

/// Streams one FASTQ file into a dereplicator, returning the record count.
///
/// # Errors
///
/// Returns an error for unreadable files, malformed FASTQ records, bases
/// outside {A,C,G,T,N}, or quality characters outside the Phred+33 range.
pub fn read_into_dereplicator<P: AsRef<Path>>(
    path: P,
    derep: &mut Dereplicator,
    tracker: &ProgressTracker,
) -> Result<u64> {
    let path = path.as_ref();
    let mut reader = open_fastq_reader(path)?;
    let mut records = 0u64;

    while let Some(result) = reader.next() {
        let record =
            result.with_context(|| format!("Failed to parse FASTQ file: {}", path.display()))?;
        let quals = decode_quality_scores(record.qual())
            .with_context(|| record_context(record.head(), path))?;
        derep
            .add(record.seq(), &quals)
            .with_context(|| record_context(record.head(), path))?;
        records += 1;
        tracker.record(1);
    }

    Ok(records)
}

/// Outcome of pulling one record from each side of a pair of readers.
enum PairStep {
    Both,
    ForwardExtra,
    ReverseExtra,
    Done,
}

fn drain_count(reader: &mut FastqReader<Box<dyn BufRead + Send>>) -> u64 {
    let mut extra = 0;
    while let Some(Ok(_)) = reader.next() {
        extra += 1;
    }
    extra
}

/// Streams two FASTQ files in lockstep into a paired dereplicator, returning
/// the pair count.
///
/// Records are paired purely by position; read names are not compared.
///
/// # Errors
///
/// Returns [`DenadaError::PairCountMismatch`] if the files hold different
/// numbers of records, plus the same per-record errors as
/// [`read_into_dereplicator`].
pub fn read_pairs_into_dereplicator<P: AsRef<Path>>(
    forward: P,
    reverse: P,
    derep: &mut PairedDereplicator,
    tracker: &ProgressTracker,
) -> Result<u64> {
    let fwd_path = forward.as_ref();
    let rev_path = reverse.as_ref();
    let mut fwd_reader = open_fastq_reader(fwd_path)?;
    let mut rev_reader = open_fastq_reader(rev_path)?;
    let mut pairs = 0u64;

    loop {
        let step = match (fwd_reader.next(), rev_reader.next()) {
            (None, None) => PairStep::Done,
            (Some(_), None) => PairStep::ForwardExtra,
            (None, Some(_)) => PairStep::ReverseExtra,
            (Some(fwd), Some(rev)) => {
                let fwd = fwd.with_context(|| {
                    format!("Failed to parse FASTQ file: {}", fwd_path.display())
                })?;
                let rev = rev.with_context(|| {
                    format!("Failed to parse FASTQ file: {}", rev_path.display())
                })?;
                let fwd_quals = decode_quality_scores(fwd.qual())
                    .with_context(|| record_context(fwd.head(), fwd_path))?;
                let rev_quals = decode_quality_scores(rev.qual())
                    .with_context(|| record_context(rev.head(), rev_path))?;
                derep
                    .add(fwd.seq(), &fwd_quals, rev.seq(), &rev_quals)
                    .with_context(|| record_context(fwd.head(), fwd_path))?;
                pairs += 1;
                tracker.record(1);
                PairStep::Both
            }
        };

        match step {
            PairStep::Both => {}
            PairStep::Done => break,
            PairStep::ForwardExtra => {
                let forward_total = pairs + 1 + drain_count(&mut fwd_reader);
                return Err(DenadaError::PairCountMismatch {
                    forward: forward_total,
                    reverse: pairs,
                }
                .into());
            }
            PairStep::ReverseExtra => {
                let reverse_total = pairs + 1 + drain_count(&mut rev_reader);
                return Err(DenadaError::PairCountMismatch {
                    forward: pairs,
                    reverse: reverse_total,
                }
                .into());
            }
        }
    }

    Ok(pairs)
}

/// Writes sequences to FASTA with `>asv<N>;size=<abundance>` headers.
///
/// The `;size=` annotation is the convention downstream chimera and taxonomy
/// tools expect. Sequences are numbered from 1 in iteration order, so callers
/// should pass them already sorted.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_asv_fasta<'a, P, I>(path: P, records: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a [u8], u64)>,
{
    let path = path.as_ref();
    let io = Io::new(5, BUFFER_SIZE);
    let mut writer = io
        .new_writer(path)
        .with_context(|| format!("Failed to create FASTA file: {}", path.display()))?;

    for (i, (sequence, abundance)) in records.into_iter().enumerate() {
        writeln!(writer, ">asv{};size={abundance}", i + 1)?;
        writer.write_all(sequence)?;
        writer.write_all(b"\n")?;
    }

    writer.flush().with_context(|| format!("Failed to write FASTA file: {}", path.display()))?;
    Ok(())
}

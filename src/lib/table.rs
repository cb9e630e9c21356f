//! Sample-by-sequence count tables.
//!
//! The table is the final product of a denoising run: one row per sample, one
//! column per inferred sequence, counts in the cells. Columns are ordered by
//! total abundance (descending, ties by sequence) when the table is built;
//! filtering preserves whatever order the table already has.

use std::fmt::Write as _;
use std::path::Path;

use ahash::AHashMap;
use anyhow::Context;
use fgoxide::io::Io;

use crate::dna::normalize_base;
use crate::errors::{DenadaError, Result};
use crate::fastq::BUFFER_SIZE;

/// A sample x sequence count matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTable {
    sample_names: Vec<String>,
    sequences: Vec<Vec<u8>>,
    counts: Vec<Vec<u64>>,
}

/// Accumulates per-sample sequence counts into a [`SequenceTable`].
#[derive(Debug, Default)]
pub struct SequenceTableBuilder {
    samples: Vec<(String, AHashMap<Vec<u8>, u64>)>,
}

impl SequenceTableBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample's sequences with their abundances. Repeated sequences
    /// within a sample accumulate. Sample names must be unique.
    pub fn add_sample<I>(&mut self, name: &str, sequences: I) -> Result<()>
    where
        I: IntoIterator<Item = (Vec<u8>, u64)>,
    {
        if self.samples.iter().any(|(existing, _)| existing == name) {
            return Err(DenadaError::InvalidParameter {
                parameter: "sample".to_string(),
                reason: format!("Duplicate sample name: {name}"),
            });
        }
        let mut counts: AHashMap<Vec<u8>, u64> = AHashMap::new();
        for (sequence, abundance) in sequences {
            *counts.entry(sequence).or_insert(0) += abundance;
        }
        self.samples.push((name.to_string(), counts));
        Ok(())
    }

    /// Builds the table. Rows keep sample insertion order; columns are the
    /// union of all sequences, ordered by total abundance descending with the
    /// sequence itself as the tie-break.
    #[must_use]
    pub fn build(self) -> SequenceTable {
        let mut totals: AHashMap<&[u8], u64> = AHashMap::new();
        for (_, counts) in &self.samples {
            for (sequence, &count) in counts {
                *totals.entry(sequence.as_slice()).or_insert(0) += count;
            }
        }

        let mut ordered: Vec<(&[u8], u64)> = totals.into_iter().collect();
        ordered.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let sequences: Vec<Vec<u8>> = ordered.into_iter().map(|(seq, _)| seq.to_vec()).collect();

        let mut sample_names = Vec::with_capacity(self.samples.len());
        let mut counts = Vec::with_capacity(self.samples.len());
        for (name, sample_counts) in &self.samples {
            sample_names.push(name.clone());
            counts.push(
                sequences
                    .iter()
                    .map(|seq| sample_counts.get(seq).copied().unwrap_or(0))
                    .collect(),
            );
        }

        SequenceTable { sample_names, sequences, counts }
    }
}

impl SequenceTable {
    /// Sample names in row order.
    #[must_use]
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Sequences in column order.
    #[must_use]
    pub fn sequences(&self) -> &[Vec<u8>] {
        &self.sequences
    }

    /// Number of samples (rows).
    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.sample_names.len()
    }

    /// Number of sequences (columns).
    #[must_use]
    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Count for one sample/sequence cell.
    #[must_use]
    pub fn count(&self, sample: usize, sequence: usize) -> u64 {
        self.counts[sample][sequence]
    }

    /// One sample's counts across all columns.
    #[must_use]
    pub fn row(&self, sample: usize) -> &[u64] {
        &self.counts[sample]
    }

    /// Total count per column, across samples.
    #[must_use]
    pub fn column_totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.sequences.len()];
        for row in &self.counts {
            for (total, &count) in totals.iter_mut().zip(row) {
                *total += count;
            }
        }
        totals
    }

    /// Total count per sample row.
    #[must_use]
    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Grand total across the whole table.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Returns a new table keeping only the columns the predicate approves,
    /// in their current order. Rows are never dropped.
    #[must_use]
    pub fn filter_sequences<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize, &[u8]) -> bool,
    {
        let kept: Vec<usize> =
            (0..self.sequences.len()).filter(|&i| keep(i, &self.sequences[i])).collect();

        let sequences = kept.iter().map(|&i| self.sequences[i].clone()).collect();
        let counts = self
            .counts
            .iter()
            .map(|row| kept.iter().map(|&i| row[i]).collect())
            .collect();

        Self { sample_names: self.sample_names.clone(), sequences, counts }
    }

    /// Writes the table as TSV: a `sample` header followed by one column per
    /// sequence, then one row of counts per sample.
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let io = Io::new(5, BUFFER_SIZE);
        let mut lines = Vec::with_capacity(self.sample_names.len() + 1);

        let mut header = String::from("sample");
        for sequence in &self.sequences {
            header.push('\t');
            header.push_str(std::str::from_utf8(sequence).unwrap_or(""));
        }
        lines.push(header);

        for (name, row) in self.sample_names.iter().zip(&self.counts) {
            let mut line = name.clone();
            for count in row {
                let _ = write!(line, "\t{count}");
            }
            lines.push(line);
        }

        io.write_lines(&path, lines)
            .with_context(|| format!("Failed to write sequence table: {}", path.display()))
    }

    /// Reads a table written by [`SequenceTable::write_tsv`]. Column order is
    /// taken from the file as-is.
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let io = Io::new(5, BUFFER_SIZE);
        let lines: Vec<String> = io
            .read_lines(&path)
            .with_context(|| format!("Failed to read sequence table: {}", path.display()))?;

        let format_error = |reason: String| DenadaError::InvalidFileFormat {
            file_type: "Sequence table".to_string(),
            path: path.display().to_string(),
            reason,
        };

        let header = lines.first().ok_or_else(|| format_error("Missing header line".to_string()))?;
        let mut header_fields = header.split('\t');
        let first = header_fields.next().unwrap_or("");
        if first != "sample" {
            return Err(format_error(format!(
                "Expected header to start with 'sample', found '{first}'"
            ))
            .into());
        }

        let mut sequences = Vec::new();
        for field in header_fields {
            let sequence: Vec<u8> = field
                .bytes()
                .map(|b| {
                    normalize_base(b).ok_or_else(|| {
                        format_error(format!("Invalid base {:?} in column header", char::from(b)))
                    })
                })
                .collect::<std::result::Result<_, _>>()?;
            if sequence.is_empty() {
                return Err(format_error("Empty sequence column header".to_string()).into());
            }
            sequences.push(sequence);
        }

        let mut sample_names = Vec::new();
        let mut counts = Vec::new();
        for (line_number, line) in lines.iter().enumerate().skip(1) {
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or("");
            if name.is_empty() {
                return Err(
                    format_error(format!("Line {}: missing sample name", line_number + 1)).into()
                );
            }
            let row: Vec<u64> = fields
                .map(|field| {
                    field.parse::<u64>().map_err(|_| {
                        format_error(format!("Line {}: invalid count '{field}'", line_number + 1))
                    })
                })
                .collect::<std::result::Result<_, _>>()?;
            if row.len() != sequences.len() {
                return Err(format_error(format!(
                    "Line {}: expected {} counts, found {}",
                    line_number + 1,
                    sequences.len(),
                    row.len()
                ))
                .into());
            }
            sample_names.push(name.to_string());
            counts.push(row);
        }

        Ok(Self { sample_names, sequences, counts })
    }
}

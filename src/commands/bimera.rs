//! Flag and remove bimeric sequences from a sequence table.
//!
//! Reads a sequence table produced by denoise or merge, classifies every
//! sequence against its more-abundant peers, and writes the table back with
//! the chimeric columns removed.

use anyhow::Result;
use clap::Parser;
use denada_lib::bimera::{BimeraCall, BimeraMode, BimeraOptions, remove_bimeras};
use denada_lib::logging::{OperationTimer, log_bimera_summary};
use denada_lib::metrics::{BimeraCallRow, write_metrics_auto};
use denada_lib::table::SequenceTable;
use denada_lib::validation::validate_file_exists;
use log::info;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::MetricsOptions;

/// Flag and remove bimeric sequences from a sequence table.
#[derive(Debug, Parser)]
#[command(
    name = "bimera",
    about = "\x1b[38;5;166m[FILTERING]\x1b[0m      \x1b[36mRemove bimeric sequences from a sequence table\x1b[0m",
    long_about = r#"
Flag and remove bimeric (two-parent chimeric) sequences from a sequence table.

A bimera is a PCR artifact assembled from two genuine templates: a prefix
from one parent and a suffix from another, joined at a single breakpoint.
A sequence is flagged when two more-abundant sequences together explain it
within the mismatch budget and no single sequence does.

Pooled mode (the default) detects once over abundances pooled across
samples. Consensus mode detects within each sample and flags a sequence
when a sufficient fraction of the samples containing it agree.

EXAMPLES:

  # Remove bimeras over pooled abundances
  denada bimera -i table.tsv -o filtered.tsv

  # Per-sample consensus detection, keeping the calls and the tallies
  denada bimera -i table.tsv -o filtered.tsv --mode consensus \
      --calls calls.tsv -m bimera_metrics.tsv

  # Allow one mismatch in the combined parent explanation
  denada bimera -i table.tsv -o filtered.tsv --max-mismatches 1
"#
)]
pub struct Bimera {
    /// Input sequence table TSV
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output TSV for the filtered table
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Detection mode
    #[arg(long = "mode", value_enum, default_value_t = BimeraMode::Pooled)]
    pub mode: BimeraMode,

    /// Optional TSV output of per-sequence calls
    #[arg(short = 'c', long = "calls")]
    pub calls: Option<PathBuf>,

    /// Mismatch budget for the combined parent explanation
    #[arg(long = "max-mismatches", default_value = "0")]
    pub max_mismatches: usize,

    /// Parents must be at least this many fold more abundant than the candidate
    #[arg(long = "min-fold", default_value = "2.0")]
    pub min_fold: f64,

    /// Minimum parent abundance
    #[arg(long = "min-parent-abundance", default_value = "2")]
    pub min_parent_abundance: u64,

    /// Consensus mode: flag a sequence when at least this fraction of the
    /// samples containing it flag it
    #[arg(long = "min-sample-fraction", default_value = "0.9")]
    pub min_sample_fraction: f64,

    /// Metrics output options
    #[command(flatten)]
    pub metrics: MetricsOptions,
}

/// Expands detection calls into serializable rows against the input table.
fn call_rows(table: &SequenceTable, calls: &[BimeraCall]) -> Vec<BimeraCallRow> {
    let totals = table.column_totals();
    let sequence_str =
        |column: usize| String::from_utf8_lossy(&table.sequences()[column]).into_owned();
    calls
        .iter()
        .map(|call| BimeraCallRow {
            sequence: sequence_str(call.sequence),
            total_abundance: totals[call.sequence],
            chimeric: call.chimeric,
            breakpoint: call.breakpoint,
            score: call.score,
            left_parent: call.parents.map(|(left, _)| sequence_str(left)),
            right_parent: call.parents.map(|(_, right)| sequence_str(right)),
        })
        .collect()
}

impl Command for Bimera {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input sequence table")?;
        let options = BimeraOptions {
            max_mismatches: self.max_mismatches,
            min_fold: self.min_fold,
            min_parent_abundance: self.min_parent_abundance,
            min_sample_fraction: self.min_sample_fraction,
        };
        options.validate()?;

        let timer = OperationTimer::new("Removing bimeras");
        let mode_name = match self.mode {
            BimeraMode::Pooled => "pooled",
            BimeraMode::Consensus => "consensus",
        };
        info!("Input table: {}", self.input.display());
        info!("Output table: {}", self.output.display());
        info!("Mode: {mode_name}");

        let table = SequenceTable::read_tsv(&self.input)?;
        info!(
            "Read sequence table ({} samples x {} sequences, {} reads)",
            table.num_samples(),
            table.num_sequences(),
            table.total()
        );

        let (filtered, calls, metrics) = remove_bimeras(&table, &options, self.mode)?;

        filtered.write_tsv(&self.output)?;
        info!(
            "Wrote filtered table ({} samples x {} sequences): {}",
            filtered.num_samples(),
            filtered.num_sequences(),
            self.output.display()
        );

        if let Some(path) = &self.calls {
            write_metrics_auto(path, &call_rows(&table, &calls))?;
            info!("Wrote per-sequence calls: {}", path.display());
        }

        log_bimera_summary(&metrics);
        if let Some(path) = &self.metrics.metrics {
            write_metrics_auto(path, std::slice::from_ref(&metrics))?;
            info!("Wrote bimera metrics: {}", path.display());
        }

        timer.log_completion(metrics.sequences_tested);
        Ok(())
    }
}

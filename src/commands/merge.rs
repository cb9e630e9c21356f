//! Denoise paired-end amplicon reads and merge overlapping partners.
//!
//! Forward and reverse reads are dereplicated together so that pair links
//! survive, each direction is denoised independently, and partition centers
//! are then merged across the read overlap.

use anyhow::{Result, bail};
use clap::Parser;
use denada_lib::denoise::denoise;
use denada_lib::derep::PairedDereplicator;
use denada_lib::fastq::read_pairs_into_dereplicator;
use denada_lib::logging::{OperationTimer, log_merge_summary};
use denada_lib::merge::{MergeOptions, merge_pairs};
use denada_lib::metrics::{MergeMetrics, write_metrics_auto};
use denada_lib::progress::ProgressTracker;
use denada_lib::table::SequenceTableBuilder;
use denada_lib::validation::validate_files_exist;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::commands::command::Command;
use crate::commands::common::{
    AlignmentOptions, DenoisingOptions, MetricsOptions, ThreadingOptions, pair_sample_name,
};

/// Denoise paired-end amplicon reads and merge the overlapping partners.
#[derive(Debug, Parser)]
#[command(
    name = "merge",
    about = "\x1b[38;5;72m[DENOISING]\x1b[0m      \x1b[36mDenoise paired-end reads and merge overlapping partners\x1b[0m",
    long_about = r#"
Denoise paired-end amplicon reads and merge the overlapping partners.

Each --read-one/--read-two file pair is one sample. Pairs are dereplicated
with their pairing preserved, each read direction is denoised on its own,
and the denoised partner sequences are merged across their overlap. Pairs
whose partners fail to overlap cleanly are dropped and tallied.

Outputs a sample-by-sequence count table of merged sequences.

EXAMPLES:

  # Merge one sample
  denada merge -1 s1_R1.fastq.gz -2 s1_R2.fastq.gz -o table.tsv

  # Merge two samples and keep the merge tallies
  denada merge -1 a_R1.fq.gz b_R1.fq.gz -2 a_R2.fq.gz b_R2.fq.gz \
      -o table.tsv -m merge_metrics.tsv

  # Tolerate two mismatches in overlaps of at least 20 bases
  denada merge -1 s1_R1.fq -2 s1_R2.fq -o table.tsv --min-overlap 20 --max-mismatches 2
"#
)]
pub struct Merge {
    /// Read-one (forward) FASTQ files, one per sample
    #[arg(short = '1', long = "read-one", required = true, num_args = 1..)]
    pub read_one: Vec<PathBuf>,

    /// Read-two (reverse) FASTQ files, parallel to --read-one
    #[arg(short = '2', long = "read-two", required = true, num_args = 1..)]
    pub read_two: Vec<PathBuf>,

    /// Output sequence table TSV
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Sample names matching the file pairs (default: read-one file stems)
    #[arg(short = 's', long = "sample-names", num_args = 1..)]
    pub sample_names: Vec<String>,

    /// Minimum overlap between the forward read and the reverse complement of
    /// the reverse read
    #[arg(long = "min-overlap", default_value = "12")]
    pub min_overlap: usize,

    /// Maximum mismatching columns tolerated in the overlap
    #[arg(long = "max-mismatches", default_value = "0")]
    pub max_mismatches: usize,

    /// Maximum ambiguous (N) columns tolerated in the overlap
    #[arg(long = "max-ambiguous", default_value = "0")]
    pub max_ambiguous: usize,

    /// Metrics output options
    #[command(flatten)]
    pub metrics: MetricsOptions,

    /// Denoising model options
    #[command(flatten)]
    pub denoising: DenoisingOptions,

    /// Alignment scoring options
    #[command(flatten)]
    pub alignment: AlignmentOptions,

    /// Threading options
    #[command(flatten)]
    pub threading: ThreadingOptions,
}

/// Adds one sample's merge tallies onto the running totals.
fn accumulate(totals: &mut MergeMetrics, sample: &MergeMetrics) {
    totals.total_pairs += sample.total_pairs;
    totals.merged_pairs += sample.merged_pairs;
    totals.rejected_no_overlap += sample.rejected_no_overlap;
    totals.rejected_mismatches += sample.rejected_mismatches;
    totals.rejected_ambiguous += sample.rejected_ambiguous;
    totals.merged_sequences += sample.merged_sequences;
}

impl Command for Merge {
    fn execute(&self, _command_line: &str) -> Result<()> {
        if self.read_one.len() != self.read_two.len() {
            bail!(
                "--read-one lists {} files but --read-two lists {}",
                self.read_one.len(),
                self.read_two.len()
            );
        }
        let mut files: Vec<(&Path, &str)> =
            self.read_one.iter().map(|path| (path.as_path(), "Read-one FASTQ")).collect();
        files.extend(self.read_two.iter().map(|path| (path.as_path(), "Read-two FASTQ")));
        validate_files_exist(&files)?;
        if !self.sample_names.is_empty() && self.sample_names.len() != self.read_one.len() {
            bail!(
                "--sample-names lists {} names for {} file pairs",
                self.sample_names.len(),
                self.read_one.len()
            );
        }
        self.alignment.validate()?;
        self.denoising.validate()?;
        self.threading.initialize()?;

        let merge_options = MergeOptions {
            min_overlap: self.min_overlap,
            max_mismatches: self.max_mismatches,
            max_ambiguous: self.max_ambiguous,
            scoring: self.alignment.to_scoring(),
        };
        merge_options.validate()?;
        let denoise_options = self.denoising.to_options(self.alignment.to_scoring());

        let timer = OperationTimer::new("Merging read pairs");
        info!("Input samples: {}", self.read_one.len());
        info!("Output table: {}", self.output.display());
        info!("Minimum overlap: {} bases", self.min_overlap);
        info!("{}", self.threading.log_message());

        let mut names: Vec<String> = Vec::with_capacity(self.read_one.len());
        let mut builder = SequenceTableBuilder::new();
        let mut totals = MergeMetrics::new();

        for (index, (fwd_path, rev_path)) in
            self.read_one.iter().zip(&self.read_two).enumerate()
        {
            let name = match self.sample_names.get(index) {
                Some(name) => name.clone(),
                None => pair_sample_name(fwd_path),
            };
            if names.contains(&name) {
                bail!("Duplicate sample name: {name}");
            }

            let tracker =
                ProgressTracker::new(format!("Read {name} pairs")).with_interval(1_000_000);
            let mut derep = PairedDereplicator::new();
            let pairs = read_pairs_into_dereplicator(fwd_path, rev_path, &mut derep, &tracker)?;
            tracker.log_final();
            let paired = derep.finish();
            info!(
                "Sample {name}: {pairs} pairs, {} forward / {} reverse unique sequences",
                paired.forward.len(),
                paired.reverse.len()
            );

            if paired.forward.is_empty() {
                warn!("Sample {name} has no read pairs; its table row will be all zeros");
                builder.add_sample(&name, std::iter::empty::<(Vec<u8>, u64)>())?;
                names.push(name);
                continue;
            }

            info!("Denoising {name} forward reads");
            let fwd_fit = denoise(&paired.forward, &denoise_options)?;
            info!("Denoising {name} reverse reads");
            let rev_fit = denoise(&paired.reverse, &denoise_options)?;

            let (merged, sample_metrics) = merge_pairs(
                &paired.forward,
                &fwd_fit.partitions,
                &paired.reverse,
                &rev_fit.partitions,
                &paired.links,
                &merge_options,
            )?;
            info!(
                "Sample {name}: merged {} of {} pairs into {} sequences",
                sample_metrics.merged_pairs, sample_metrics.total_pairs, sample_metrics.merged_sequences
            );

            builder.add_sample(
                &name,
                merged.iter().map(|record| (record.sequence.clone(), record.abundance)),
            )?;
            accumulate(&mut totals, &sample_metrics);
            names.push(name);
        }

        let table = builder.build();
        table.write_tsv(&self.output)?;
        info!(
            "Wrote sequence table ({} samples x {} sequences): {}",
            table.num_samples(),
            table.num_sequences(),
            self.output.display()
        );

        log_merge_summary(&totals);
        if let Some(path) = &self.metrics.metrics {
            write_metrics_auto(path, std::slice::from_ref(&totals))?;
            info!("Wrote merge metrics: {}", path.display());
        }

        timer.log_completion(totals.total_pairs);
        Ok(())
    }
}

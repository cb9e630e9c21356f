//! Denoise single-end amplicon reads into exact sequence variants.
//!
//! This tool dereplicates each input FASTQ, learns a quality-conditional
//! error model by self-consistency over the pooled reads, partitions each
//! sample under the frozen model, and writes the resulting sequence table.

use anyhow::{Result, bail};
use clap::Parser;
use denada_lib::align::AlignmentCache;
use denada_lib::denoise::{denoise, denoised_sequences};
use denada_lib::derep::{Dereplicator, UniqueSequence, pool_uniques};
use denada_lib::fastq::{read_into_dereplicator, write_asv_fasta};
use denada_lib::logging::{OperationTimer, log_denoise_summary};
use denada_lib::metrics::{DenoiseMetrics, write_metrics_auto};
use denada_lib::partition::{PartitionParams, PartitionSet, partition_uniques};
use denada_lib::progress::ProgressTracker;
use denada_lib::table::SequenceTableBuilder;
use denada_lib::validation::validate_files_exist;
use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::commands::command::Command;
use crate::commands::common::{
    AlignmentOptions, DenoisingOptions, MetricsOptions, ThreadingOptions, sample_name_from_path,
};

/// Denoise single-end amplicon reads into exact sequence variants.
#[derive(Debug, Parser)]
#[command(
    name = "denoise",
    about = "\x1b[38;5;72m[DENOISING]\x1b[0m      \x1b[36mDenoise amplicon reads into sequence variants\x1b[0m",
    long_about = r#"
Denoise single-end amplicon reads into exact sequence variants.

Each input FASTQ is one sample. Reads are dereplicated per sample, a
quality-conditional error model is learned by self-consistency over the
pooled reads, and each sample is then partitioned under the frozen model.
Partition centers become the denoised sequences.

Outputs a sample-by-sequence count table. Optionally writes per-sample ASV
FASTAs (with ;size= abundance annotations), the fitted error rates, and
per-sample run metrics.

EXAMPLES:

  # Denoise two samples and write a sequence table
  denada denoise -i s1.fastq.gz s2.fastq.gz -o table.tsv

  # Also write ASV FASTAs and the fitted error model
  denada denoise -i s1.fastq.gz -o table.tsv --fasta asvs.fasta --error-rates rates.tsv

  # Cap the worker pool and tighten the partition threshold
  denada denoise -i s1.fastq.gz -o table.tsv --threads 8 --omega 1e-60
"#
)]
pub struct Denoise {
    /// Input FASTQ files, one per sample (gzipped or plain)
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Output sequence table TSV
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Sample names matching the input files (default: file stems)
    #[arg(short = 's', long = "sample-names", num_args = 1..)]
    pub sample_names: Vec<String>,

    /// Optional FASTA output of denoised sequences; with multiple samples the
    /// sample name is inserted before the extension
    #[arg(short = 'f', long = "fasta")]
    pub fasta: Option<PathBuf>,

    /// Optional TSV output of the fitted per-quality error rates
    #[arg(short = 'e', long = "error-rates")]
    pub error_rates: Option<PathBuf>,

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

/// Inserts a sample name in front of a path's final extension, so that one
/// `--fasta` argument can fan out to per-sample files.
fn sample_output_path(base: &Path, sample: &str) -> PathBuf {
    match base.extension() {
        Some(ext) => base.with_extension(format!("{sample}.{}", ext.to_string_lossy())),
        None => base.with_extension(sample),
    }
}

impl Command for Denoise {
    fn execute(&self, _command_line: &str) -> Result<()> {
        let files: Vec<(&Path, &str)> =
            self.input.iter().map(|path| (path.as_path(), "Input FASTQ")).collect();
        validate_files_exist(&files)?;
        if !self.sample_names.is_empty() && self.sample_names.len() != self.input.len() {
            bail!(
                "--sample-names lists {} names for {} input files",
                self.sample_names.len(),
                self.input.len()
            );
        }
        self.alignment.validate()?;
        self.denoising.validate()?;
        self.threading.initialize()?;

        let timer = OperationTimer::new("Denoising reads");
        info!("Input samples: {}", self.input.len());
        info!("Output table: {}", self.output.display());
        info!("{}", self.threading.log_message());

        let options = self.denoising.to_options(self.alignment.to_scoring());

        // Dereplicate each sample
        let mut names: Vec<String> = Vec::with_capacity(self.input.len());
        let mut reads_per_sample: Vec<u64> = Vec::with_capacity(self.input.len());
        let mut uniques_per_sample: Vec<Vec<UniqueSequence>> =
            Vec::with_capacity(self.input.len());
        for (index, path) in self.input.iter().enumerate() {
            let name = match self.sample_names.get(index) {
                Some(name) => name.clone(),
                None => sample_name_from_path(path),
            };
            if names.contains(&name) {
                bail!("Duplicate sample name: {name}");
            }
            let tracker = ProgressTracker::new(format!("Read {name}")).with_interval(1_000_000);
            let mut derep = Dereplicator::new();
            let reads = read_into_dereplicator(path, &mut derep, &tracker)?;
            tracker.log_final();
            let uniques = derep.finish();
            info!("Sample {name}: {reads} reads, {} unique sequences", uniques.len());
            names.push(name);
            reads_per_sample.push(reads);
            uniques_per_sample.push(uniques);
        }

        // Learn the error model on the pooled reads
        let pooled = pool_uniques(&uniques_per_sample);
        if pooled.is_empty() {
            bail!("No reads found in any input FASTQ");
        }
        info!("Learning error model from {} pooled unique sequences", pooled.len());
        let fit = denoise(&pooled, &options)?;
        let model = fit.model;
        let diagnostics = fit.diagnostics;

        // Partition each sample under the frozen model
        let params = PartitionParams { omega: options.omega, scoring: options.scoring };
        let partitioned: Vec<PartitionSet> = uniques_per_sample
            .par_iter()
            .map(|uniques| {
                let mut cache = AlignmentCache::new();
                partition_uniques(uniques, &model, &mut cache, &params)
            })
            .collect();

        let denoised: Vec<Vec<(Vec<u8>, u64)>> = uniques_per_sample
            .iter()
            .zip(&partitioned)
            .map(|(uniques, partitions)| denoised_sequences(uniques, partitions))
            .collect();

        // Sequence table
        let mut builder = SequenceTableBuilder::new();
        for (name, sequences) in names.iter().zip(&denoised) {
            builder.add_sample(name, sequences.iter().cloned())?;
        }
        let table = builder.build();
        table.write_tsv(&self.output)?;
        info!(
            "Wrote sequence table ({} samples x {} sequences): {}",
            table.num_samples(),
            table.num_sequences(),
            self.output.display()
        );

        // Per-sample ASV FASTAs
        if let Some(base) = &self.fasta {
            for (name, sequences) in names.iter().zip(&denoised) {
                let path =
                    if names.len() == 1 { base.clone() } else { sample_output_path(base, name) };
                write_asv_fasta(&path, sequences.iter().map(|(seq, n)| (seq.as_slice(), *n)))?;
                info!("Wrote {} sequences for {name}: {}", sequences.len(), path.display());
            }
        }

        if let Some(path) = &self.error_rates {
            write_metrics_auto(path, &model.to_metric_rows())?;
            info!("Wrote error-model rates: {}", path.display());
        }

        // Per-sample metrics and summaries
        let mut rows = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let row = DenoiseMetrics {
                sample: name.clone(),
                total_reads: reads_per_sample[index],
                unique_sequences: uniques_per_sample[index].len() as u64,
                partitions: partitioned[index].len() as u64,
                iterations: diagnostics.iterations as u64,
                converged: diagnostics.converged,
                final_error_delta: diagnostics.final_error_delta,
                reassigned_fraction: diagnostics.reassigned_fraction,
            };
            log_denoise_summary(&row);
            rows.push(row);
        }
        if let Some(path) = &self.metrics.metrics {
            write_metrics_auto(path, &rows)?;
            info!("Wrote denoise metrics: {}", path.display());
        }

        timer.log_completion(reads_per_sample.iter().sum());
        Ok(())
    }
}

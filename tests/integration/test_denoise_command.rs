//! Integration tests for the denoise command.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{
    flip_base, metric_field, read_fasta, read_metric_rows, read_table, synthetic_sequence,
    write_fastq,
};

#[test]
fn test_denoise_two_variants_with_error_shadow() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("gut.fastq");
    let table = temp_dir.path().join("table.tsv");
    let fasta = temp_dir.path().join("asvs.fasta");
    let rates = temp_dir.path().join("rates.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    // Two distant variants plus a one-mismatch shadow of the first; the
    // shadow's reads must be absorbed into the variant's count.
    let variant_a = synthetic_sequence(60, 1);
    let variant_b = synthetic_sequence(60, 2);
    let mut shadow = variant_a.clone();
    shadow[17] = flip_base(shadow[17]);

    write_fastq(&input, &[(&variant_a, 600), (&variant_b, 500), (&shadow, 3)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "denoise",
            "-i",
            input.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-f",
            fasta.to_str().unwrap(),
            "-e",
            rates.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run denoise command");
    assert!(
        output.status.success(),
        "Denoise command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Table: columns abundance-descending, shadow absorbed into variant A
    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), variant_a.as_slice());
    assert_eq!(sequences[1].as_bytes(), variant_b.as_slice());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "gut");
    assert_eq!(rows[0].1, vec![603, 500]);

    // FASTA carries ;size= annotations in the same order
    let records = read_fasta(&fasta);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, "asv1;size=603");
    assert_eq!(records[0].1.as_bytes(), variant_a.as_slice());
    assert_eq!(records[1].0, "asv2;size=500");

    // Error-rate dump: one row per quality bucket seen, probabilities in (0,1)
    let (rate_header, rate_rows) = read_metric_rows(&rates);
    assert!(rate_header.iter().any(|column| column == "quality"));
    assert!(rate_header.iter().any(|column| column == "A>G"));
    assert!(!rate_rows.is_empty());
    for row in &rate_rows {
        let rate: f64 = metric_field(&rate_header, row, "A>G").parse().unwrap();
        assert!(rate > 0.0 && rate < 1.0);
    }

    // Metrics: one row for the sample, converged with all reads accounted for
    let (header, metric_rows) = read_metric_rows(&metrics);
    assert_eq!(metric_rows.len(), 1);
    assert_eq!(metric_field(&header, &metric_rows[0], "sample"), "gut");
    assert_eq!(metric_field(&header, &metric_rows[0], "total_reads"), "1103");
    assert_eq!(metric_field(&header, &metric_rows[0], "unique_sequences"), "3");
    assert_eq!(metric_field(&header, &metric_rows[0], "partitions"), "2");
    assert_eq!(metric_field(&header, &metric_rows[0], "converged"), "true");
}

#[test]
fn test_denoise_multiple_samples_union_columns() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let sample1 = temp_dir.path().join("s1.fastq");
    let sample2 = temp_dir.path().join("s2.fastq");
    let table = temp_dir.path().join("table.tsv");

    let variant_a = synthetic_sequence(60, 3);
    let variant_b = synthetic_sequence(60, 4);
    write_fastq(&sample1, &[(&variant_a, 400)]);
    write_fastq(&sample2, &[(&variant_b, 300), (&variant_a, 100)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "denoise",
            "-i",
            sample1.to_str().unwrap(),
            sample2.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-s",
            "day0",
            "day7",
        ])
        .output()
        .expect("Failed to run denoise command");
    assert!(
        output.status.success(),
        "Denoise command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Columns are the union across samples, total-abundance descending:
    // variant A (500) before variant B (300)
    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), variant_a.as_slice());
    assert_eq!(sequences[1].as_bytes(), variant_b.as_slice());
    assert_eq!(rows[0], ("day0".to_string(), vec![400, 0]));
    assert_eq!(rows[1], ("day7".to_string(), vec![100, 300]));
}

#[test]
fn test_denoise_deterministic_across_runs_and_threads() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("sample.fastq");

    let variant_a = synthetic_sequence(60, 5);
    let variant_b = synthetic_sequence(60, 6);
    let mut shadow = variant_b.clone();
    shadow[30] = flip_base(shadow[30]);
    write_fastq(&input, &[(&variant_a, 500), (&variant_b, 450), (&shadow, 5)]);

    let mut outputs = Vec::new();
    for (run, threads) in [("one", "1"), ("two", "4")] {
        let table = temp_dir.path().join(format!("table_{run}.tsv"));
        let output = Command::new(env!("CARGO_BIN_EXE_denada"))
            .args([
                "denoise",
                "-i",
                input.to_str().unwrap(),
                "-o",
                table.to_str().unwrap(),
                "--threads",
                threads,
            ])
            .output()
            .expect("Failed to run denoise command");
        assert!(
            output.status.success(),
            "Denoise command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        outputs.push(fs::read(&table).expect("Failed to read table"));
    }

    assert_eq!(outputs[0], outputs[1], "Output must not depend on thread count");
}

#[test]
fn test_denoise_single_variant_converges_immediately() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("pure.fastq");
    let table = temp_dir.path().join("table.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    let variant = synthetic_sequence(80, 7);
    write_fastq(&input, &[(&variant, 200)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "denoise",
            "-i",
            input.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run denoise command");
    assert!(
        output.status.success(),
        "Denoise command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].as_bytes(), variant.as_slice());
    assert_eq!(rows[0].1, vec![200]);

    let (header, metric_rows) = read_metric_rows(&metrics);
    assert_eq!(metric_field(&header, &metric_rows[0], "converged"), "true");
    let iterations: u64 =
        metric_field(&header, &metric_rows[0], "iterations").parse().unwrap();
    assert!(iterations <= 2, "No-variation input must converge immediately");
}

//! Integration tests for fatal input and configuration errors.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{synthetic_sequence, write_fastq, write_table};

#[test]
fn test_denoise_missing_input_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = temp_dir.path().join("nope.fastq");
    let table = temp_dir.path().join("table.tsv");

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args(["denoise", "-i", missing.to_str().unwrap(), "-o", table.to_str().unwrap()])
        .output()
        .expect("Failed to run denoise command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope.fastq"), "Error names the missing file: {stderr}");
}

#[test]
fn test_denoise_rejects_invalid_omega() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("sample.fastq");
    let table = temp_dir.path().join("table.tsv");
    let variant = synthetic_sequence(60, 1);
    write_fastq(&input, &[(&variant, 10)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "denoise",
            "-i",
            input.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "--omega",
            "2.0",
        ])
        .output()
        .expect("Failed to run denoise command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("omega"));
}

#[test]
fn test_denoise_rejects_duplicate_sample_names() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input1 = temp_dir.path().join("a.fastq");
    let input2 = temp_dir.path().join("b.fastq");
    let table = temp_dir.path().join("table.tsv");
    let variant = synthetic_sequence(60, 2);
    write_fastq(&input1, &[(&variant, 10)]);
    write_fastq(&input2, &[(&variant, 10)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "denoise",
            "-i",
            input1.to_str().unwrap(),
            input2.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-s",
            "same",
            "same",
        ])
        .output()
        .expect("Failed to run denoise command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Duplicate sample name"));
}

#[test]
fn test_denoise_rejects_malformed_fastq() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("bad.fastq");
    let table = temp_dir.path().join("table.tsv");
    // 'R' is not in the {A,C,G,T,N} alphabet
    fs::write(&input, b"@r1\nACRT\n+\nIIII\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args(["denoise", "-i", input.to_str().unwrap(), "-o", table.to_str().unwrap()])
        .output()
        .expect("Failed to run denoise command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("r1"));
}

#[test]
fn test_merge_rejects_pair_count_mismatch() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("s_R1.fastq");
    let read_two = temp_dir.path().join("s_R2.fastq");
    let table = temp_dir.path().join("table.tsv");

    let template = synthetic_sequence(100, 3);
    write_fastq(&read_one, &[(&template, 3)]);
    write_fastq(&read_two, &[(&template, 2)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("3 forward") && stderr.contains("2 reverse"),
        "Error reports both counts: {stderr}"
    );
}

#[test]
fn test_merge_rejects_unbalanced_file_lists() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("a_R1.fastq");
    let read_two = temp_dir.path().join("a_R2.fastq");
    let extra = temp_dir.path().join("b_R1.fastq");
    let table = temp_dir.path().join("table.tsv");

    let template = synthetic_sequence(100, 4);
    write_fastq(&read_one, &[(&template, 1)]);
    write_fastq(&read_two, &[(&template, 1)]);
    write_fastq(&extra, &[(&template, 1)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            extra.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--read-two"));
}

#[test]
fn test_bimera_rejects_malformed_table() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("bad.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");
    fs::write(&input, "wrong\tACGT\ns1\t5\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args(["bimera", "-i", input.to_str().unwrap(), "-o", filtered.to_str().unwrap()])
        .output()
        .expect("Failed to run bimera command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sample"));
}

#[test]
fn test_bimera_rejects_invalid_fold() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");
    let sequence = synthetic_sequence(50, 5);
    write_table(&input, &[&sequence], &[("s1", &[10])]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            filtered.to_str().unwrap(),
            "--min-fold",
            "0.5",
        ])
        .output()
        .expect("Failed to run bimera command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("min-fold"));
}

//! Integration tests for the bimera command.

use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{metric_field, read_metric_rows, read_table, write_table};

/// 200 bp parents differing at every position, and their breakpoint-100
/// chimera.
fn chimera_trio() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let left: Vec<u8> = b"ACGT".iter().copied().cycle().take(200).collect();
    let right: Vec<u8> = b"GTAC".iter().copied().cycle().take(200).collect();
    let mut chimera = left[..100].to_vec();
    chimera.extend_from_slice(&right[100..]);
    (left, right, chimera)
}

#[test]
fn test_bimera_pooled_flags_and_filters() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");
    let calls = temp_dir.path().join("calls.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    let (left, right, chimera) = chimera_trio();
    let unrelated = vec![b'T'; 200];
    write_table(
        &input,
        &[&left, &right, &chimera, &unrelated],
        &[("s1", &[600, 550, 30, 25]), ("s2", &[400, 350, 20, 15])],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            filtered.to_str().unwrap(),
            "--mode",
            "pooled",
            "-c",
            calls.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(
        output.status.success(),
        "Bimera command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // The chimera column is gone; survivors keep their original order
    let (sequences, rows) = read_table(&filtered);
    assert_eq!(sequences.len(), 3);
    assert_eq!(sequences[0].as_bytes(), left.as_slice());
    assert_eq!(sequences[1].as_bytes(), right.as_slice());
    assert_eq!(sequences[2].as_bytes(), unrelated.as_slice());
    assert_eq!(rows[0], ("s1".to_string(), vec![600, 550, 25]));
    assert_eq!(rows[1], ("s2".to_string(), vec![400, 350, 15]));

    // Per-sequence calls: the chimera names its parents and breakpoint; the
    // unrelated low-abundance sequence stays genuine
    let (header, call_rows) = read_metric_rows(&calls);
    let chimera_str = String::from_utf8(chimera).unwrap();
    let chimera_row = call_rows
        .iter()
        .find(|row| metric_field(&header, row, "sequence") == chimera_str)
        .expect("Chimera has a call row");
    assert_eq!(metric_field(&header, chimera_row, "chimeric"), "true");
    assert_eq!(metric_field(&header, chimera_row, "breakpoint"), "100");
    assert_eq!(metric_field(&header, chimera_row, "left_parent").as_bytes(), left.as_slice());
    assert_eq!(metric_field(&header, chimera_row, "right_parent").as_bytes(), right.as_slice());
    let score: f64 = metric_field(&header, chimera_row, "score").parse().unwrap();
    assert!((score - 18.0).abs() < 1e-9, "Fold evidence is min(1000, 900) / 50");

    let unrelated_str = String::from_utf8(unrelated).unwrap();
    let unrelated_row = call_rows
        .iter()
        .find(|row| metric_field(&header, row, "sequence") == unrelated_str)
        .expect("Unrelated sequence has a call row");
    assert_eq!(metric_field(&header, unrelated_row, "chimeric"), "false");
    assert_eq!(metric_field(&header, unrelated_row, "breakpoint"), "");

    let (metric_header, metric_rows) = read_metric_rows(&metrics);
    assert_eq!(metric_field(&metric_header, &metric_rows[0], "sequences_tested"), "4");
    assert_eq!(metric_field(&metric_header, &metric_rows[0], "chimeric_sequences"), "1");
    assert_eq!(metric_field(&metric_header, &metric_rows[0], "genuine_sequences"), "3");
    assert_eq!(metric_field(&metric_header, &metric_rows[0], "reads_removed"), "50");
}

#[test]
fn test_bimera_defaults_to_pooled_detection() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");

    // Only one of the two samples carries the parents, so per-sample
    // consensus at the default fraction would keep the chimera; pooled
    // abundances flag it
    let (left, right, chimera) = chimera_trio();
    write_table(
        &input,
        &[&left, &right, &chimera],
        &[("s1", &[1000, 900, 50]), ("s2", &[0, 0, 20])],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args(["bimera", "-i", input.to_str().unwrap(), "-o", filtered.to_str().unwrap()])
        .output()
        .expect("Failed to run bimera command");
    assert!(
        output.status.success(),
        "Bimera command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (sequences, rows) = read_table(&filtered);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), left.as_slice());
    assert_eq!(sequences[1].as_bytes(), right.as_slice());
    assert_eq!(rows[0], ("s1".to_string(), vec![1000, 900]));
}

#[test]
fn test_bimera_consensus_vote_threshold() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");

    let (left, right, chimera) = chimera_trio();
    // Sample one contains the parents and flags the chimera; sample two has
    // the chimera alone and cannot
    write_table(
        &input,
        &[&left, &right, &chimera],
        &[("s1", &[1000, 900, 50]), ("s2", &[0, 0, 20])],
    );

    // Default consensus fraction (0.9): one vote of two is not enough
    let kept = temp_dir.path().join("kept.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            kept.to_str().unwrap(),
            "--mode",
            "consensus",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(output.status.success());
    let (sequences, _) = read_table(&kept);
    assert_eq!(sequences.len(), 3);

    // Halving the vote threshold flips the call
    let removed = temp_dir.path().join("removed.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            removed.to_str().unwrap(),
            "--mode",
            "consensus",
            "--min-sample-fraction",
            "0.5",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(output.status.success());
    let (sequences, rows) = read_table(&removed);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), left.as_slice());
    assert_eq!(sequences[1].as_bytes(), right.as_slice());
    assert_eq!(rows[1], ("s2".to_string(), vec![0, 0]));
}

#[test]
fn test_bimera_mismatch_budget_option() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");

    // One stray base differing from both parents
    let (left, right, mut chimera) = chimera_trio();
    chimera[50] = b'T';
    assert_ne!(left[50], b'T');
    assert_ne!(right[50], b'T');
    write_table(&input, &[&left, &right, &chimera], &[("s1", &[1000, 900, 50])]);

    // Zero budget keeps the imperfect chimera
    let strict = temp_dir.path().join("strict.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            strict.to_str().unwrap(),
            "--mode",
            "pooled",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(output.status.success());
    let (sequences, _) = read_table(&strict);
    assert_eq!(sequences.len(), 3);

    // One mismatch of budget removes it
    let relaxed = temp_dir.path().join("relaxed.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            relaxed.to_str().unwrap(),
            "--mode",
            "pooled",
            "--max-mismatches",
            "1",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(output.status.success());
    let (sequences, _) = read_table(&relaxed);
    assert_eq!(sequences.len(), 2);
}

#[test]
fn test_bimera_high_rank_sequence_without_parents_kept() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("table.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");

    // The least abundant sequence has no two-parent explanation, so rank
    // alone must never condemn it
    let (left, right, _) = chimera_trio();
    let lonely = vec![b'T'; 200];
    write_table(&input, &[&left, &right, &lonely], &[("s1", &[1000, 900, 2])]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            input.to_str().unwrap(),
            "-o",
            filtered.to_str().unwrap(),
            "--mode",
            "pooled",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(output.status.success());

    let (sequences, _) = read_table(&filtered);
    assert_eq!(sequences.len(), 3);
}

//! Integration tests for the merge command.

use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{
    flip_base, metric_field, read_metric_rows, read_table, reverse_complement,
    synthetic_sequence, write_fastq,
};

#[test]
fn test_merge_staggered_pair_recovers_template() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("s1_R1.fastq");
    let read_two = temp_dir.path().join("s1_R2.fastq");
    let table = temp_dir.path().join("table.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    // 390 bp template sequenced as a 250 bp forward read and a 200 bp
    // reverse read: 60 bp of true overlap
    let template = synthetic_sequence(390, 11);
    let forward = &template[..250];
    let reverse = reverse_complement(&template[190..]);

    write_fastq(&read_one, &[(forward, 80)]);
    write_fastq(&read_two, &[(&reverse, 80)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(
        output.status.success(),
        "Merge command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].len(), 390, "Merged length is forward + reverse - overlap");
    assert_eq!(sequences[0].as_bytes(), template.as_slice());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "s1", "Sample name comes from the read-one stem");
    assert_eq!(rows[0].1, vec![80]);

    let (header, metric_rows) = read_metric_rows(&metrics);
    assert_eq!(metric_rows.len(), 1);
    assert_eq!(metric_field(&header, &metric_rows[0], "total_pairs"), "80");
    assert_eq!(metric_field(&header, &metric_rows[0], "merged_pairs"), "80");
    assert_eq!(metric_field(&header, &metric_rows[0], "merged_sequences"), "1");
}

#[test]
fn test_merge_overlap_mismatches_reject_not_force() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("bad_R1.fastq");
    let read_two = temp_dir.path().join("bad_R2.fastq");

    // Two disagreements inside the 60 bp overlap
    let template = synthetic_sequence(390, 13);
    let mut reverse_source = template[190..].to_vec();
    reverse_source[20] = flip_base(reverse_source[20]);
    reverse_source[40] = flip_base(reverse_source[40]);
    let forward = &template[..250];
    let reverse = reverse_complement(&reverse_source);

    write_fastq(&read_one, &[(forward, 50)]);
    write_fastq(&read_two, &[(&reverse, 50)]);

    // Default budget of zero mismatches: the pair is dropped, not merged
    let table = temp_dir.path().join("strict.tsv");
    let metrics = temp_dir.path().join("strict_metrics.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(
        output.status.success(),
        "Rejected overlaps must not fail the run: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (sequences, rows) = read_table(&table);
    assert!(sequences.is_empty());
    assert_eq!(rows[0].0, "bad");
    let (header, metric_rows) = read_metric_rows(&metrics);
    assert_eq!(metric_field(&header, &metric_rows[0], "merged_pairs"), "0");
    assert_eq!(metric_field(&header, &metric_rows[0], "rejected_mismatches"), "50");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("check overlap"), "Low yield logs a warning: {stderr}");

    // A budget of two lets the same pair through, forward bases winning
    let table = temp_dir.path().join("relaxed.tsv");
    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "--max-mismatches",
            "2",
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(output.status.success());

    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].as_bytes(), template.as_slice());
    assert_eq!(rows[0].1, vec![50]);
}

#[test]
fn test_merge_no_overlap_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("apart_R1.fastq");
    let read_two = temp_dir.path().join("apart_R2.fastq");
    let table = temp_dir.path().join("table.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    // Unrelated fragments: no placement satisfies the minimum overlap cleanly
    let forward = synthetic_sequence(150, 17);
    let reverse = synthetic_sequence(150, 19);
    write_fastq(&read_one, &[(&forward, 30)]);
    write_fastq(&read_two, &[(&reverse, 30)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
            "-m",
            metrics.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(output.status.success());

    let (sequences, _) = read_table(&table);
    assert!(sequences.is_empty());
    let (header, metric_rows) = read_metric_rows(&metrics);
    let rejected: u64 = metric_field(&header, &metric_rows[0], "rejected_no_overlap")
        .parse::<u64>()
        .unwrap()
        + metric_field(&header, &metric_rows[0], "rejected_mismatches").parse::<u64>().unwrap();
    assert_eq!(rejected, 30, "Every pair is rejected, none merged");
    assert_eq!(metric_field(&header, &metric_rows[0], "merged_pairs"), "0");
}

#[test]
fn test_merge_two_samples_share_columns() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let table = temp_dir.path().join("table.tsv");

    let template_a = synthetic_sequence(300, 23);
    let template_b = synthetic_sequence(300, 29);
    let reverse_a = reverse_complement(&template_a[150..]);
    let reverse_b = reverse_complement(&template_b[150..]);

    // Sample one holds both templates, sample two only the second
    let s1_r1 = temp_dir.path().join("a_R1.fastq");
    let s1_r2 = temp_dir.path().join("a_R2.fastq");
    write_fastq(&s1_r1, &[(&template_a[..200], 60), (&template_b[..200], 40)]);
    write_fastq(&s1_r2, &[(&reverse_a, 60), (&reverse_b, 40)]);

    let s2_r1 = temp_dir.path().join("b_R1.fastq");
    let s2_r2 = temp_dir.path().join("b_R2.fastq");
    write_fastq(&s2_r1, &[(&template_b[..200], 90)]);
    write_fastq(&s2_r2, &[(&reverse_b, 90)]);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            s1_r1.to_str().unwrap(),
            s2_r1.to_str().unwrap(),
            "-2",
            s1_r2.to_str().unwrap(),
            s2_r2.to_str().unwrap(),
            "-o",
            table.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(
        output.status.success(),
        "Merge command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Template B totals 130 reads and leads the column order
    let (sequences, rows) = read_table(&table);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), template_b.as_slice());
    assert_eq!(sequences[1].as_bytes(), template_a.as_slice());
    assert_eq!(rows[0], ("a".to_string(), vec![40, 60]));
    assert_eq!(rows[1], ("b".to_string(), vec![90, 0]));
}

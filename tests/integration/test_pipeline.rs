//! End-to-end pipeline test: paired-end merge followed by chimera removal.

use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{read_table, reverse_complement, synthetic_sequence, write_fastq};

#[test]
fn test_merge_then_bimera_pipeline() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let read_one = temp_dir.path().join("run_R1.fastq");
    let read_two = temp_dir.path().join("run_R2.fastq");
    let merged = temp_dir.path().join("merged.tsv");
    let filtered = temp_dir.path().join("filtered.tsv");

    // Two genuine 390 bp templates and their breakpoint-195 chimera, each
    // sequenced as a 250/200 staggered pair with a 60 bp overlap
    let template_a = synthetic_sequence(390, 101);
    let template_b = synthetic_sequence(390, 103);
    let mut chimera = template_a[..195].to_vec();
    chimera.extend_from_slice(&template_b[195..]);

    let mut forward_reads: Vec<(&[u8], u64)> = Vec::new();
    let mut reverse_sources = Vec::new();
    for (template, count) in [(&template_a, 500), (&template_b, 450), (&chimera, 40)] {
        forward_reads.push((&template[..250], count));
        reverse_sources.push((reverse_complement(&template[190..]), count));
    }
    let reverse_reads: Vec<(&[u8], u64)> =
        reverse_sources.iter().map(|(seq, count)| (seq.as_slice(), *count)).collect();
    write_fastq(&read_one, &forward_reads);
    write_fastq(&read_two, &reverse_reads);

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "merge",
            "-1",
            read_one.to_str().unwrap(),
            "-2",
            read_two.to_str().unwrap(),
            "-o",
            merged.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run merge command");
    assert!(
        output.status.success(),
        "Merge command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // All three templates survive the merge with their read counts intact
    let (sequences, rows) = read_table(&merged);
    assert_eq!(sequences.len(), 3);
    assert_eq!(sequences[0].as_bytes(), template_a.as_slice());
    assert_eq!(sequences[1].as_bytes(), template_b.as_slice());
    assert_eq!(sequences[2].as_bytes(), chimera.as_slice());
    assert_eq!(rows[0].1, vec![500, 450, 40]);
    assert_eq!(rows[0].1.iter().sum::<u64>(), 990, "Reads are conserved through merging");

    let output = Command::new(env!("CARGO_BIN_EXE_denada"))
        .args([
            "bimera",
            "-i",
            merged.to_str().unwrap(),
            "-o",
            filtered.to_str().unwrap(),
            "--mode",
            "pooled",
        ])
        .output()
        .expect("Failed to run bimera command");
    assert!(
        output.status.success(),
        "Bimera command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Only the chimera is removed, and the survivors keep their order
    let (sequences, rows) = read_table(&filtered);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].as_bytes(), template_a.as_slice());
    assert_eq!(sequences[1].as_bytes(), template_b.as_slice());
    assert_eq!(rows[0].1, vec![500, 450]);
}

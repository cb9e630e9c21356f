//! Synthetic FASTQ data for integration tests.

use std::fs;
use std::path::Path;

/// Deterministic sequence without short-range periodicity, so overlap
/// placements and chimera breakpoints are unambiguous in tests.
pub fn synthetic_sequence(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            b"ACGT"[(state % 4) as usize]
        })
        .collect()
}

/// Substitutes a base for a different one, deterministically.
pub fn flip_base(base: u8) -> u8 {
    match base {
        b'A' => b'C',
        b'C' => b'G',
        b'G' => b'T',
        _ => b'A',
    }
}

/// Reverse complement over {A,C,G,T,N}.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => other,
        })
        .collect()
}

/// Writes a FASTQ file holding each sequence `copies` times at uniform Q40.
pub fn write_fastq<P: AsRef<Path>>(path: P, reads: &[(&[u8], u64)]) {
    let mut contents = String::new();
    let mut index = 0u64;
    for (sequence, copies) in reads {
        for _ in 0..*copies {
            index += 1;
            contents.push_str(&format!("@read{index}\n"));
            contents.push_str(std::str::from_utf8(sequence).expect("ASCII sequence"));
            contents.push_str("\n+\n");
            contents.push_str(&"I".repeat(sequence.len()));
            contents.push('\n');
        }
    }
    fs::write(path, contents).expect("Failed to write FASTQ file");
}

/// Writes a sequence table TSV directly, bypassing the denoiser.
pub fn write_table<P: AsRef<Path>>(path: P, sequences: &[&[u8]], rows: &[(&str, &[u64])]) {
    let mut contents = String::from("sample");
    for sequence in sequences {
        contents.push('\t');
        contents.push_str(std::str::from_utf8(sequence).expect("ASCII sequence"));
    }
    contents.push('\n');
    for (name, counts) in rows {
        contents.push_str(name);
        for count in *counts {
            contents.push_str(&format!("\t{count}"));
        }
        contents.push('\n');
    }
    fs::write(path, contents).expect("Failed to write table file");
}

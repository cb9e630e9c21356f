//! Parsing helpers for the files the CLI writes.

use std::fs;
use std::path::Path;

/// Parses a sequence table TSV into (sequence column headers, sample rows).
pub fn read_table<P: AsRef<Path>>(path: P) -> (Vec<String>, Vec<(String, Vec<u64>)>) {
    let contents = fs::read_to_string(path).expect("Failed to read table file");
    let mut lines = contents.lines();

    let header = lines.next().expect("Table has a header line");
    let mut fields = header.split('\t');
    assert_eq!(fields.next(), Some("sample"), "Table header starts with 'sample'");
    let sequences: Vec<String> = fields.map(str::to_string).collect();

    let rows = lines
        .map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next().expect("Row has a sample name").to_string();
            let counts: Vec<u64> =
                fields.map(|field| field.parse().expect("Counts are integers")).collect();
            assert_eq!(counts.len(), sequences.len(), "Row width matches header");
            (name, counts)
        })
        .collect();

    (sequences, rows)
}

/// Parses a FASTA file into (header, sequence) records.
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Vec<(String, String)> {
    let contents = fs::read_to_string(path).expect("Failed to read FASTA file");
    let mut records = Vec::new();
    let mut current: Option<(String, String)> = None;
    for line in contents.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some((header.to_string(), String::new()));
        } else if let Some((_, sequence)) = current.as_mut() {
            sequence.push_str(line);
        }
    }
    if let Some(record) = current {
        records.push(record);
    }
    records
}

/// Parses a metrics/calls TSV into (column names, rows of string fields).
pub fn read_metric_rows<P: AsRef<Path>>(path: P) -> (Vec<String>, Vec<Vec<String>>) {
    let contents = fs::read_to_string(path).expect("Failed to read metrics file");
    let mut lines = contents.lines();
    let header: Vec<String> =
        lines.next().expect("Metrics file has a header").split('\t').map(str::to_string).collect();
    let rows = lines.map(|line| line.split('\t').map(str::to_string).collect()).collect();
    (header, rows)
}

/// Looks up one field of a metrics row by column name.
pub fn metric_field<'a>(header: &[String], row: &'a [String], name: &str) -> &'a str {
    let index = header
        .iter()
        .position(|column| column == name)
        .unwrap_or_else(|| panic!("Metrics file has no column '{name}'"));
    &row[index]
}

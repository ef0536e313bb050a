//! CSV input for the one-shot CLI import
//!
//! The first row is the header. Each later row becomes a `Record` keyed by
//! header, in file order. Short rows simply lack the trailing keys.

use crate::domain::Record;
use anyhow::Context;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read all records from a CSV file
pub fn read_records<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    let records = parse_records(file)
        .with_context(|| format!("Failed to parse input file {}", path.display()))?;
    debug!(path = %path.display(), records = %records.len(), "csv_records_loaded");
    Ok(records)
}

/// Parse records from any reader
pub fn parse_records<R: Read>(input: R) -> anyhow::Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("row {}", i + 1))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

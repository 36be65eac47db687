//! CSV codec: bytes ↔ [`Dataset`].
//!
//! Pure adapter over the `csv` crate, no I/O. The field delimiter is
//! auto-detected from the header line (comma, semicolon or tab). Encoding
//! always writes the header in sorted field-name order so that successive
//! merges of the same file are byte-stable.

use crate::dataset::{Dataset, DatasetError, Row, Schema};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed csv: {0}")]
    Malformed(String),
    #[error("csv header is empty")]
    EmptyHeader,
}

impl From<DatasetError> for CodecError {
    fn from(err: DatasetError) -> Self {
        Self::Malformed(err.to_string())
    }
}

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Pick the delimiter that appears most often in the header line.
/// Falls back to comma when none appears.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    CANDIDATE_DELIMITERS
        .into_iter()
        .map(|d| (header.iter().filter(|&&b| b == d).count(), d))
        .max_by_key(|&(count, _)| count)
        .filter(|&(count, _)| count > 0)
        .map_or(b',', |(_, d)| d)
}

/// Decode a delimited-text file into a dataset.
///
/// The first line is the header. Empty input decodes to an empty dataset
/// (callers treat an empty remote file like a missing one).
pub fn decode(bytes: &[u8]) -> Result<Dataset, CodecError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Dataset::default());
    }

    let delimiter = detect_delimiter(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| CodecError::Malformed(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(String::is_empty) {
        return Err(CodecError::EmptyHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CodecError::Malformed(e.to_string()))?;
        let fields = header
            .iter()
            .zip(record.iter())
            .map(|(field, value)| (field.clone(), value.to_string()))
            .collect();
        rows.push(Row::new(fields));
    }

    let schema = Schema::new(header)?;
    Ok(Dataset::with_schema(schema, rows)?)
}

/// Encode a dataset as comma-delimited text with a sorted header.
pub fn encode(dataset: &Dataset) -> Result<Vec<u8>, CodecError> {
    let fields = dataset.schema().field_names();
    if fields.is_empty() {
        return Err(CodecError::EmptyHeader);
    }

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    for row in dataset.rows() {
        let record: Vec<&str> = fields
            .iter()
            .map(|f| row.get(f).unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| CodecError::Malformed(e.to_string()))
}

//! Upload format parsing
//!
//! This module turns raw upload bytes (CSV or JSON) into raw field-value
//! records. A malformed record is skipped and counted - it never aborts the
//! rest of the batch. Only structural failures (non-UTF-8 content, an
//! unreadable JSON document, no record list) abort the whole call.

use crate::error::EngineError;
use std::collections::HashMap;

/// A raw record: original field names mapped to raw JSON values
pub type RawRecord = HashMap<String, serde_json::Value>;

/// Declared or inferred upload format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Json,
}

impl UploadFormat {
    /// Infer the format from a filename extension
    pub fn infer(filename: &str) -> Result<UploadFormat, EngineError> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(UploadFormat::Csv)
        } else if lower.ends_with(".json") {
            Ok(UploadFormat::Json)
        } else {
            Err(EngineError::UnsupportedFormat(filename.to_string()))
        }
    }
}

/// Parser output: the surviving records plus the malformed-record count
#[derive(Debug)]
pub struct ParsedBatch {
    pub records: Vec<RawRecord>,
    pub malformed: usize,
}

/// Parse upload bytes into raw records
pub fn parse_upload(content: &[u8], format: UploadFormat) -> Result<ParsedBatch, EngineError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| EngineError::ParseError(format!("upload is not valid UTF-8: {e}")))?;
    match format {
        UploadFormat::Csv => parse_csv(text),
        UploadFormat::Json => parse_json(text),
    }
}

/// Parse CSV content. The first line is the header; a data line whose field
/// count disagrees with the header is malformed and skipped. Columns named
/// `meta.<key>` are reshaped into a nested `meta` object (drift-log CSV
/// format).
fn parse_csv(text: &str) -> Result<ParsedBatch, EngineError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| EngineError::ParseError("empty CSV upload".to_string()))?;
    let header = split_csv_line(header_line);

    let mut records = Vec::new();
    let mut malformed = 0;

    for line in lines {
        let fields = split_csv_line(line);
        if fields.len() != header.len() {
            log::warn!(
                "skipping CSV line with {} fields (header has {})",
                fields.len(),
                header.len()
            );
            malformed += 1;
            continue;
        }

        let mut record = RawRecord::new();
        let mut meta = serde_json::Map::new();
        for (name, raw) in header.iter().zip(fields) {
            let value = csv_value(&raw);
            if let Some(key) = name.strip_prefix("meta.") {
                meta.insert(key.to_string(), value);
            } else {
                record.insert(name.clone(), value);
            }
        }
        if !meta.is_empty() {
            record.insert("meta".to_string(), serde_json::Value::Object(meta));
        }
        records.push(record);
    }

    Ok(ParsedBatch { records, malformed })
}

/// Split one CSV line into fields. Handles double-quoted fields with doubled
/// quote escapes; embedded newlines are not supported.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Interpret a single CSV field: empty becomes null, numerics become numbers,
/// everything else stays a string.
fn csv_value(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    serde_json::Value::String(raw.to_string())
}

/// Parse a JSON upload: either a top-level array of objects, or an object
/// whose first array-valued member holds the records. A non-object array
/// element is malformed and skipped.
fn parse_json(text: &str) -> Result<ParsedBatch, EngineError> {
    let document: serde_json::Value = serde_json::from_str(text)?;

    let items = match document {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                serde_json::Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                EngineError::ParseError(
                    "JSON object does not contain a list of records".to_string(),
                )
            })?,
        _ => {
            return Err(EngineError::ParseError(
                "unsupported JSON structure".to_string(),
            ))
        }
    };

    let mut records = Vec::new();
    let mut malformed = 0;
    for item in items {
        match item {
            serde_json::Value::Object(map) => records.push(map.into_iter().collect()),
            other => {
                log::warn!("skipping non-object JSON record: {other}");
                malformed += 1;
            }
        }
    }

    Ok(ParsedBatch { records, malformed })
}

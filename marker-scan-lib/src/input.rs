//! Input list parsing.
//!
//! Records are lines of five semicolon-separated fields:
//! `domain;registrarID;holderID;nameserver;expiryDate`.

use crate::error::ScanError;
use crate::types::Target;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Number of fields in a well-formed record.
pub const FIELD_COUNT: usize = 5;

/// Targets read from an input list, plus the lines that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInput {
    /// Well-formed records, in input order
    pub targets: Vec<Target>,
    /// One [`ScanError::Parse`] per malformed line
    pub skipped: Vec<ScanError>,
}

/// Parse a single record line.
///
/// Fields are trimmed; `line_number` is 1-based and only used for errors.
pub fn parse_line(line_number: usize, line: &str) -> Result<Target, ScanError> {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();

    if fields.len() != FIELD_COUNT {
        return Err(ScanError::parse(
            line_number,
            line,
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    }

    if fields[0].is_empty() {
        return Err(ScanError::parse(line_number, line, "empty domain"));
    }

    Ok(Target {
        domain: fields[0].to_string(),
        registrar_id: fields[1].to_string(),
        holder_id: fields[2].to_string(),
        nameserver: fields[3].to_string(),
        expiry_date: fields[4].to_string(),
    })
}

/// Parse every record from `reader`.
///
/// Blank lines and `#` comments are ignored. Malformed lines are collected in
/// [`ParsedInput::skipped`] and never stop parsing; only a read failure does.
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn parse_targets<R: BufRead>(reader: R) -> Result<ParsedInput, ScanError> {
    let mut parsed = ParsedInput::default();

    for (index, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let line = String::from_utf8_lossy(&raw);
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_line(index + 1, trimmed) {
            Ok(target) => parsed.targets.push(target),
            Err(e) => {
                tracing::warn!("{}", e);
                parsed.skipped.push(e);
            }
        }
    }

    Ok(parsed)
}

/// Read and parse the input list at `path`.
///
/// A missing or unreadable file is a [`ScanError::File`].
pub fn load_targets<P: AsRef<Path>>(path: P) -> Result<ParsedInput, ScanError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let file = File::open(path).map_err(|e| ScanError::file_error(&display, e.to_string()))?;

    parse_targets(BufReader::new(file)).map_err(|e| match e {
        ScanError::Internal { message } => ScanError::file_error(&display, message),
        other => other,
    })
}

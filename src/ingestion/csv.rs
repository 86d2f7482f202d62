//! CSV parsing with a strict → lenient fallback.
//!
//! Rules:
//!
//! - The first non-blank record is the header; names are kept verbatim.
//! - In the strict tier, any record whose field count differs from the header fails the whole
//!   parse. In the lenient tier such records are dropped and counted.
//! - Bytes that do not decode under the chosen encoding fail both tiers, so the caller moves on
//!   to the next candidate encoding instead of losing rows.
//! - Column types are inferred per column once all rows are read (see [`Table::from_text_rows`]).

use std::path::Path;

use csv::ByteRecord;
use tracing::{debug, warn};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::dialect::{infer_delimiter, Delimiter, Detection, TextEncoding};

/// Which parsing tier produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ParseTier {
    /// Every record was well-formed.
    Strict,
    /// Malformed records were skipped.
    Lenient,
}

/// A parsed table plus the dialect that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    /// Parsed data.
    pub table: Table,
    /// Malformed records dropped by the lenient tier (always 0 for [`ParseTier::Strict`]).
    pub dropped_rows: usize,
    /// Encoding used to decode the file.
    pub encoding: TextEncoding,
    /// Delimiter actually used (after inference).
    pub delimiter: u8,
    /// Tier that produced the table.
    pub tier: ParseTier,
}

/// Parse a file with the given encoding and delimiter, falling back to the lenient tier when the
/// strict tier fails.
///
/// Returns [`IngestionError::UnparseableFile`] when the lenient tier fails as well.
pub fn parse(
    path: impl AsRef<Path>,
    encoding: TextEncoding,
    delimiter: Delimiter,
) -> IngestionResult<ParsedTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, encoding, delimiter).map_err(|e| match e {
        IngestionError::StrictParseFailed { reason } => IngestionError::UnparseableFile {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// In-memory variant of [`parse`].
///
/// When both tiers fail the lenient tier's reason is returned as
/// [`IngestionError::StrictParseFailed`]; [`parse`] attaches the path.
pub fn parse_bytes(
    bytes: &[u8],
    encoding: TextEncoding,
    delimiter: Delimiter,
) -> IngestionResult<ParsedTable> {
    match parse_tier(bytes, encoding, delimiter, ParseTier::Strict) {
        Ok(parsed) => Ok(parsed),
        Err(IngestionError::StrictParseFailed { reason }) => {
            warn!(encoding = %encoding, %reason, "strict parse failed, retrying with malformed rows skipped");
            parse_tier(bytes, encoding, delimiter, ParseTier::Lenient)
        }
        Err(e) => Err(e),
    }
}

/// Run the encoding strategy chain for a file.
///
/// The detected encoding is tried first, followed by every candidate after it in `candidates`.
/// Each encoding gets the strict and then the lenient tier; the first success wins. When
/// detection found no usable encoding this returns [`IngestionError::NoEncoding`].
pub fn parse_with_fallback(
    path: impl AsRef<Path>,
    detection: Detection,
    candidates: &[TextEncoding],
) -> IngestionResult<ParsedTable> {
    let path = path.as_ref();
    let Detection::Found {
        encoding,
        delimiter,
    } = detection
    else {
        return Err(IngestionError::NoEncoding {
            tried: candidates.iter().map(TextEncoding::label).collect(),
        });
    };

    let bytes = std::fs::read(path)?;
    let later = candidates
        .iter()
        .position(|c| *c == encoding)
        .map(|idx| &candidates[idx + 1..])
        .unwrap_or(&[]);

    let mut last_reason = String::new();
    for (attempt, enc) in std::iter::once(encoding).chain(later.iter().copied()).enumerate() {
        // The sniffed delimiter belongs to the detected encoding; later encodings re-infer.
        let delim = if attempt == 0 { delimiter } else { Delimiter::Infer };
        match parse_bytes(&bytes, enc, delim) {
            Ok(parsed) => return Ok(parsed),
            Err(IngestionError::StrictParseFailed { reason }) => {
                warn!(path = %path.display(), encoding = %enc, %reason, "encoding failed, trying next candidate");
                last_reason = format!("{enc}: {reason}");
            }
            Err(e) => return Err(e),
        }
    }

    Err(IngestionError::UnparseableFile {
        path: path.to_path_buf(),
        reason: last_reason,
    })
}

/// Parse `bytes` using a single tier.
///
/// Failures are reported as [`IngestionError::StrictParseFailed`] for both tiers so callers can
/// chain the next strategy.
pub fn parse_tier(
    bytes: &[u8],
    encoding: TextEncoding,
    delimiter: Delimiter,
    tier: ParseTier,
) -> IngestionResult<ParsedTable> {
    let body = encoding.without_bom(bytes);
    let delimiter = match delimiter {
        Delimiter::Char(b) => b,
        Delimiter::Infer => {
            let inferred = infer_delimiter(&encoding.decode_lossy(body));
            debug!(delimiter = %(inferred as char), "inferred delimiter from full file");
            inferred
        }
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(body);

    let fail = |reason: String| IngestionError::StrictParseFailed { reason };

    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut dropped_rows = 0usize;
    let mut record = ByteRecord::new();

    loop {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(fail(format!("csv error: {e}"))),
        }
        if is_blank(&record) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let Some(expected) = header.as_ref().map(Vec::len) else {
            let names = decode_record(&record, encoding).ok_or_else(|| {
                fail(format!("line {line}: header is not valid {encoding}"))
            })?;
            header = Some(names);
            continue;
        };

        if record.len() != expected {
            let reason = format!("line {line}: expected {expected} fields, found {}", record.len());
            match tier {
                ParseTier::Strict => return Err(fail(reason)),
                ParseTier::Lenient => {
                    debug!(%reason, "dropping malformed record");
                    dropped_rows += 1;
                    continue;
                }
            }
        }

        let fields = decode_record(&record, encoding)
            .ok_or_else(|| fail(format!("line {line}: invalid {encoding} byte sequence")))?;
        rows.push(fields);
    }

    let header = header.ok_or_else(|| fail("no header row".to_string()))?;
    if dropped_rows > 0 {
        warn!(dropped_rows, "skipped malformed records");
    }

    Ok(ParsedTable {
        table: Table::from_text_rows(header, rows),
        dropped_rows,
        encoding,
        delimiter,
        tier,
    })
}

fn is_blank(record: &ByteRecord) -> bool {
    record.len() == 1 && record[0].iter().all(u8::is_ascii_whitespace)
}

fn decode_record(record: &ByteRecord, encoding: TextEncoding) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| encoding.decode_strict(field).map(|s| s.into_owned()))
        .collect()
}

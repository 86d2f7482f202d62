//! Encoding and delimiter detection.
//!
//! [`detect`] reads a bounded sample from the start of a file, finds the first candidate
//! encoding that decodes it cleanly and then sniffs the field delimiter over the decoded text.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv_nose::{SampleSize, Sniffer};
use encoding_rs::{DecoderResult, Encoding, UTF_8, WINDOWS_1252};
use tracing::debug;

use crate::error::{ConfigError, IngestionResult};

/// Default number of bytes sampled for detection.
pub const DEFAULT_SAMPLE_BYTES: usize = 32 * 1024;

/// Delimiters considered when sniffing a sample, in tie-break order.
pub const SNIFF_DELIMITERS: &[u8] = b",\t;|";

/// Delimiters considered when inferring from a whole file.
pub const INFER_DELIMITERS: &[u8] = b",\t;|:";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A text encoding a source file may be written in.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    encoding: &'static Encoding,
    strip_bom: bool,
}

impl TextEncoding {
    /// Plain UTF-8.
    pub const UTF8: Self = Self {
        encoding: UTF_8,
        strip_bom: false,
    };
    /// UTF-8 with an optional leading byte-order mark.
    pub const UTF8_SIG: Self = Self {
        encoding: UTF_8,
        strip_bom: true,
    };
    /// Single-byte Western European (cp1252).
    pub const WINDOWS_1252: Self = Self {
        encoding: WINDOWS_1252,
        strip_bom: false,
    };

    /// Look up an encoding by label (`utf-8`, `utf-8-sig`, `cp1252`, `latin1`, ...).
    ///
    /// Any WHATWG label known to `encoding_rs` is accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8-sig" | "utf8-sig" => Some(Self::UTF8_SIG),
            other => Encoding::for_label(other.as_bytes()).map(|encoding| Self {
                encoding,
                strip_bom: false,
            }),
        }
    }

    /// Parse a comma-separated list of labels.
    pub fn parse_list(labels: &str) -> Result<Vec<Self>, ConfigError> {
        labels
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| Self::from_label(l).ok_or_else(|| ConfigError::UnknownEncoding(l.to_string())))
            .collect()
    }

    /// Default candidate list: UTF-8, UTF-8 with BOM, cp1252.
    pub fn default_candidates() -> Vec<Self> {
        vec![Self::UTF8, Self::UTF8_SIG, Self::WINDOWS_1252]
    }

    /// Display label, e.g. `utf-8`, `utf-8-sig`, `windows-1252`.
    pub fn label(&self) -> String {
        if self.strip_bom {
            "utf-8-sig".to_string()
        } else {
            self.encoding.name().to_ascii_lowercase()
        }
    }

    fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }

    /// Strip a leading UTF-8 byte-order mark for UTF-8 variants.
    pub(crate) fn without_bom<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        if self.is_utf8() {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        }
    }

    /// Decode a complete byte slice, failing on any malformed sequence.
    pub(crate) fn decode_strict<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        self.encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
    }

    /// Decode a complete byte slice, replacing malformed sequences.
    pub(crate) fn decode_lossy<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        self.encoding.decode_without_bom_handling(bytes).0
    }

    /// Decode a sample that may end in the middle of a multi-byte sequence.
    ///
    /// A trailing incomplete sequence is not an error; any other malformed input is.
    fn decode_sample(&self, bytes: &[u8]) -> Option<String> {
        let bytes = if self.strip_bom {
            self.without_bom(bytes)
        } else {
            bytes
        };
        let mut decoder = self.encoding.new_decoder_without_bom_handling();
        let capacity = decoder.max_utf8_buffer_length_without_replacement(bytes.len())?;
        let mut out = String::with_capacity(capacity);
        let (result, _read) = decoder.decode_to_string_without_replacement(bytes, &mut out, false);
        match result {
            DecoderResult::InputEmpty => Some(out),
            DecoderResult::OutputFull | DecoderResult::Malformed(_, _) => None,
        }
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Field delimiter, or a request to infer it from the whole file while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// A known single-byte delimiter.
    Char(u8),
    /// Sniffing failed on the sample; the parser infers from the full file.
    Infer,
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(b'\t') => f.write_str("\\t"),
            Self::Char(b) => write!(f, "{}", *b as char),
            Self::Infer => f.write_str("infer"),
        }
    }
}

/// Result of sampling a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// `encoding` decoded the sample; `delimiter` may still be [`Delimiter::Infer`].
    Found {
        encoding: TextEncoding,
        delimiter: Delimiter,
    },
    /// No candidate encoding decoded the sample.
    NoEncoding,
}

/// Detect encoding and delimiter from the first `sample_bytes` bytes of `path`.
///
/// Only I/O problems are returned as errors; "no encoding worked" is [`Detection::NoEncoding`].
pub fn detect(
    path: impl AsRef<Path>,
    candidates: &[TextEncoding],
    sample_bytes: usize,
) -> IngestionResult<Detection> {
    let mut sample = Vec::with_capacity(sample_bytes.min(1 << 20));
    File::open(path.as_ref())?
        .take(sample_bytes as u64 + 1)
        .read_to_end(&mut sample)?;
    let truncated = sample.len() > sample_bytes;
    sample.truncate(sample_bytes);

    Ok(detect_in_sample(&sample, truncated, candidates))
}

/// Detection over an in-memory sample. `truncated` marks a sample cut short of the file end.
pub fn detect_in_sample(sample: &[u8], truncated: bool, candidates: &[TextEncoding]) -> Detection {
    for &encoding in candidates {
        let Some(text) = encoding.decode_sample(sample) else {
            debug!(encoding = %encoding, "sample does not decode");
            continue;
        };
        let delimiter = match sniff_delimiter(&text, SNIFF_DELIMITERS, truncated) {
            Some(b) => Delimiter::Char(b),
            None => Delimiter::Infer,
        };
        debug!(encoding = %encoding, delimiter = %delimiter, "detected dialect");
        return Detection::Found {
            encoding,
            delimiter,
        };
    }
    Detection::NoEncoding
}

/// Sniff the delimiter of a text sample.
///
/// The dialect scoring is done by [`csv_nose::Sniffer`] over the whole sample; a partial last line
/// of a `truncated` sample is cut first. The result is accepted only when it splits records into
/// more than one field and is one of `candidates`.
pub fn sniff_delimiter(text: &str, candidates: &[u8], truncated: bool) -> Option<u8> {
    let text = match text.rfind('\n') {
        Some(end) if truncated => &text[..=end],
        _ => text,
    };
    let mut sniffer = Sniffer::new();
    sniffer.sample_size(SampleSize::All);
    sniff_with(&sniffer, text, candidates)
}

/// Infer a delimiter from the whole file.
///
/// The sniffer never proposes `:`, so it is tried on its own when nothing else splits the text.
/// Falls back to a comma for single-column files.
pub fn infer_delimiter(text: &str) -> u8 {
    sniff_with(&Sniffer::new(), text, INFER_DELIMITERS)
        .or_else(|| sniff_with(Sniffer::new().delimiter(b':'), text, b":"))
        .unwrap_or(b',')
}

fn sniff_with(sniffer: &Sniffer, text: &str, allowed: &[u8]) -> Option<u8> {
    let metadata = sniffer
        .sniff_bytes(text.as_bytes())
        .map_err(|e| debug!(error = %e, "sniffer found no dialect"))
        .ok()?;
    let delimiter = metadata.dialect.delimiter;
    (metadata.num_fields > 1 && allowed.contains(&delimiter)).then_some(delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_each_expected_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n", SNIFF_DELIMITERS, false), Some(b','));
        assert_eq!(sniff_delimiter("a;b\n1;2\n3;4\n", SNIFF_DELIMITERS, false), Some(b';'));
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n", SNIFF_DELIMITERS, false), Some(b'\t'));
        assert_eq!(sniff_delimiter("a|b|c\n1|2|3\n", SNIFF_DELIMITERS, false), Some(b'|'));
    }

    #[test]
    fn quoted_delimiters_are_ignored() {
        let text = "name;city\n\"Nguyen, An\";Hanoi\n\"Tran, Binh\";Da Nang\n";
        assert_eq!(sniff_delimiter(text, SNIFF_DELIMITERS, false), Some(b';'));
    }

    #[test]
    fn single_column_sample_is_not_sniffed() {
        assert_eq!(sniff_delimiter("single\ncolumn\n", SNIFF_DELIMITERS, false), None);
        assert_eq!(sniff_delimiter("", SNIFF_DELIMITERS, false), None);
    }

    #[test]
    fn delimiters_outside_the_candidates_are_not_sniffed() {
        assert_eq!(sniff_delimiter("a^b^c\n1^2^3\n4^5^6\n", SNIFF_DELIMITERS, false), None);
        assert_eq!(sniff_delimiter("a;b\n1;2\n3;4\n", b",", false), None);
    }

    #[test]
    fn truncated_sample_ignores_partial_last_line() {
        let text = "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n11,12\n13,14\n15,16\n17";
        assert_eq!(sniff_delimiter(text, SNIFF_DELIMITERS, true), Some(b','));
    }

    #[test]
    fn infer_falls_back_to_comma() {
        assert_eq!(infer_delimiter("only\nones\n"), b',');
        assert_eq!(infer_delimiter("a:b\n1:2\n"), b':');
        assert_eq!(infer_delimiter("a,b\n1,2,3\n4,5\n"), b',');
    }

    #[test]
    fn sample_cut_inside_utf8_sequence_still_decodes() {
        let bytes = "a,b\nx,é".as_bytes();
        let cut = &bytes[..bytes.len() - 1];
        assert!(TextEncoding::UTF8.decode_sample(cut).is_some());
        assert!(TextEncoding::UTF8.decode_sample(b"a,b\n\xff,1\n").is_none());
    }

    #[test]
    fn labels_resolve() {
        assert_eq!(TextEncoding::from_label("UTF_8_SIG"), Some(TextEncoding::UTF8_SIG));
        assert_eq!(TextEncoding::from_label("cp1252"), Some(TextEncoding::WINDOWS_1252));
        assert_eq!(TextEncoding::from_label("utf-8"), Some(TextEncoding::UTF8));
        assert!(TextEncoding::from_label("klingon").is_none());
        assert_eq!(TextEncoding::WINDOWS_1252.label(), "windows-1252");
    }
}

//! Source file name → table name mapping.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-zA-Z_]+").expect("static pattern is valid"));

/// Convert an arbitrary name into a safe table identifier.
///
/// Every maximal run of characters outside `[0-9a-zA-Z_]` becomes a single `_`, then the result
/// is lowercased. The output only contains `[0-9a-z_]` and `sanitize(sanitize(x)) == sanitize(x)`.
///
/// ```
/// use csv_table_loader::ingestion::naming::sanitize;
///
/// assert_eq!(sanitize("Brand Image"), "brand_image");
/// assert_eq!(sanitize("Segmentation-2017 (v2)"), "segmentation_2017_v2_");
/// ```
pub fn sanitize(raw_name: &str) -> String {
    UNSAFE_RUN.replace_all(raw_name, "_").to_ascii_lowercase()
}

/// Table name for a source file: the sanitized file stem (extension stripped).
pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    sanitize(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_lowercases() {
        assert_eq!(sanitize("Survey Respondents  Info"), "survey_respondents_info");
        assert_eq!(sanitize("Day#Part"), "day_part");
        assert_eq!(sanitize("already_safe_01"), "already_safe_01");
        assert_eq!(sanitize("Café"), "caf_");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn table_name_strips_extension_only() {
        assert_eq!(table_name_for(Path::new("/data/raw/Brand Image.csv")), "brand_image");
        assert_eq!(table_name_for(Path::new("Competitor.Data.csv")), "competitor_data");
        assert_eq!(table_name_for(Path::new("Empty.CSV")), "empty");
    }
}

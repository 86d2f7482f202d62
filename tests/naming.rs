use std::path::Path;

use csv_table_loader::ingestion::{sanitize, table_name_for};
use proptest::prelude::*;

proptest! {
    #[test]
    fn output_only_contains_safe_characters(raw in "\\PC*") {
        let name = sanitize(&raw);
        prop_assert!(name.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '_'));
    }

    #[test]
    fn sanitize_is_idempotent(raw in "\\PC*") {
        let once = sanitize(&raw);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn never_longer_than_input(raw in "\\PC*") {
        prop_assert!(sanitize(&raw).len() <= raw.chars().count());
    }

    #[test]
    fn safe_names_only_change_case(raw in "[0-9a-zA-Z_]{0,40}") {
        prop_assert_eq!(sanitize(&raw), raw.to_ascii_lowercase());
    }

    #[test]
    fn unsafe_runs_become_one_underscore(left in "[a-z]{1,8}", junk in "[ .#()-]{1,6}", right in "[a-z]{1,8}") {
        let raw = format!("{left}{junk}{right}");
        prop_assert_eq!(sanitize(&raw), format!("{left}_{right}"));
    }
}

#[test]
fn survey_file_names_map_to_tables() {
    let cases = [
        ("Brand Image.csv", "brand_image"),
        ("Companion.csv", "companion"),
        ("Day-part.csv", "day_part"),
        ("Survey Respondents Info.csv", "survey_respondents_info"),
        ("NPS (2017).csv", "nps_2017_"),
    ];
    for (file, table) in cases {
        assert_eq!(table_name_for(Path::new(file)), table, "{file}");
    }
}

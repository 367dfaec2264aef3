//! Date normalization for form date fields

use chrono::NaiveDate;

/// Output format for every normalized date
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted input formats, tried in order. The first full match wins, so
/// `03/04/2024` is read month-first.
const INPUT_FORMATS: [&str; 3] = [
    "%Y-%m-%d", // 2024-03-15
    "%m/%d/%Y", // 03/15/2024
    "%d/%m/%Y", // 15/03/2024
];

/// Normalize a date cell to `YYYY-MM-DD`
///
/// Returns `None` for empty input or input matching none of the accepted
/// formats. Never fails.
pub fn normalize_date(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.format(CANONICAL_DATE_FORMAT).to_string())
}

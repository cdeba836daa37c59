//! Shared parsing helpers: text normalization, tolerant date parsing,
//! dollar-amount range parsing, and the disclosure amount bucket tables.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DATE_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})").unwrap());

static AMOUNT_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\s*([\d,]+(?:\.\d+)?)\s*(?:-|to)\s*\$?\s*([\d,]+(?:\.\d+)?)").unwrap()
});
static AMOUNT_OVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)over\s+\$?([\d,]+(?:\.\d+)?)").unwrap());
static AMOUNT_UNDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:less than|under)\s+\$?([\d,]+(?:\.\d+)?)").unwrap());
static AMOUNT_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?\s*([\d,]+(?:\.\d+)?)\s*$").unwrap());

/// Numeric and ISO date formats tried in order before the regex fallback.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
];
const MONTH_NAME_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%d %b %Y"];

/// Collapse whitespace and replace the unicode punctuation that shows up in
/// extracted PDF cells (non-breaking spaces, en/em dashes).
pub fn normalize_text(value: &str) -> String {
    let text = value
        .replace('\u{00a0}', " ")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-");
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

/// Canonical form for table column names: lower-cased, whitespace collapsed.
pub fn clean_key(value: &str) -> String {
    normalize_text(value).to_lowercase()
}

/// Parse a disclosure date string. Tries the explicit format list, then month
/// name formats, then falls back to a loose M/D/Y regex with two-digit-year
/// disambiguation (<50 -> 2000s, else 1900s).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let text = normalize_text(value);
    if text.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS.iter().chain(MONTH_NAME_FORMATS) {
        if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
            // %Y accepts bare two-digit years; leave those to the fallback
            // so the century pivot applies.
            if date.year() >= 100 {
                return Some(date);
            }
        }
    }

    if let Some(caps) = DATE_FALLBACK_RE.captures(&text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += if year < 50 { 2000 } else { 1900 };
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

fn coerce_int(value: &str) -> Option<i64> {
    value.replace(',', "").parse::<f64>().ok().map(|v| v as i64)
}

/// Parse a disclosed dollar amount into inclusive integer bounds.
///
/// Accepts an explicit low-high range, an "over $X" phrase (unbounded high),
/// an "under/less than $X" phrase, or a single dollar figure. Bounds are
/// swapped if the source lists them in reverse.
pub fn parse_amount_range(amount_text: &str) -> Option<(i64, Option<i64>)> {
    let text = normalize_text(amount_text);
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = AMOUNT_RANGE_RE.captures(&text) {
        let mut lo = coerce_int(&caps[1])?;
        let mut hi = coerce_int(&caps[2])?;
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }
        return Some((lo, Some(hi)));
    }

    if let Some(caps) = AMOUNT_UNDER_RE.captures(&text) {
        let hi = coerce_int(&caps[1])?;
        return Some((0, Some(hi)));
    }

    if let Some(caps) = AMOUNT_OVER_RE.captures(&text) {
        let lo = coerce_int(&caps[1])?;
        return Some((lo, None));
    }

    if let Some(caps) = AMOUNT_SINGLE_RE.captures(&text) {
        let value = coerce_int(&caps[1])?;
        return Some((value, Some(value)));
    }

    None
}

/// Ascending `(lo_bound, hi_bound)` bucket table for House disclosures.
/// Bounds are inclusive on both ends.
pub const HOUSE_AMOUNT_BUCKETS: &[(i64, i64)] = &[
    (0, 1_000),
    (1_000, 15_000),
    (15_000, 50_000),
    (50_000, 100_000),
    (100_000, 250_000),
    (250_000, 1_000_000_000_000),
];

/// Senate reports use a larger bucket set with offset-by-one edges.
pub const SENATE_AMOUNT_BUCKETS: &[(i64, i64)] = &[
    (0, 1_000),
    (1_001, 15_000),
    (15_001, 50_000),
    (50_001, 100_000),
    (100_001, 250_000),
    (250_001, 500_000),
    (500_001, 1_000_000),
    (1_000_001, 5_000_000),
    (5_000_001, 25_000_000),
    (25_000_001, 50_000_000),
    (50_000_001, 1_000_000_000_000),
];

/// Ordinal bucket index for a parsed `(lo, hi)` pair: the first table entry
/// that contains both bounds. Unmatched ranges fall into bucket 0.
pub fn bucket_for(buckets: &[(i64, i64)], lo: i64, hi: i64) -> usize {
    for (index, (lo_bound, hi_bound)) in buckets.iter().enumerate() {
        if lo >= *lo_bound && hi <= *hi_bound {
            return index;
        }
    }
    0
}

/// Bucket for an unbounded "over $X" range. "Over" means strictly above the
/// stated floor, so the range belongs to the first bucket starting past it;
/// a floor at or beyond the last bucket's start maps to the top bucket.
pub fn bucket_for_open(buckets: &[(i64, i64)], lo: i64) -> usize {
    buckets
        .iter()
        .position(|(lo_bound, _)| *lo_bound > lo)
        .unwrap_or(buckets.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Apple\u{00a0}Inc.\n (AAPL) "), "Apple Inc. (AAPL)");
        assert_eq!(normalize_text("$1,001 \u{2013} $15,000"), "$1,001 - $15,000");
    }

    #[test]
    fn test_clean_key() {
        assert_eq!(clean_key("Transaction\nDate "), "transaction date");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("01/15/2024"), Some(expected));
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("01-15-2024"), Some(expected));
        assert_eq!(parse_date("January 15, 2024"), Some(expected));
        assert_eq!(parse_date("Jan 15, 2024"), Some(expected));
    }

    #[test]
    fn test_two_digit_year_disambiguation() {
        assert_eq!(parse_date("3/4/95"), NaiveDate::from_ymd_opt(1995, 3, 4));
        assert_eq!(parse_date("3/4/05"), NaiveDate::from_ymd_opt(2005, 3, 4));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("pending"), None);
        assert_eq!(parse_date("13/45/2024"), None);
    }

    #[test]
    fn test_parse_amount_range_explicit() {
        assert_eq!(parse_amount_range("$1,001 - $15,000"), Some((1001, Some(15000))));
        assert_eq!(parse_amount_range("$15,001 \u{2013} $50,000"), Some((15001, Some(50000))));
        assert_eq!(parse_amount_range("1000 to 5000"), Some((1000, Some(5000))));
    }

    #[test]
    fn test_parse_amount_range_swaps_reversed_bounds() {
        assert_eq!(parse_amount_range("$50,000 - $15,001"), Some((15001, Some(50000))));
    }

    #[test]
    fn test_parse_amount_over_under_single() {
        assert_eq!(parse_amount_range("Over $1,000,000"), Some((1000000, None)));
        assert_eq!(parse_amount_range("less than $1,001"), Some((0, Some(1001))));
        assert_eq!(parse_amount_range("under $15,000"), Some((0, Some(15000))));
        assert_eq!(parse_amount_range("$100,000"), Some((100000, Some(100000))));
        assert_eq!(parse_amount_range("rental income"), None);
    }

    #[test]
    fn test_bucket_lookup() {
        assert_eq!(bucket_for(HOUSE_AMOUNT_BUCKETS, 1001, 15000), 1);
        assert_eq!(bucket_for(HOUSE_AMOUNT_BUCKETS, 15001, 50000), 2);
        assert_eq!(bucket_for(HOUSE_AMOUNT_BUCKETS, 250001, 500000), 5);
        // Unmatched ranges fall back to bucket 0.
        assert_eq!(bucket_for(HOUSE_AMOUNT_BUCKETS, 900, 2_000_000_000_000), 0);
    }

    #[test]
    fn test_bucket_monotonicity() {
        let pairs = [
            (0, 900),
            (1001, 15000),
            (15001, 50000),
            (50001, 100000),
            (100001, 250000),
            (250001, 750000),
        ];
        let mut last = 0;
        for (lo, hi) in pairs {
            let bucket = bucket_for(HOUSE_AMOUNT_BUCKETS, lo, hi);
            assert!(bucket >= last, "bucket regressed at ({lo}, {hi})");
            last = bucket;
        }
    }

    #[test]
    fn test_unbounded_ranges_bucket_above_floor() {
        assert_eq!(bucket_for_open(SENATE_AMOUNT_BUCKETS, 1_000_000), 7);
        assert_eq!(bucket_for_open(SENATE_AMOUNT_BUCKETS, 5_000_000), 8);
        assert_eq!(bucket_for_open(SENATE_AMOUNT_BUCKETS, 50_000_000), 10);
        assert_eq!(bucket_for_open(HOUSE_AMOUNT_BUCKETS, 250_000), 5);
        assert_eq!(bucket_for_open(HOUSE_AMOUNT_BUCKETS, 1_000_000), 5);
    }

    #[test]
    fn test_senate_buckets_cover_known_ranges() {
        assert_eq!(bucket_for(SENATE_AMOUNT_BUCKETS, 1001, 15000), 1);
        assert_eq!(bucket_for(SENATE_AMOUNT_BUCKETS, 500001, 1000000), 6);
        assert_eq!(bucket_for(SENATE_AMOUNT_BUCKETS, 25000001, 50000000), 9);
    }
}

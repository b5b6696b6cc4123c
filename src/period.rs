use std::sync::LazyLock;

use regex::Regex;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4}).*?(\d{4})").unwrap());
static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:->|→)\s*(\d{4})").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)JUST ADDED!|DEVELOPMENT").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Sentinel for an open-ended production range.
pub const OPEN_ENDED: &str = "now";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRange {
    pub start: Option<String>,
    pub end: String,
}

/// Pull a production-year range out of a type display name such as
/// "Golf 7 - 2012 -> 2019" or "W205 - 2018 -> ...".
///
/// Precedence, first match wins:
/// 1. two 4-digit years anywhere → [first, second]
/// 2. arrow marker followed by a year → [open, year]
/// 3. exactly one 4-digit year → [year, open]
/// 4. no year at all → fully open range
pub fn parse_year_range(type_name: &str) -> YearRange {
    if let Some(caps) = RANGE_RE.captures(type_name) {
        return YearRange {
            start: Some(caps[1].to_string()),
            end: caps[2].to_string(),
        };
    }
    if let Some(caps) = ARROW_RE.captures(type_name) {
        return YearRange {
            start: None,
            end: caps[1].to_string(),
        };
    }
    if let Some(caps) = YEAR_RE.captures(type_name) {
        return YearRange {
            start: Some(caps[1].to_string()),
            end: OPEN_ENDED.to_string(),
        };
    }
    YearRange {
        start: None,
        end: OPEN_ENDED.to_string(),
    }
}

pub fn production_year(text: &str) -> Option<i32> {
    YEAR_RE.captures(text).and_then(|c| c[1].parse().ok())
}

/// Strip marketing markers the site injects into display names and collapse
/// the leftover whitespace.
pub fn normalize_name(raw: &str) -> String {
    let stripped = MARKER_RE.replace_all(raw, "");
    SPACE_RE.replace_all(stripped.trim(), " ").to_string()
}

//! Value normalization: amounts, dates, ZIP codes, city/state/zip lines.
//!
//! Every function here returns `Option`. A value that cannot be normalized
//! is a miss for the mapper to handle, never an error.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::extract::patterns::mentions_preparer;

static MONEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?$").unwrap()
});

static MONEY_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?(\d[\d,]*)\.(\d{2})\b").unwrap()
});

static DATE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})\b").unwrap()
});

static ISO_DATE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap()
});

// Only four-digit years are trusted when scanning free text.
static DATE_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b").unwrap()
});

static CITY_STATE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)[,\s]+([A-Z]{2})\s+(\d{5})(?:-\d{4})?$").unwrap()
});

static BARE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{5})(?:-\d{4})?\b").unwrap()
});

// ═══════════════════════════════════════════
// Amounts
// ═══════════════════════════════════════════

/// Strip currency formatting and keep whole dollars: "$18,313,668.00" → "18313668".
pub fn clean_amount(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    let caps = MONEY_VALUE.captures(&stripped)?;
    let dollars: u64 = caps.get(1)?.as_str().parse().ok()?;
    Some(dollars.to_string())
}

/// Largest dollar amount appearing anywhere in `text`, as whole dollars.
pub fn largest_amount(text: &str) -> Option<String> {
    MONEY_IN_TEXT
        .captures_iter(text)
        .filter_map(|caps| {
            let dollars: u64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let cents: u64 = caps.get(2)?.as_str().parse().ok()?;
            Some((dollars, cents))
        })
        .max()
        .map(|(dollars, _)| dollars.to_string())
}

// ═══════════════════════════════════════════
// Dates
// ═══════════════════════════════════════════

/// Two-digit year expansion: years below the pivot land in the 2000s,
/// the rest in the 1900s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearPivot(pub u32);

impl Default for YearPivot {
    fn default() -> Self {
        Self(50)
    }
}

impl YearPivot {
    pub fn expand(&self, two_digit: u32) -> i32 {
        if two_digit < self.0 {
            2000 + two_digit as i32
        } else {
            1900 + two_digit as i32
        }
    }
}

/// Normalize the first date in `raw` to `MM/DD/YYYY`.
///
/// Accepts `M/D/YY`, `M-D-YYYY` and ISO `YYYY-MM-DD`, optionally followed by
/// a time. Returns `None` for anything that is not a real calendar date.
pub fn normalize_date(raw: &str, pivot: YearPivot) -> Option<String> {
    let raw = raw.trim();

    if let Some(caps) = ISO_DATE_VALUE.captures(raw) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return format_date(year, month, day);
    }

    let caps = DATE_VALUE.captures(raw)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_text = &caps[3];
    let year: i32 = if year_text.len() == 2 {
        pivot.expand(year_text.parse().ok()?)
    } else {
        year_text.parse().ok()?
    };
    format_date(year, month, day)
}

fn format_date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%m/%d/%Y").to_string())
}

/// First valid `M/D/YYYY` date in free text that is not near preparer text.
pub fn find_date_in_text(text: &str, pivot: YearPivot) -> Option<String> {
    DATE_IN_TEXT
        .find_iter(text)
        .filter(|m| !mentions_preparer(text, m.start()))
        .find_map(|m| normalize_date(m.as_str(), pivot))
}

// ═══════════════════════════════════════════
// Locations
// ═══════════════════════════════════════════

/// City, two-letter state and five-digit ZIP from a "City, ST ZIP" line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityStateZip {
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Parse "City, ST 12345-6789" (comma optional). ZIP+4 is cut to five digits.
pub fn parse_city_state_zip(raw: &str) -> Option<CityStateZip> {
    let caps = CITY_STATE_ZIP.captures(raw.trim())?;
    let city = caps[1].trim().trim_end_matches(',').trim().to_string();
    if city.is_empty() {
        return None;
    }
    Some(CityStateZip {
        city,
        state: caps[2].to_string(),
        zip: caps[3].to_string(),
    })
}

/// Five-digit ZIP from a ZIP or ZIP+4 value.
pub fn zip5(raw: &str) -> Option<String> {
    let digits: String = raw.trim().chars().take_while(char::is_ascii_digit).collect();
    (digits.len() >= 5).then(|| digits[..5].to_string())
}

/// First standalone ZIP-shaped number in free text.
pub fn find_bare_zip(text: &str) -> Option<String> {
    BARE_ZIP.captures(text).map(|caps| caps[1].to_string())
}

/// Collapse internal whitespace and trim separator debris from a name.
pub fn clean_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed
        .trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace())
        .to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

//! Ordered pattern tables for raw lien field extraction.
//!
//! Each field kind has its own list, tried top to bottom. The first pattern
//! that produces a non-empty capture wins; later patterns are never
//! consulted for that field even if they would match "better".

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::types::{RawField, RawFieldSet};

/// Characters before a lien-date candidate that are checked for preparer text.
pub const PREPARER_CONTEXT_CHARS: usize = 80;

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bLIEN\s+AMOUNT\s*[:\-]?\s*(\$?\s*\d[\d,]*(?:\.\d{1,2})?)").unwrap(),
        Regex::new(r"(?i)\bTOTAL(?:\s+AMOUNT)?(?:\s+DUE)?\s*[:\-]?\s*(\$?\s*\d[\d,]*(?:\.\d{1,2})?)").unwrap(),
        Regex::new(r"(?i)\bAMOUNT\s*[:\-]?\s*(\$?\s*\d[\d,]*(?:\.\d{1,2})?)").unwrap(),
        // Bare money value anywhere on the page
        Regex::new(r"(\$?\d[\d,]*\.\d{2})\b").unwrap(),
    ]
});

static TAXPAYER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bNAME\s+OF\s+TAXPAYER\s*[:\-]?\s*([A-Z0-9&'.,\- ]+)").unwrap(),
        Regex::new(r"(?i)\bTAXPAYER(?:'S)?\s+NAME\s*[:\-]?\s*([A-Z0-9&'.,\- ]+)").unwrap(),
        Regex::new(r"(?i)\bTAXPAYER\s*[:\-]\s*([A-Z0-9&'.,\- ]+)").unwrap(),
    ]
});

static ADDRESS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)\b(\d+[ \t]+(?:[\w.'#\-]+[ \t]+){0,5}?(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct|Place|Pl|Parkway|Pkwy|Plaza|Plz|Terrace|Ter|Highway|Hwy|Suite|Ste|Floor|Fl)\b\.?)",
        )
        .unwrap(),
    ]
});

// State codes are matched case-sensitively; "(?i)[A-Z]{2}" would accept any word.
static CITY_STATE_ZIP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"([A-Za-z][A-Za-z .'\-]*?),?[ \t]+\b([A-Z]{2})\b[ \t]+(\d{5}(?:-\d{4})?)\b").unwrap(),
    ]
});

static LIEN_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bDATE\s+OF\s+LIEN\s*[:\-]?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").unwrap(),
        Regex::new(r"(?i)\bLIEN\s+DATE\s*[:\-]?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").unwrap(),
        Regex::new(r"(?i)\b(?:FILED|RECORDED)(?:\s+ON)?\s*[:\-]?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").unwrap(),
    ]
});

static SSN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b(\d{3}-\d{2}-\d{4})\b").unwrap(),
        Regex::new(r"(?i)\b(XXX-XX-\d{4})\b").unwrap(),
    ]
});

static EIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"\b(\d{2}-\d{7})\b").unwrap()]
});

fn patterns_for(field: RawField) -> &'static [Regex] {
    match field {
        RawField::Amount => AMOUNT_PATTERNS.as_slice(),
        RawField::TaxpayerName => TAXPAYER_PATTERNS.as_slice(),
        RawField::Address => ADDRESS_PATTERNS.as_slice(),
        RawField::CityStateZip => CITY_STATE_ZIP_PATTERNS.as_slice(),
        RawField::LienDate => LIEN_DATE_PATTERNS.as_slice(),
        RawField::Ssn => SSN_PATTERNS.as_slice(),
        RawField::Ein => EIN_PATTERNS.as_slice(),
    }
}

/// Stateless extractor over the static pattern tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Run every field's pattern list over `text`.
    pub fn extract(&self, text: &str) -> RawFieldSet {
        let mut fields = RawFieldSet::new();
        for field in RawField::all() {
            if let Some(value) = self.extract_field(text, *field) {
                fields.insert(*field, value);
            }
        }
        tracing::debug!(found = fields.len(), "Pattern extraction complete");
        fields
    }

    /// First non-empty match for one field kind, or `None`.
    ///
    /// City/state/ZIP is scanned with the street address blanked out, so a
    /// one-line address does not leak street words into the city.
    pub fn extract_field(&self, text: &str, field: RawField) -> Option<String> {
        if field == RawField::CityStateZip {
            if let Some(street) = ADDRESS_PATTERNS.iter().find_map(|p| p.find(text)) {
                let masked = format!("{}\n{}", &text[..street.start()], &text[street.end()..]);
                return scan(&masked, field);
            }
        }
        scan(text, field)
    }
}

/// Ordered scan over one field's patterns; the first usable match wins.
fn scan(text: &str, field: RawField) -> Option<String> {
    for pattern in patterns_for(field) {
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if field == RawField::LienDate && mentions_preparer(text, whole.start()) {
                tracing::debug!(
                    candidate = whole.as_str(),
                    "Rejected lien date near preparer text"
                );
                continue;
            }
            let value = joined_captures(&caps);
            if !value.is_empty() {
                return Some(value);
            }
            // Only the first match of a pattern counts unless it was filtered.
            break;
        }
    }
    None
}

/// Capture groups joined with single spaces and trimmed.
/// Falls back to the whole match for patterns without groups.
fn joined_captures(caps: &Captures<'_>) -> String {
    let groups: Vec<&str> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    if groups.is_empty() && caps.len() == 1 {
        return caps.get(0).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    }
    groups.join(" ").trim().to_string()
}

/// True when the text just before `match_start` mentions PREPARED/PREPARER.
pub fn mentions_preparer(text: &str, match_start: usize) -> bool {
    let window = preceding_window(text, match_start, PREPARER_CONTEXT_CHARS).to_uppercase();
    window.contains("PREPARED") || window.contains("PREPARER")
}

/// Up to `chars` characters ending at byte offset `end`, on char boundaries.
fn preceding_window(text: &str, end: usize, chars: usize) -> &str {
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &head[start..]
}

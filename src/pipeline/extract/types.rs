//! Boundary types between scraper collaborators and the extraction pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════
// Raw field kinds
// ═══════════════════════════════════════════

/// Field kinds the pattern extractor knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawField {
    Amount,
    TaxpayerName,
    Address,
    CityStateZip,
    LienDate,
    Ssn,
    Ein,
}

impl RawField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::TaxpayerName => "taxpayer_name",
            Self::Address => "address",
            Self::CityStateZip => "city_state_zip",
            Self::LienDate => "lien_date",
            Self::Ssn => "ssn",
            Self::Ein => "ein",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "amount" => Some(Self::Amount),
            "taxpayer_name" => Some(Self::TaxpayerName),
            "address" => Some(Self::Address),
            "city_state_zip" => Some(Self::CityStateZip),
            "lien_date" => Some(Self::LienDate),
            "ssn" => Some(Self::Ssn),
            "ein" => Some(Self::Ein),
            _ => None,
        }
    }

    pub fn all() -> &'static [RawField] {
        &[
            Self::Amount,
            Self::TaxpayerName,
            Self::Address,
            Self::CityStateZip,
            Self::LienDate,
            Self::Ssn,
            Self::Ein,
        ]
    }
}

impl std::fmt::Display for RawField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// RawFieldSet
// ═══════════════════════════════════════════

/// Field candidates extracted from one document. Values are raw strings:
/// currency symbols, commas and original casing are left for the mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFieldSet {
    fields: BTreeMap<RawField, String>,
}

impl RawFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for callers that already hold candidates.
    pub fn with(mut self, field: RawField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: RawField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: RawField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: RawField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RawField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

// ═══════════════════════════════════════════
// RawDocument
// ═══════════════════════════════════════════

/// One candidate lien document as produced by a scrape/OCR collaborator.
///
/// `result_date` comes from a search-results table, `recorder_date` from a
/// recorder stamp; both outrank any date found by scanning `raw_text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub raw_text: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub result_date: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub recorder_date: Option<String>,
    /// True when `raw_text` came from OCR rather than an embedded text layer.
    #[serde(default)]
    pub ocr: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("pdf_url is not an http(s) URL: {0}")]
    BadUrl(String),
}

/// Scrapers emit `""` for an empty results cell; treat it as absent.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl RawDocument {
    pub fn from_text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }

    /// Boundary check applied before a document enters the pipeline.
    ///
    /// Blank dates are not an error: the mapper falls through to the next
    /// date source when a supplied one does not parse.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if let Some(url) = &self.pdf_url {
            let lower = url.trim().to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(DocumentError::BadUrl(url.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_field_roundtrip() {
        for field in RawField::all() {
            assert_eq!(RawField::from_str(field.as_str()), Some(*field));
        }
        assert_eq!(RawField::from_str("phone"), None);
    }

    #[test]
    fn field_set_builder() {
        let set = RawFieldSet::new()
            .with(RawField::Amount, "$1,000.00")
            .with(RawField::TaxpayerName, "JANE DOE");
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(RawField::Amount), Some("$1,000.00"));
        assert!(!set.contains(RawField::Ssn));
    }

    #[test]
    fn document_deserializes_with_defaults() {
        let doc: RawDocument = serde_json::from_str(r#"{"raw_text": "NOTICE"}"#).unwrap();
        assert_eq!(doc.raw_text, "NOTICE");
        assert!(doc.pdf_url.is_none());
        assert!(!doc.ocr);
    }

    #[test]
    fn document_rejects_non_http_url() {
        let doc = RawDocument {
            pdf_url: Some("file:///etc/passwd".into()),
            ..RawDocument::from_text("x")
        };
        assert!(matches!(doc.validate(), Err(DocumentError::BadUrl(_))));
    }

    #[test]
    fn document_accepts_blank_dates() {
        let doc = RawDocument {
            result_date: Some("  ".into()),
            recorder_date: Some(String::new()),
            ..RawDocument::from_text("x")
        };
        assert_eq!(doc.validate(), Ok(()));
    }

    #[test]
    fn blank_dates_deserialize_as_absent() {
        let doc: RawDocument = serde_json::from_str(
            r#"{"raw_text": "NOTICE", "result_date": "", "recorder_date": "01/05/2024"}"#,
        )
        .unwrap();
        assert!(doc.result_date.is_none());
        assert_eq!(doc.recorder_date.as_deref(), Some("01/05/2024"));
    }

    #[test]
    fn document_accepts_https_url() {
        let doc = RawDocument {
            pdf_url: Some("https://a836-acris.nyc.gov/DS/DocumentSearch/GetImage?doc_id=1".into()),
            result_date: Some("01/05/2024".into()),
            ..RawDocument::from_text("x")
        };
        assert!(doc.validate().is_ok());
    }
}

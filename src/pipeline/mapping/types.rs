//! Canonical lien record types.
//!
//! A `MappedRecord` always holds exactly one `MappedField` per canonical
//! column. Missing data is a field with `value = None` and confidence 0.0.

use serde::{Deserialize, Serialize};

/// Number of canonical output columns.
pub const COLUMN_COUNT: usize = 14;

/// Lead source code stamped on every record.
pub const LEAD_SOURCE: &str = "777";

// ═══════════════════════════════════════════
// Field provenance
// ═══════════════════════════════════════════

/// Where a mapped value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    PdfText,
    Ocr,
    Inferred,
    Manual,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfText => "pdf_text",
            Self::Ocr => "ocr",
            Self::Inferred => "inferred",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pdf_text" => Some(Self::PdfText),
            "ocr" => Some(Self::Ocr),
            "inferred" => Some(Self::Inferred),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Canonical columns
// ═══════════════════════════════════════════

/// The fourteen canonical columns, in persisted-store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LienField {
    SiteId,
    LienOrReceiveDate,
    Amount,
    LeadType,
    LeadSource,
    LiabilityType,
    BusinessPersonal,
    Company,
    FirstName,
    LastName,
    Street,
    City,
    State,
    Zip,
}

impl LienField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteId => "site_id",
            Self::LienOrReceiveDate => "lien_or_receive_date",
            Self::Amount => "amount",
            Self::LeadType => "lead_type",
            Self::LeadSource => "lead_source",
            Self::LiabilityType => "liability_type",
            Self::BusinessPersonal => "business_personal",
            Self::Company => "company",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Street => "street",
            Self::City => "city",
            Self::State => "state",
            Self::Zip => "zip",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.as_str() == s)
    }

    /// Header text used by the persisted store.
    pub fn header(&self) -> &'static str {
        match self {
            Self::SiteId => "Site Id",
            Self::LienOrReceiveDate => "LienOrReceiveDate",
            Self::Amount => "Amount",
            Self::LeadType => "LeadType",
            Self::LeadSource => "LeadSource",
            Self::LiabilityType => "LiabilityType",
            Self::BusinessPersonal => "BusinessPersonal",
            Self::Company => "Company",
            Self::FirstName => "FirstName",
            Self::LastName => "LastName",
            Self::Street => "Street",
            Self::City => "City",
            Self::State => "State",
            Self::Zip => "Zip",
        }
    }

    /// Zero-based column position.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn all() -> &'static [LienField; COLUMN_COUNT] {
        &[
            Self::SiteId,
            Self::LienOrReceiveDate,
            Self::Amount,
            Self::LeadType,
            Self::LeadSource,
            Self::LiabilityType,
            Self::BusinessPersonal,
            Self::Company,
            Self::FirstName,
            Self::LastName,
            Self::Street,
            Self::City,
            Self::State,
            Self::Zip,
        ]
    }

    /// Every column except `site_id`: the fields the verifier scores.
    pub fn data_fields() -> &'static [LienField] {
        &Self::all()[1..]
    }
}

impl std::fmt::Display for LienField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header row of the persisted store.
pub fn canonical_headers() -> Vec<String> {
    LienField::all().iter().map(|f| f.header().to_string()).collect()
}

// ═══════════════════════════════════════════
// Enumerated column values
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadType {
    Lien,
    Release,
    #[serde(rename = "UCC")]
    Ucc,
    Mechanic,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lien => "Lien",
            Self::Release => "Release",
            Self::Ucc => "UCC",
            Self::Mechanic => "Mechanic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Lien" => Some(Self::Lien),
            "Release" => Some(Self::Release),
            "UCC" => Some(Self::Ucc),
            "Mechanic" => Some(Self::Mechanic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiabilityType {
    #[serde(rename = "IRS")]
    Irs,
    State,
    Local,
}

impl LiabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Irs => "IRS",
            Self::State => "State",
            Self::Local => "Local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IRS" => Some(Self::Irs),
            "State" => Some(Self::State),
            "Local" => Some(Self::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessPersonal {
    Business,
    Personal,
    Unknown,
}

impl BusinessPersonal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "Business",
            Self::Personal => "Personal",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Business" => Some(Self::Business),
            "Personal" => Some(Self::Personal),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════
// MappedField / MappedRecord
// ═══════════════════════════════════════════

/// One canonical value with its extraction certainty and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedField {
    pub value: Option<String>,
    pub confidence: f32,
    pub source: FieldSource,
    pub note: Option<String>,
}

impl MappedField {
    /// Confidence is clamped into [0, 1].
    pub fn new(value: impl Into<String>, confidence: f32, source: FieldSource) -> Self {
        Self {
            value: Some(value.into()),
            confidence: clamp_confidence(confidence),
            source,
            note: None,
        }
    }

    /// Value fixed by site configuration or by construction.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::new(value, 1.0, FieldSource::Inferred)
    }

    /// Deliberately blank, e.g. first/last name on a business record.
    pub fn not_applicable() -> Self {
        Self::fixed("")
    }

    /// Absent data: no value, zero confidence.
    pub fn missing(note: impl Into<String>) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            source: FieldSource::Manual,
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// A standardized lien record: one `MappedField` per canonical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRecord {
    site: String,
    fields: [MappedField; COLUMN_COUNT],
}

impl MappedRecord {
    /// `fields` are in `LienField::all()` order.
    pub fn new(site: impl Into<String>, fields: [MappedField; COLUMN_COUNT]) -> Self {
        Self {
            site: site.into(),
            fields,
        }
    }

    /// A record where every column is missing.
    pub fn empty(site: impl Into<String>) -> Self {
        Self::new(
            site,
            std::array::from_fn(|_| MappedField::missing("No data extracted")),
        )
    }

    /// Copy with one column replaced.
    pub fn with_field(mut self, field: LienField, value: MappedField) -> Self {
        self.fields[field.index()] = value;
        self
    }

    /// Configured site key (e.g. "nyc_acris").
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn field(&self, field: LienField) -> &MappedField {
        &self.fields[field.index()]
    }

    pub fn value(&self, field: LienField) -> Option<&str> {
        self.field(field).value()
    }

    pub fn fields(&self) -> impl Iterator<Item = (LienField, &MappedField)> {
        LienField::all().iter().copied().zip(self.fields.iter())
    }

    /// Column values in canonical order, `None` where absent.
    pub fn to_row(&self) -> [Option<String>; COLUMN_COUNT] {
        std::array::from_fn(|i| self.fields[i].value.clone())
    }

    /// Column values as persisted-store cells (absent becomes "").
    pub fn to_cells(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.value.clone().unwrap_or_default())
            .collect()
    }
}

/// Fixed per-site attributes the mapper stamps on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub key: String,
    pub site_id: String,
    pub liability_type: LiabilityType,
}

impl SiteMetadata {
    pub fn new(key: impl Into<String>, site_id: impl Into<String>, liability_type: LiabilityType) -> Self {
        Self {
            key: key.into(),
            site_id: site_id.into(),
            liability_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_in_store_order() {
        let headers = canonical_headers();
        assert_eq!(headers.len(), COLUMN_COUNT);
        assert_eq!(headers[0], "Site Id");
        assert_eq!(headers[2], "Amount");
        assert_eq!(headers[9], "LastName");
        assert_eq!(headers[13], "Zip");
        for (i, field) in LienField::all().iter().enumerate() {
            assert_eq!(field.index(), i);
            assert_eq!(LienField::from_str(field.as_str()), Some(*field));
        }
    }

    #[test]
    fn data_fields_exclude_site_id() {
        let data = LienField::data_fields();
        assert_eq!(data.len(), 13);
        assert!(!data.contains(&LienField::SiteId));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(MappedField::new("x", 1.7, FieldSource::Inferred).confidence, 1.0);
        assert_eq!(MappedField::new("x", -0.2, FieldSource::Inferred).confidence, 0.0);
        assert_eq!(MappedField::new("x", f32::NAN, FieldSource::Inferred).confidence, 0.0);
    }

    #[test]
    fn empty_record_has_fourteen_absent_values() {
        let record = MappedRecord::empty("nyc_acris");
        let row = record.to_row();
        assert_eq!(row.len(), COLUMN_COUNT);
        assert!(row.iter().all(Option::is_none));
        assert!(record.fields().all(|(_, f)| f.confidence == 0.0));
        assert_eq!(record.to_cells(), vec![String::new(); COLUMN_COUNT]);
    }

    #[test]
    fn with_field_replaces_one_column() {
        let record = MappedRecord::empty("cook_county")
            .with_field(LienField::Amount, MappedField::new("5000", 0.9, FieldSource::PdfText));
        assert_eq!(record.value(LienField::Amount), Some("5000"));
        assert_eq!(record.to_row()[2].as_deref(), Some("5000"));
        assert!(record.field(LienField::Zip).is_missing());
    }

    #[test]
    fn enum_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&LiabilityType::Irs).unwrap(), "\"IRS\"");
        assert_eq!(serde_json::to_string(&LeadType::Ucc).unwrap(), "\"UCC\"");
        assert_eq!(serde_json::to_string(&FieldSource::PdfText).unwrap(), "\"pdf_text\"");
        let parsed: LiabilityType = serde_json::from_str("\"State\"").unwrap();
        assert_eq!(parsed, LiabilityType::State);
    }
}

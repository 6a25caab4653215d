//! Field Mapper: raw candidates plus site metadata into a canonical record.
//!
//! Every column gets an explicit value, confidence and provenance. Values
//! taken straight from labeled text score higher than values inferred by
//! scanning the page, and structured collaborator data (recorder stamps,
//! results-table dates) outranks both.

use crate::pipeline::extract::{PatternExtractor, RawDocument, RawField, RawFieldSet};

use super::classify::{classify_name, detect_lead_type, name_tokens};
use super::normalize::{
    clean_amount, clean_name, find_bare_zip, find_date_in_text, largest_amount,
    normalize_date, parse_city_state_zip, zip5, YearPivot,
};
use super::types::*;

/// Confidence assigned to each mapping path.
pub mod confidence {
    pub const RECORDER_DATE: f32 = 0.95;
    pub const RESULT_TABLE_DATE: f32 = 0.90;
    pub const LABELED_DATE: f32 = 0.85;
    pub const SCANNED_DATE: f32 = 0.70;

    pub const DIRECT_AMOUNT: f32 = 0.90;
    pub const LARGEST_AMOUNT: f32 = 0.75;

    pub const UNKNOWN_NAME: f32 = 0.30;
    pub const COMPANY: f32 = 0.80;
    pub const PERSON_NAME: f32 = 0.70;
    pub const SINGLE_NAME: f32 = 0.50;

    pub const DIRECT_STREET: f32 = 0.80;
    pub const SCANNED_STREET: f32 = 0.65;

    pub const DIRECT_CITY: f32 = 0.75;
    pub const DIRECT_STATE: f32 = 0.80;
    pub const DIRECT_ZIP: f32 = 0.85;
    pub const SCANNED_CITY: f32 = 0.65;
    pub const SCANNED_STATE: f32 = 0.70;
    pub const SCANNED_ZIP: f32 = 0.70;
    pub const BARE_ZIP: f32 = 0.60;
}

/// Maps one document's raw fields into a `MappedRecord`.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    pivot: YearPivot,
    extractor: PatternExtractor,
}

impl FieldMapper {
    pub fn new(pivot: YearPivot) -> Self {
        Self {
            pivot,
            extractor: PatternExtractor::new(),
        }
    }

    pub fn map(
        &self,
        raw: &RawFieldSet,
        document: &RawDocument,
        site: &SiteMetadata,
    ) -> MappedRecord {
        let text = document.raw_text.as_str();
        let direct = if document.ocr {
            FieldSource::Ocr
        } else {
            FieldSource::PdfText
        };

        let date = self.map_date(raw, document, direct);
        let amount = map_amount(raw, text, direct);
        let names = map_names(raw, text, direct);
        let street = self.map_street(raw, text, direct);
        let location = self.map_location(raw, text, direct);

        let record = MappedRecord::new(
            site.key.clone(),
            [
                MappedField::fixed(site.site_id.clone()),
                date,
                amount,
                MappedField::fixed(detect_lead_type(text).as_str()),
                MappedField::fixed(LEAD_SOURCE),
                MappedField::fixed(site.liability_type.as_str()),
                names.business_personal,
                names.company,
                names.first_name,
                names.last_name,
                street,
                location.city,
                location.state,
                location.zip,
            ],
        );

        tracing::debug!(
            site = %site.key,
            missing = record.fields().filter(|(_, f)| f.is_missing()).count(),
            "Mapped lien record"
        );
        record
    }

    fn map_date(&self, raw: &RawFieldSet, document: &RawDocument, direct: FieldSource) -> MappedField {
        if let Some(date) = document
            .recorder_date
            .as_deref()
            .and_then(|d| normalize_date(d, self.pivot))
        {
            return MappedField::new(date, confidence::RECORDER_DATE, direct)
                .with_note("Recorder stamp date");
        }

        if let Some(date) = document
            .result_date
            .as_deref()
            .and_then(|d| normalize_date(d, self.pivot))
        {
            return MappedField::new(date, confidence::RESULT_TABLE_DATE, FieldSource::Inferred)
                .with_note("Filing date from search results");
        }

        if let Some(date) = raw
            .get(RawField::LienDate)
            .and_then(|d| normalize_date(d, self.pivot))
        {
            return MappedField::new(date, confidence::LABELED_DATE, direct);
        }

        match find_date_in_text(&document.raw_text, self.pivot) {
            Some(date) => MappedField::new(date, confidence::SCANNED_DATE, FieldSource::Inferred)
                .with_note("Unlabeled date found in text"),
            None => MappedField::missing("Date not found - manual review required"),
        }
    }

    fn map_street(&self, raw: &RawFieldSet, text: &str, direct: FieldSource) -> MappedField {
        if let Some(street) = raw.get(RawField::Address).and_then(clean_name) {
            return MappedField::new(street, confidence::DIRECT_STREET, direct);
        }
        match self
            .extractor
            .extract_field(text, RawField::Address)
            .and_then(|s| clean_name(&s))
        {
            Some(street) => MappedField::new(street, confidence::SCANNED_STREET, FieldSource::Inferred)
                .with_note("Street matched from unlabeled text"),
            None => MappedField::missing("Street address not found"),
        }
    }

    fn map_location(&self, raw: &RawFieldSet, text: &str, direct: FieldSource) -> Location {
        if let Some(csz) = raw.get(RawField::CityStateZip).and_then(parse_city_state_zip) {
            return Location {
                city: MappedField::new(csz.city, confidence::DIRECT_CITY, direct),
                state: MappedField::new(csz.state, confidence::DIRECT_STATE, direct),
                zip: MappedField::new(csz.zip, confidence::DIRECT_ZIP, direct),
            };
        }

        if let Some(csz) = self
            .extractor
            .extract_field(text, RawField::CityStateZip)
            .and_then(|line| parse_city_state_zip(&line))
        {
            return Location {
                city: MappedField::new(csz.city, confidence::SCANNED_CITY, FieldSource::Inferred),
                state: MappedField::new(csz.state, confidence::SCANNED_STATE, FieldSource::Inferred),
                zip: MappedField::new(csz.zip, confidence::SCANNED_ZIP, FieldSource::Inferred),
            };
        }

        let zip = match find_bare_zip(text).and_then(|z| zip5(&z)) {
            Some(zip) => MappedField::new(zip, confidence::BARE_ZIP, FieldSource::Inferred)
                .with_note("ZIP inferred from a bare 5-digit number"),
            None => MappedField::missing("ZIP code not found"),
        };
        Location {
            city: MappedField::missing("City not found"),
            state: MappedField::missing("State not found"),
            zip,
        }
    }
}

struct Location {
    city: MappedField,
    state: MappedField,
    zip: MappedField,
}

struct Names {
    business_personal: MappedField,
    company: MappedField,
    first_name: MappedField,
    last_name: MappedField,
}

fn map_amount(raw: &RawFieldSet, text: &str, direct: FieldSource) -> MappedField {
    if let Some(amount) = raw.get(RawField::Amount).and_then(clean_amount) {
        return MappedField::new(amount, confidence::DIRECT_AMOUNT, direct);
    }
    match largest_amount(text) {
        Some(amount) => MappedField::new(amount, confidence::LARGEST_AMOUNT, FieldSource::Inferred)
            .with_note("Largest dollar amount on the page"),
        None => MappedField::missing("Amount not found - manual review required"),
    }
}

fn map_names(raw: &RawFieldSet, text: &str, direct: FieldSource) -> Names {
    let Some(name) = raw.get(RawField::TaxpayerName).and_then(clean_name) else {
        return Names {
            business_personal: MappedField::new(
                BusinessPersonal::Unknown.as_str(),
                confidence::UNKNOWN_NAME,
                FieldSource::Manual,
            )
            .with_note("No taxpayer name found"),
            company: MappedField::missing("Taxpayer name not found"),
            first_name: MappedField::missing("Taxpayer name not found"),
            last_name: MappedField::missing("Taxpayer name not found"),
        };
    };

    let class = classify_name(&name, text);
    let business_personal = MappedField::new(class.kind.as_str(), class.confidence, FieldSource::Inferred)
        .with_note(class.reason);

    if class.kind == BusinessPersonal::Business {
        return Names {
            business_personal,
            company: MappedField::new(name, confidence::COMPANY, direct),
            first_name: MappedField::not_applicable(),
            last_name: MappedField::not_applicable(),
        };
    }

    let tokens = name_tokens(&name);
    let (first_name, last_name) = match tokens.as_slice() {
        [first, .., last] => (
            MappedField::new(*first, confidence::PERSON_NAME, FieldSource::Inferred),
            MappedField::new(*last, confidence::PERSON_NAME, FieldSource::Inferred),
        ),
        [only] => (
            MappedField::missing("Single-token name; first name unknown"),
            MappedField::new(*only, confidence::SINGLE_NAME, FieldSource::Inferred),
        ),
        [] => (
            MappedField::missing("Taxpayer name not found"),
            MappedField::missing("Taxpayer name not found"),
        ),
    };

    Names {
        business_personal,
        company: MappedField::not_applicable(),
        first_name,
        last_name,
    }
}

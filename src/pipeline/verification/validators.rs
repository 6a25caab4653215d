//! Per-field validation rules.
//!
//! A validator only judges rule conformance. Confidence adjustment and
//! aggregation happen in the verifier.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::mapping::{BusinessPersonal, LeadType, LiabilityType, LienField, LEAD_SOURCE};

use super::types::{MAX_PLAUSIBLE_AMOUNT, MIN_PLAUSIBLE_AMOUNT};

static DATE_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static STATE_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());
static ZIP_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());

/// Result of one validator before confidence adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl FieldCheck {
    fn ok() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    fn invalid(issue: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            issues: vec![issue.into()],
            suggestions: vec![suggestion.into()],
        }
    }

    /// Valid value with a concern worth showing the operator.
    fn flagged(issue: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            ..Self::invalid(issue, suggestion)
        }
    }

    fn push(&mut self, issue: impl Into<String>, suggestion: impl Into<String>) {
        self.is_valid = false;
        self.issues.push(issue.into());
        self.suggestions.push(suggestion.into());
    }
}

/// Run the validator for `field`. Empty strings count as missing except for
/// columns where blank is a legitimate value (company, first/last name).
pub fn validate_field(field: LienField, value: Option<&str>) -> FieldCheck {
    let present = value.filter(|v| !v.trim().is_empty());
    match field {
        LienField::SiteId => FieldCheck::ok(),
        LienField::LienOrReceiveDate => validate_date(present),
        LienField::Amount => validate_amount(present),
        LienField::LeadType => validate_lead_type(value),
        LienField::LeadSource => validate_lead_source(value),
        LienField::LiabilityType => validate_liability_type(value),
        LienField::BusinessPersonal => validate_business_personal(value),
        LienField::Company => FieldCheck::ok(),
        LienField::FirstName | LienField::LastName => validate_name(present),
        LienField::Street => validate_street(present),
        LienField::City => validate_city(present),
        LienField::State => validate_state(present),
        LienField::Zip => validate_zip(present),
    }
}

fn validate_date(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::invalid("Date is missing", "Check PDF for filing date"),
        Some(v) if !DATE_FORMAT.is_match(v) => FieldCheck::invalid(
            format!("Date format invalid: {v}"),
            "Expected format: MM/DD/YYYY",
        ),
        Some(_) => FieldCheck::ok(),
    }
}

fn validate_amount(value: Option<&str>) -> FieldCheck {
    let Some(v) = value else {
        return FieldCheck::invalid("Amount is missing", "Check PDF for lien amount");
    };
    match v.parse::<u64>() {
        Ok(amount) if amount < MIN_PLAUSIBLE_AMOUNT => FieldCheck::flagged(
            format!("Amount seems low: ${amount}"),
            "Verify this is the total lien amount",
        ),
        Ok(amount) if amount > MAX_PLAUSIBLE_AMOUNT => FieldCheck::flagged(
            format!("Amount seems very high: ${amount}"),
            "Verify decimal placement",
        ),
        Ok(_) => FieldCheck::ok(),
        Err(_) => FieldCheck::invalid(
            format!("Amount is not numeric: {v}"),
            "Remove any non-numeric characters",
        ),
    }
}

fn validate_lead_type(value: Option<&str>) -> FieldCheck {
    if value.and_then(LeadType::from_str).is_some() {
        return FieldCheck::ok();
    }
    FieldCheck::invalid(
        format!("Unknown lead type: {}", value.unwrap_or("")),
        "Expected one of: Lien, Release, UCC, Mechanic",
    )
}

fn validate_lead_source(value: Option<&str>) -> FieldCheck {
    if value == Some(LEAD_SOURCE) {
        return FieldCheck::ok();
    }
    FieldCheck::invalid(
        format!("Lead source is not {LEAD_SOURCE}: {}", value.unwrap_or("")),
        format!("Lead source should always be {LEAD_SOURCE}"),
    )
}

fn validate_liability_type(value: Option<&str>) -> FieldCheck {
    if value.and_then(LiabilityType::from_str).is_some() {
        return FieldCheck::ok();
    }
    FieldCheck::invalid(
        format!("Unknown liability type: {}", value.unwrap_or("")),
        "Expected one of: IRS, State, Local",
    )
}

fn validate_business_personal(value: Option<&str>) -> FieldCheck {
    match value.and_then(BusinessPersonal::from_str) {
        Some(BusinessPersonal::Unknown) => FieldCheck::flagged(
            "Could not determine Business/Personal",
            "Review taxpayer name for business indicators (INC, LLC, etc.)",
        ),
        Some(_) => FieldCheck::ok(),
        None => FieldCheck::invalid(
            format!("Unknown classification: {}", value.unwrap_or("")),
            "Expected: Business, Personal, or Unknown",
        ),
    }
}

fn validate_name(value: Option<&str>) -> FieldCheck {
    let mut check = FieldCheck::ok();
    if let Some(v) = value {
        if v.chars().count() < 2 {
            check.push(
                format!("Name seems too short: {v}"),
                "Verify name extraction from taxpayer field",
            );
        }
        if v.chars().any(|c| c.is_ascii_digit()) {
            check.push(
                format!("Name contains numbers: {v}"),
                "Remove numeric characters from name",
            );
        }
    }
    check
}

fn validate_street(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::invalid("Street address is missing", "Check PDF for address block"),
        Some(v) if !v.starts_with(|c: char| c.is_ascii_digit()) => FieldCheck::flagged(
            "Street address may be missing number",
            "Verify complete address extraction",
        ),
        Some(_) => FieldCheck::ok(),
    }
}

fn validate_city(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::invalid("City is missing", "Check address block in PDF"),
        Some(v) if v.chars().count() < 2 => FieldCheck::invalid(
            format!("City name seems too short: {v}"),
            "Verify city extraction",
        ),
        Some(_) => FieldCheck::ok(),
    }
}

fn validate_state(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::invalid("State is missing", "Check address block in PDF"),
        Some(v) if !STATE_FORMAT.is_match(v) => FieldCheck::invalid(
            format!("State format invalid: {v}"),
            "Expected 2-letter state code (e.g., NY, CA, IL)",
        ),
        Some(_) => FieldCheck::ok(),
    }
}

fn validate_zip(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::invalid("ZIP code is missing", "Check address block in PDF"),
        Some(v) if !ZIP_FORMAT.is_match(v) => FieldCheck::invalid(
            format!("ZIP format invalid: {v}"),
            "Expected 5-digit or ZIP+4 format",
        ),
        Some(_) => FieldCheck::ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(field: LienField, value: &str) -> FieldCheck {
        validate_field(field, Some(value))
    }

    #[test]
    fn date_rules() {
        assert!(check(LienField::LienOrReceiveDate, "01/05/2024").is_valid);
        assert!(!check(LienField::LienOrReceiveDate, "1/5/2024").is_valid);
        let missing = validate_field(LienField::LienOrReceiveDate, None);
        assert!(!missing.is_valid);
        assert_eq!(missing.issues, vec!["Date is missing"]);
    }

    #[test]
    fn amount_out_of_range_is_valid_but_flagged() {
        let low = check(LienField::Amount, "250");
        assert!(low.is_valid);
        assert_eq!(low.suggestions, vec!["Verify this is the total lien amount"]);

        let high = check(LienField::Amount, "250000000");
        assert!(high.is_valid);
        assert_eq!(high.suggestions, vec!["Verify decimal placement"]);

        let fine = check(LienField::Amount, "18313668");
        assert!(fine.is_valid && fine.issues.is_empty());
    }

    #[test]
    fn amount_must_be_integer() {
        assert!(!check(LienField::Amount, "1,000").is_valid);
        assert!(!check(LienField::Amount, "1000.50").is_valid);
        assert!(!validate_field(LienField::Amount, Some("  ")).is_valid);
    }

    #[test]
    fn enumerated_columns() {
        assert!(check(LienField::LeadType, "UCC").is_valid);
        assert!(!check(LienField::LeadType, "lien").is_valid);
        assert!(check(LienField::LeadSource, "777").is_valid);
        assert!(!check(LienField::LeadSource, "0777").is_valid);
        assert!(check(LienField::LiabilityType, "Local").is_valid);
        assert!(!validate_field(LienField::LiabilityType, None).is_valid);
    }

    #[test]
    fn unknown_classification_is_valid_with_issue() {
        let unknown = check(LienField::BusinessPersonal, "Unknown");
        assert!(unknown.is_valid);
        assert_eq!(unknown.issues.len(), 1);
        assert!(check(LienField::BusinessPersonal, "Personal").issues.is_empty());
        assert!(!check(LienField::BusinessPersonal, "Corp").is_valid);
    }

    #[test]
    fn name_rules() {
        assert!(check(LienField::FirstName, "Jo").is_valid);
        assert!(check(LienField::LastName, "").is_valid);
        assert!(validate_field(LienField::LastName, None).is_valid);
        let bad = check(LienField::FirstName, "J");
        assert!(!bad.is_valid);
        let both = check(LienField::LastName, "7");
        assert_eq!(both.issues.len(), 2);
    }

    #[test]
    fn street_without_number_is_flagged_not_invalid() {
        let flagged = check(LienField::Street, "MAIN STREET");
        assert!(flagged.is_valid);
        assert_eq!(flagged.issues, vec!["Street address may be missing number"]);
        assert!(check(LienField::Street, "123 MAIN STREET").issues.is_empty());
        assert!(!validate_field(LienField::Street, None).is_valid);
    }

    #[test]
    fn location_rules() {
        assert!(!validate_field(LienField::City, None).is_valid);
        assert!(!check(LienField::City, "X").is_valid);
        assert!(check(LienField::State, "NY").is_valid);
        assert!(!check(LienField::State, "ny").is_valid);
        assert!(!check(LienField::State, "NYC").is_valid);
        assert!(check(LienField::Zip, "11201").is_valid);
        assert!(check(LienField::Zip, "11201-1234").is_valid);
        assert!(!check(LienField::Zip, "1120").is_valid);
    }

    #[test]
    fn company_always_valid() {
        assert!(check(LienField::Company, "").is_valid);
        assert!(validate_field(LienField::Company, None).is_valid);
    }
}

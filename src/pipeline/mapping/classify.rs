//! Rule-based classification of taxpayer names and filing types.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{BusinessPersonal, LeadType};

/// Name tokens that mark a business taxpayer. Matched as whole tokens after
/// periods are removed, so "Inc." and "L.L.C." both count.
pub const BUSINESS_KEYWORDS: &[&str] = &[
    "INC", "INCORPORATED", "LLC", "LLP", "LP", "PLLC", "PC", "CORP", "CORPORATION",
    "CO", "COMPANY", "LTD", "LIMITED", "SERVICES", "HOLDINGS", "SOLUTIONS",
    "PARTNERSHIP", "GROUP", "ASSOCIATES", "ENTERPRISES",
];

static FORM_941: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFORM\s*941\b|\bKIND\s+OF\s+TAX\s*[:\-]?\s*941\b").unwrap()
});

static RELEASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bCERTIFICATE\s+OF\s+RELEASE\b").unwrap(),
        Regex::new(r"(?i)\bRELEASE\s+OF\s+FEDERAL\s+TAX\s+LIEN\b").unwrap(),
    ]
});

static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z'\-.]*$").unwrap()
});

/// Confidence levels assigned by the classifier.
pub mod confidence {
    pub const BUSINESS_KEYWORD: f32 = 0.85;
    pub const BUSINESS_FORM_941: f32 = 0.80;
    pub const PERSONAL_NAME: f32 = 0.75;
    pub const PERSONAL_DEFAULT: f32 = 0.60;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NameClassification {
    pub kind: BusinessPersonal,
    pub confidence: f32,
    pub reason: &'static str,
}

/// Classify a taxpayer name. `source_text` is consulted for Form 941
/// (employer payroll tax) references, which only businesses file.
pub fn classify_name(name: &str, source_text: &str) -> NameClassification {
    let normalized = name.to_uppercase().replace('.', "");
    let has_keyword = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(|token| BUSINESS_KEYWORDS.contains(&token));

    if has_keyword {
        return NameClassification {
            kind: BusinessPersonal::Business,
            confidence: confidence::BUSINESS_KEYWORD,
            reason: "business keyword in name",
        };
    }

    if FORM_941.is_match(source_text) {
        return NameClassification {
            kind: BusinessPersonal::Business,
            confidence: confidence::BUSINESS_FORM_941,
            reason: "Form 941 referenced in filing",
        };
    }

    if looks_like_personal_name(name) {
        NameClassification {
            kind: BusinessPersonal::Personal,
            confidence: confidence::PERSONAL_NAME,
            reason: "2-4 word personal name",
        }
    } else {
        NameClassification {
            kind: BusinessPersonal::Personal,
            confidence: confidence::PERSONAL_DEFAULT,
            reason: "ambiguous name, defaulted to personal",
        }
    }
}

/// Whitespace tokens with commas removed, in original order.
pub fn name_tokens(name: &str) -> Vec<&str> {
    name.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

fn looks_like_personal_name(name: &str) -> bool {
    let tokens = name_tokens(name);
    (2..=4).contains(&tokens.len()) && tokens.iter().all(|t| NAME_TOKEN.is_match(t))
}

/// Release notices become `Release`; everything else is treated as a lien.
pub fn detect_lead_type(text: &str) -> LeadType {
    if RELEASE_PATTERNS.iter().any(|p| p.is_match(text)) {
        LeadType::Release
    } else {
        LeadType::Lien
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_keyword_wins() {
        let result = classify_name("ACME CONSTRUCTION INC", "");
        assert_eq!(result.kind, BusinessPersonal::Business);
        assert_eq!(result.confidence, confidence::BUSINESS_KEYWORD);
    }

    #[test]
    fn keyword_with_periods() {
        assert_eq!(classify_name("Smith Bros. L.L.C.", "").kind, BusinessPersonal::Business);
        assert_eq!(classify_name("Widgets Co.", "").kind, BusinessPersonal::Business);
    }

    #[test]
    fn keyword_must_be_whole_token() {
        // "VINCENT" contains "INC"; "CORPUZ" starts with "CORP"
        let result = classify_name("VINCENT CORPUZ", "");
        assert_eq!(result.kind, BusinessPersonal::Personal);
        assert_eq!(result.confidence, confidence::PERSONAL_NAME);
    }

    #[test]
    fn form_941_marks_business() {
        let result = classify_name("JOHN SMITH", "Kind of Tax 941 Tax Period 03/31/2023");
        assert_eq!(result.kind, BusinessPersonal::Business);
        assert_eq!(result.confidence, confidence::BUSINESS_FORM_941);
    }

    #[test]
    fn form_941_label_marks_business() {
        let result = classify_name("JOHN SMITH", "Return filed on Form 941 for Q1");
        assert_eq!(result.kind, BusinessPersonal::Business);
    }

    #[test]
    fn street_number_941_is_not_a_form() {
        let text = "Name of Taxpayer: JOHN SMITH\nResidence 941 ELM STREET\nKind of Tax 1040";
        let result = classify_name("JOHN SMITH", text);
        assert_eq!(result.kind, BusinessPersonal::Personal);
    }

    #[test]
    fn amount_941_is_not_a_form() {
        let result = classify_name("JOHN SMITH", "Fee 941.00");
        assert_eq!(result.kind, BusinessPersonal::Personal);
    }

    #[test]
    fn form_941_needs_standalone_number() {
        let result = classify_name("JOHN SMITH", "Serial 19415 amount 2,941.00");
        assert_eq!(result.kind, BusinessPersonal::Personal);
    }

    #[test]
    fn personal_name_shapes() {
        assert_eq!(
            classify_name("Emmanuel Pacquiao", "").confidence,
            confidence::PERSONAL_NAME
        );
        assert_eq!(
            classify_name("MARY-ANN O'NEIL", "").confidence,
            confidence::PERSONAL_NAME
        );
        let ambiguous = classify_name("CHER", "");
        assert_eq!(ambiguous.kind, BusinessPersonal::Personal);
        assert_eq!(ambiguous.confidence, confidence::PERSONAL_DEFAULT);
        let long = classify_name("A B C D E", "");
        assert_eq!(long.confidence, confidence::PERSONAL_DEFAULT);
    }

    #[test]
    fn tokens_drop_commas() {
        assert_eq!(name_tokens("PACQUIAO, EMMANUEL D"), vec!["PACQUIAO", "EMMANUEL", "D"]);
    }

    #[test]
    fn release_detection() {
        assert_eq!(
            detect_lead_type("CERTIFICATE OF RELEASE OF FEDERAL TAX LIEN"),
            LeadType::Release
        );
        assert_eq!(detect_lead_type("Release of Federal Tax Lien"), LeadType::Release);
        assert_eq!(detect_lead_type("NOTICE OF FEDERAL TAX LIEN"), LeadType::Lien);
        assert_eq!(detect_lead_type(""), LeadType::Lien);
    }
}

//! Accuracy Verifier: per-field validation, confidence adjustment and the
//! auto-process vs manual-review decision.
//!
//! adjusted = confidence × 0.5 if invalid × 0.9 if any issue (both compound).
//! A record auto-processes only when the mean adjusted confidence is high,
//! few fields are flagged and no single field is very weak.

use std::collections::HashMap;

use crate::pipeline::mapping::{LienField, MappedRecord};

use super::types::*;
use super::validators::validate_field;

pub struct AccuracyVerifier {
    policy: VerificationPolicy,
}

impl Default for AccuracyVerifier {
    fn default() -> Self {
        Self::new(VerificationPolicy::default())
    }
}

impl AccuracyVerifier {
    pub fn new(policy: VerificationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    pub fn verify(&self, record: &MappedRecord) -> VerificationReport {
        let results: Vec<ValidationResult> = LienField::data_fields()
            .iter()
            .map(|field| self.validate(record, *field))
            .collect();

        let overall_confidence =
            results.iter().map(|r| r.confidence).sum::<f32>() / results.len() as f32;

        let flagged_fields: Vec<LienField> = results
            .iter()
            .filter(|r| !r.is_valid || r.confidence < self.policy.flag_below)
            .map(|r| r.field_name)
            .collect();

        let weakest = results
            .iter()
            .map(|r| r.confidence)
            .fold(f32::INFINITY, f32::min);

        let can_auto_process = overall_confidence >= self.policy.auto_process_confidence
            && flagged_fields.len() <= self.policy.max_flagged_fields
            && weakest >= self.policy.min_field_confidence;

        let mut recommendations: Vec<String> = Vec::new();
        for suggestion in results.iter().flat_map(|r| r.suggestions.iter()) {
            if !recommendations.contains(suggestion) {
                recommendations.push(suggestion.clone());
            }
        }

        let record_id = format!(
            "{}_{}",
            non_blank(record.value(LienField::SiteId)).unwrap_or("unknown"),
            non_blank(record.value(LienField::LienOrReceiveDate)).unwrap_or("unknown"),
        );

        tracing::debug!(
            record_id = %record_id,
            overall_confidence,
            flagged = flagged_fields.len(),
            can_auto_process,
            "Verified lien record"
        );

        VerificationReport::new(
            record_id,
            overall_confidence.clamp(0.0, 1.0),
            results,
            can_auto_process,
            flagged_fields,
            recommendations,
        )
    }

    fn validate(&self, record: &MappedRecord, field: LienField) -> ValidationResult {
        let mapped = record.field(field);
        let check = validate_field(field, mapped.value());

        let mut adjusted = mapped.confidence;
        if !check.is_valid {
            adjusted *= thresholds::INVALID_FACTOR;
        }
        if !check.issues.is_empty() {
            adjusted *= thresholds::ISSUE_FACTOR;
        }

        ValidationResult {
            field_name: field,
            value: mapped.value.clone(),
            is_valid: check.is_valid,
            confidence: adjusted,
            issues: check.issues,
            suggestions: check.suggestions,
        }
    }

    /// Counts and most-flagged fields over a batch of reports.
    pub fn summarize(&self, reports: &[VerificationReport]) -> VerificationSummary {
        let total = reports.len();
        let auto_processable = reports.iter().filter(|r| r.can_auto_process()).count();
        let average_confidence = if total == 0 {
            0.0
        } else {
            reports.iter().map(|r| r.overall_confidence()).sum::<f32>() / total as f32
        };

        let mut counts: HashMap<LienField, usize> = HashMap::new();
        for field in reports.iter().flat_map(|r| r.flagged_fields()) {
            *counts.entry(*field).or_default() += 1;
        }
        let mut common_flags: Vec<(LienField, usize)> = counts.into_iter().collect();
        common_flags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        VerificationSummary {
            total,
            auto_processable,
            manual_review: total - auto_processable,
            average_confidence,
            common_flags,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

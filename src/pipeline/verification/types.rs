//! Verification outputs and the auto-process policy.

use serde::{Deserialize, Serialize};

use crate::pipeline::mapping::LienField;

/// Confidence thresholds for the auto-process gate.
pub mod thresholds {
    /// Mean adjusted confidence required to publish without review.
    pub const HIGH: f32 = 0.85;

    /// Below this a field is flagged for the operator.
    pub const MEDIUM: f32 = 0.70;

    /// Any single field below this blocks auto-processing.
    pub const LOW: f32 = 0.50;

    /// Multiplier applied when a field fails validation.
    pub const INVALID_FACTOR: f32 = 0.5;

    /// Multiplier applied when a validator reports any issue.
    pub const ISSUE_FACTOR: f32 = 0.9;

    /// Most flagged fields an auto-processed record may carry.
    pub const MAX_FLAGGED_FIELDS: usize = 2;
}

/// Amounts outside this range are kept but flagged.
pub const MIN_PLAUSIBLE_AMOUNT: u64 = 1_000;
pub const MAX_PLAUSIBLE_AMOUNT: u64 = 100_000_000;

/// Tunable gate parameters. Defaults match `thresholds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    pub auto_process_confidence: f32,
    pub flag_below: f32,
    pub min_field_confidence: f32,
    pub max_flagged_fields: usize,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            auto_process_confidence: thresholds::HIGH,
            flag_below: thresholds::MEDIUM,
            min_field_confidence: thresholds::LOW,
            max_flagged_fields: thresholds::MAX_FLAGGED_FIELDS,
        }
    }
}

/// Outcome of validating one field. `confidence` is the adjusted score and
/// never exceeds the mapped field's original confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub field_name: LienField,
    pub value: Option<String>,
    pub is_valid: bool,
    pub confidence: f32,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Per-record verification outcome. Built once by the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    record_id: String,
    overall_confidence: f32,
    results: Vec<ValidationResult>,
    can_auto_process: bool,
    requires_manual_review: bool,
    flagged_fields: Vec<LienField>,
    recommendations: Vec<String>,
}

impl VerificationReport {
    pub(crate) fn new(
        record_id: String,
        overall_confidence: f32,
        results: Vec<ValidationResult>,
        can_auto_process: bool,
        flagged_fields: Vec<LienField>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            record_id,
            overall_confidence,
            results,
            can_auto_process,
            requires_manual_review: !can_auto_process,
            flagged_fields,
            recommendations,
        }
    }

    /// `{site_id}_{date}` with "unknown" standing in for a missing part.
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn overall_confidence(&self) -> f32 {
        self.overall_confidence
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn result(&self, field: LienField) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.field_name == field)
    }

    pub fn can_auto_process(&self) -> bool {
        self.can_auto_process
    }

    pub fn requires_manual_review(&self) -> bool {
        self.requires_manual_review
    }

    pub fn flagged_fields(&self) -> &[LienField] {
        &self.flagged_fields
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}

/// Aggregate view over a batch of reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub auto_processable: usize,
    pub manual_review: usize,
    pub average_confidence: f32,
    /// Flag counts per field, most frequent first.
    pub common_flags: Vec<(LienField, usize)>,
}

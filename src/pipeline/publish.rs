//! Document batch processing and the publish step.
//!
//! extract → map → verify per document, then split into auto-publish and
//! needs-review. Auto-publish records are gated by `is_duplicate` against
//! the persisted corpus (and against each other) before one append call.

use serde::Serialize;

use super::dedupe::{is_duplicate, DedupeKey, Row, RowStore, StoreError};
use super::extract::{PatternExtractor, RawDocument};
use super::mapping::{FieldMapper, MappedRecord, SiteMetadata, YearPivot};
use super::review::ReviewItem;
use super::verification::{AccuracyVerifier, VerificationPolicy, VerificationReport, VerificationSummary};

/// A mapped record with its verification report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRecord {
    pub record: MappedRecord,
    pub report: VerificationReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessedBatch {
    pub auto_publish: Vec<ProcessedRecord>,
    pub needs_review: Vec<ProcessedRecord>,
    /// Documents that failed boundary validation and were skipped.
    pub rejected_documents: usize,
}

impl ProcessedBatch {
    pub fn reports(&self) -> Vec<VerificationReport> {
        self.auto_publish
            .iter()
            .chain(&self.needs_review)
            .map(|p| p.report.clone())
            .collect()
    }
}

/// Result of publishing one batch; becomes the task cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub records_written: usize,
    pub duplicates_skipped: usize,
    pub needs_review: usize,
    pub documents_rejected: usize,
    pub errors: Vec<String>,
}

impl PublishOutcome {
    pub fn cursor(&self) -> String {
        format!(
            "records_written={};duplicates_skipped={};needs_review={}",
            self.records_written, self.duplicates_skipped, self.needs_review
        )
    }
}

/// Stateless per-document pipeline. Safe to share across documents.
#[derive(Default)]
pub struct LienPipeline {
    extractor: PatternExtractor,
    mapper: FieldMapper,
    verifier: AccuracyVerifier,
}

impl LienPipeline {
    pub fn new(pivot: YearPivot, policy: VerificationPolicy) -> Self {
        Self {
            extractor: PatternExtractor::new(),
            mapper: FieldMapper::new(pivot),
            verifier: AccuracyVerifier::new(policy),
        }
    }

    pub fn process_document(&self, document: &RawDocument, site: &SiteMetadata) -> ProcessedRecord {
        let raw = self.extractor.extract(&document.raw_text);
        let record = self.mapper.map(&raw, document, site);
        let report = self.verifier.verify(&record);
        ProcessedRecord { record, report }
    }

    pub fn process_documents(&self, documents: &[RawDocument], site: &SiteMetadata) -> ProcessedBatch {
        let mut batch = ProcessedBatch::default();
        for (index, document) in documents.iter().enumerate() {
            if let Err(e) = document.validate() {
                tracing::warn!(site = %site.key, index, error = %e, "Skipping invalid document");
                batch.rejected_documents += 1;
                continue;
            }
            let processed = self.process_document(document, site);
            if processed.report.can_auto_process() {
                batch.auto_publish.push(processed);
            } else {
                tracing::info!(
                    record_id = processed.report.record_id(),
                    flagged = ?processed.report.flagged_fields(),
                    "Record routed to manual review"
                );
                batch.needs_review.push(processed);
            }
        }
        batch
    }

    pub fn summarize(&self, batch: &ProcessedBatch) -> VerificationSummary {
        self.verifier.summarize(&batch.reports())
    }
}

/// Append the batch's auto-publish records that are not already stored.
pub fn publish(
    batch: &ProcessedBatch,
    store: &dyn RowStore,
    key: &DedupeKey,
) -> Result<PublishOutcome, StoreError> {
    let mut outcome = PublishOutcome {
        needs_review: batch.needs_review.len(),
        documents_rejected: batch.rejected_documents,
        ..PublishOutcome::default()
    };

    let candidates = batch.auto_publish.iter().map(|p| p.record.to_cells()).collect();
    append_new_rows(candidates, store, key, &mut outcome)?;

    tracing::info!(
        written = outcome.records_written,
        duplicates = outcome.duplicates_skipped,
        needs_review = outcome.needs_review,
        "Published lien batch"
    );
    Ok(outcome)
}

/// Append an operator-approved review row unless it is already stored.
pub fn publish_approved(
    item: &ReviewItem,
    store: &dyn RowStore,
    key: &DedupeKey,
) -> Result<PublishOutcome, StoreError> {
    let mut outcome = PublishOutcome::default();
    append_new_rows(vec![item.row.clone()], store, key, &mut outcome)?;
    tracing::info!(
        item_id = %item.id,
        written = outcome.records_written,
        duplicates = outcome.duplicates_skipped,
        "Published approved review item"
    );
    Ok(outcome)
}

/// Dedup gate shared by batch and approval publishing: candidates are
/// checked against the stored corpus and each other, then appended in one call.
fn append_new_rows(
    candidates: Vec<Row>,
    store: &dyn RowStore,
    key: &DedupeKey,
    outcome: &mut PublishOutcome,
) -> Result<(), StoreError> {
    let existing = store.get_existing_rows()?;
    let mut corpus: Vec<Row> = existing.into_iter().skip(1).collect();
    let mut fresh: Vec<Row> = Vec::new();

    for cells in candidates {
        if is_duplicate(&cells, &corpus, key) {
            tracing::debug!("Skipping duplicate record");
            outcome.duplicates_skipped += 1;
            continue;
        }
        corpus.push(cells.clone());
        fresh.push(cells);
    }

    if !fresh.is_empty() {
        let appended = store.append_rows(&fresh)?;
        outcome.records_written = appended.written_count;
        outcome.duplicates_skipped += appended.duplicate_count;
        outcome.errors = appended.errors;
    }
    Ok(())
}

//! Manual review queue for records the verifier would not auto-publish.
//!
//! Items hold the canonical row and the full verification report so an
//! operator can read the recommendations. Items persist until approved or
//! dismissed. Item ids are derived from the task and row, so storing the
//! same batch twice (e.g. on a retried task) does not duplicate items.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::publish::ProcessedRecord;
use super::verification::VerificationReport;
use crate::db::{now_timestamp, DatabaseError};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Dismissed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// A record held for an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub id: String,
    pub task_id: Option<String>,
    pub record_id: String,
    pub site_id: String,
    pub row: Vec<String>,
    pub report: VerificationReport,
    pub overall_confidence: f32,
    pub status: ReviewStatus,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

/// Build a pending item for a processed record.
pub fn create_review_item(task_id: Option<&str>, processed: &ProcessedRecord) -> ReviewItem {
    let row = processed.record.to_cells();
    let identity = format!("{}|{}", task_id.unwrap_or(""), row.join("\u{1f}"));

    ReviewItem {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_bytes()).to_string(),
        task_id: task_id.map(str::to_string),
        record_id: processed.report.record_id().to_string(),
        site_id: row[0].clone(),
        row,
        report: processed.report.clone(),
        overall_confidence: processed.report.overall_confidence(),
        status: ReviewStatus::Pending,
        created_at: now_timestamp(),
        reviewed_at: None,
    }
}

/// CRUD for the review_queue table.
pub trait ReviewStore: Send + Sync {
    /// Store items; items already present (same id) are left untouched.
    fn store_pending(&self, conn: &Connection, items: &[ReviewItem]) -> Result<usize, ReviewError>;

    /// Pending items, oldest first.
    fn get_pending(&self, conn: &Connection) -> Result<Vec<ReviewItem>, ReviewError>;

    fn get_pending_count(&self, conn: &Connection) -> Result<u32, ReviewError>;

    /// Mark an item approved and return it.
    fn approve_item(&self, conn: &Connection, item_id: &str) -> Result<ReviewItem, ReviewError>;

    fn dismiss_item(&self, conn: &Connection, item_id: &str) -> Result<(), ReviewError>;
}

/// SQLite-backed review store.
#[derive(Debug, Default)]
pub struct SqliteReviewStore;

impl SqliteReviewStore {
    pub fn new() -> Self {
        Self
    }

    pub fn get_item_by_id(&self, conn: &Connection, item_id: &str) -> Result<ReviewItem, ReviewError> {
        let row = conn
            .query_row(
                &format!("{SELECT_ITEMS} WHERE id = ?1"),
                params![item_id],
                review_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => ReviewError::Database(DatabaseError::NotFound {
                    entity_type: "review_queue".to_string(),
                    id: item_id.to_string(),
                }),
                _ => ReviewError::Database(DatabaseError::Sqlite(e)),
            })?;
        item_from_row(row)
    }

    fn set_status(&self, conn: &Connection, item_id: &str, status: ReviewStatus) -> Result<(), ReviewError> {
        let changed = conn
            .execute(
                "UPDATE review_queue SET status = ?1, reviewed_at = ?2 WHERE id = ?3",
                params![status.as_str(), now_timestamp(), item_id],
            )
            .map_err(DatabaseError::from)?;
        if changed == 0 {
            return Err(ReviewError::Database(DatabaseError::NotFound {
                entity_type: "review_queue".to_string(),
                id: item_id.to_string(),
            }));
        }
        Ok(())
    }
}

const SELECT_ITEMS: &str = "SELECT id, task_id, record_id, site_id, row_data, report,
        overall_confidence, status, created_at, reviewed_at
 FROM review_queue";

impl ReviewStore for SqliteReviewStore {
    fn store_pending(&self, conn: &Connection, items: &[ReviewItem]) -> Result<usize, ReviewError> {
        let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

        let mut inserted = 0;
        for item in items {
            let row_json = serde_json::to_string(&item.row)
                .map_err(|e| ReviewError::Serialization(e.to_string()))?;
            let report_json = serde_json::to_string(&item.report)
                .map_err(|e| ReviewError::Serialization(e.to_string()))?;

            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO review_queue
                     (id, task_id, record_id, site_id, row_data, report,
                      overall_confidence, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        item.id,
                        item.task_id,
                        item.record_id,
                        item.site_id,
                        row_json,
                        report_json,
                        item.overall_confidence as f64,
                        item.status.as_str(),
                        item.created_at,
                    ],
                )
                .map_err(DatabaseError::from)?;
        }

        tx.commit().map_err(DatabaseError::from)?;
        Ok(inserted)
    }

    fn get_pending(&self, conn: &Connection) -> Result<Vec<ReviewItem>, ReviewError> {
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_ITEMS} WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC"
            ))
            .map_err(DatabaseError::from)?;

        let rows = stmt.query_map([], review_row).map_err(DatabaseError::from)?;

        let mut items = Vec::new();
        for row in rows {
            let row = row.map_err(DatabaseError::from)?;
            items.push(item_from_row(row)?);
        }
        Ok(items)
    }

    fn get_pending_count(&self, conn: &Connection) -> Result<u32, ReviewError> {
        let count: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM review_queue WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .map_err(DatabaseError::from)?;
        Ok(count)
    }

    fn approve_item(&self, conn: &Connection, item_id: &str) -> Result<ReviewItem, ReviewError> {
        self.set_status(conn, item_id, ReviewStatus::Approved)?;
        self.get_item_by_id(conn, item_id)
    }

    fn dismiss_item(&self, conn: &Connection, item_id: &str) -> Result<(), ReviewError> {
        self.set_status(conn, item_id, ReviewStatus::Dismissed)
    }
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct ReviewRow {
    id: String,
    task_id: Option<String>,
    record_id: String,
    site_id: String,
    row_data: String,
    report: String,
    overall_confidence: f64,
    status: String,
    created_at: String,
    reviewed_at: Option<String>,
}

fn review_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        task_id: row.get(1)?,
        record_id: row.get(2)?,
        site_id: row.get(3)?,
        row_data: row.get(4)?,
        report: row.get(5)?,
        overall_confidence: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        reviewed_at: row.get(9)?,
    })
}

fn item_from_row(row: ReviewRow) -> Result<ReviewItem, ReviewError> {
    let status = ReviewStatus::from_str(&row.status).ok_or_else(|| {
        ReviewError::Database(DatabaseError::InvalidEnum {
            field: "review_queue.status".to_string(),
            value: row.status.clone(),
        })
    })?;
    let cells: Vec<String> = serde_json::from_str(&row.row_data)
        .map_err(|e| ReviewError::Serialization(format!("Bad row_data JSON: {e}")))?;
    let report: VerificationReport = serde_json::from_str(&row.report)
        .map_err(|e| ReviewError::Serialization(format!("Bad report JSON: {e}")))?;

    Ok(ReviewItem {
        id: row.id,
        task_id: row.task_id,
        record_id: row.record_id,
        site_id: row.site_id,
        row: cells,
        report,
        overall_confidence: row.overall_confidence as f32,
        status,
        created_at: row.created_at,
        reviewed_at: row.reviewed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::pipeline::extract::RawDocument;
    use crate::pipeline::mapping::{LiabilityType, SiteMetadata};
    use crate::pipeline::publish::LienPipeline;

    fn setup_db() -> Connection {
        open_memory_database().expect("Failed to open in-memory DB")
    }

    fn make_processed(text: &str) -> ProcessedRecord {
        let site = SiteMetadata::new("cook_county", "10", LiabilityType::Irs);
        LienPipeline::default().process_document(&RawDocument::from_text(text), &site)
    }

    #[test]
    fn store_and_retrieve_pending() {
        let conn = setup_db();
        let store = SqliteReviewStore::new();
        let item = create_review_item(None, &make_processed("Name of Taxpayer: JANE ROE"));

        assert_eq!(store.store_pending(&conn, &[item.clone()]).unwrap(), 1);
        let pending = store.get_pending(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, item.id);
        assert_eq!(pending[0].row, item.row);
        assert_eq!(pending[0].report, item.report);
        assert_eq!(pending[0].site_id, "10");
        assert_eq!(store.get_pending_count(&conn).unwrap(), 1);
    }

    #[test]
    fn storing_same_item_twice_is_idempotent() {
        let conn = setup_db();
        let store = SqliteReviewStore::new();
        let processed = make_processed("garbled");
        let first = create_review_item(None, &processed);
        let second = create_review_item(None, &processed);
        assert_eq!(first.id, second.id);

        store.store_pending(&conn, &[first]).unwrap();
        assert_eq!(store.store_pending(&conn, &[second]).unwrap(), 0);
        assert_eq!(store.get_pending_count(&conn).unwrap(), 1);
    }

    #[test]
    fn approve_and_dismiss() {
        let conn = setup_db();
        let store = SqliteReviewStore::new();
        let a = create_review_item(None, &make_processed("Name of Taxpayer: A B"));
        let b = create_review_item(None, &make_processed("Name of Taxpayer: C D"));
        store.store_pending(&conn, &[a.clone(), b.clone()]).unwrap();

        let approved = store.approve_item(&conn, &a.id).unwrap();
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert!(approved.reviewed_at.is_some());

        store.dismiss_item(&conn, &b.id).unwrap();
        assert_eq!(store.get_pending_count(&conn).unwrap(), 0);
    }

    #[test]
    fn unknown_item_is_not_found() {
        let conn = setup_db();
        let store = SqliteReviewStore::new();
        let err = store.approve_item(&conn, "missing").unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Database(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn status_roundtrip() {
        for status in [ReviewStatus::Pending, ReviewStatus::Approved, ReviewStatus::Dismissed] {
            assert_eq!(ReviewStatus::from_str(status.as_str()), Some(status));
        }
    }
}

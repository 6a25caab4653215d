//! Persisted row store seam and its SQLite implementation.
//!
//! The store holds a header row followed by data rows in canonical column
//! order. `SqliteRowStore` re-checks the dedup key inside an immediate
//! transaction, so two writers cannot both append the same filing.

use std::collections::HashSet;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::mapping::{canonical_headers, COLUMN_COUNT};

use super::key::{DedupeKey, Row};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Row shape error: {0}")]
    Schema(String),
}

/// Outcome of an append call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendResult {
    pub written_count: usize,
    pub duplicate_count: usize,
    pub errors: Vec<String>,
}

/// The persisted corpus the publish step writes into.
pub trait RowStore {
    /// Header row followed by data rows, in store order.
    fn get_existing_rows(&self) -> Result<Vec<Row>, StoreError>;

    /// Append data rows, skipping rows the store already holds.
    fn append_rows(&self, rows: &[Row]) -> Result<AppendResult, StoreError>;

    /// Clear the data region and write `rows` in its place, atomically.
    fn replace_data_rows(&self, rows: &[Row]) -> Result<(), StoreError>;
}

const SELECT_ROWS: &str = "SELECT site_id, lien_or_receive_date, amount, lead_type, lead_source,
        liability_type, business_personal, company, first_name, last_name,
        street, city, state, zip
 FROM lien_rows ORDER BY position ASC";

const INSERT_ROW: &str = "INSERT INTO lien_rows
    (site_id, lien_or_receive_date, amount, lead_type, lead_source,
     liability_type, business_personal, company, first_name, last_name,
     street, city, state, zip)
 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

/// `lien_rows` table as a row store.
pub struct SqliteRowStore<'c> {
    conn: &'c Connection,
    key: DedupeKey,
}

impl<'c> SqliteRowStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_key(conn, DedupeKey::standard())
    }

    pub fn with_key(conn: &'c Connection, key: DedupeKey) -> Self {
        Self { conn, key }
    }

    pub fn data_row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lien_rows", [], |row| row.get(0))
            .map_err(DatabaseError::from)?;
        Ok(count as usize)
    }

    fn begin(&self) -> Result<Transaction<'c>, StoreError> {
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Database(DatabaseError::Sqlite(e)))
    }
}

fn load_data_rows(conn: &Connection) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare(SELECT_ROWS).map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map([], |row| {
            (0..COLUMN_COUNT)
                .map(|i| row.get::<_, String>(i))
                .collect::<Result<Row, _>>()
        })
        .map_err(DatabaseError::from)?;

    let mut data = Vec::new();
    for row in rows {
        data.push(row.map_err(DatabaseError::from)?);
    }
    Ok(data)
}

fn insert_row(conn: &Connection, row: &[String]) -> Result<(), StoreError> {
    conn.execute(
        INSERT_ROW,
        params![
            row[0], row[1], row[2], row[3], row[4], row[5], row[6],
            row[7], row[8], row[9], row[10], row[11], row[12], row[13],
        ],
    )
    .map_err(DatabaseError::from)?;
    Ok(())
}

impl RowStore for SqliteRowStore<'_> {
    fn get_existing_rows(&self) -> Result<Vec<Row>, StoreError> {
        let mut rows = vec![canonical_headers()];
        rows.extend(load_data_rows(self.conn)?);
        Ok(rows)
    }

    fn append_rows(&self, rows: &[Row]) -> Result<AppendResult, StoreError> {
        let tx = self.begin()?;
        let mut seen: HashSet<String> = load_data_rows(&tx)?
            .iter()
            .map(|r| self.key.key_for(r))
            .collect();

        let mut result = AppendResult::default();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != COLUMN_COUNT {
                result.errors.push(format!(
                    "Row {}: expected {COLUMN_COUNT} columns, got {}",
                    i + 1,
                    row.len()
                ));
                continue;
            }
            if !seen.insert(self.key.key_for(row)) {
                result.duplicate_count += 1;
                continue;
            }
            insert_row(&tx, row)?;
            result.written_count += 1;
        }

        tx.commit().map_err(DatabaseError::from)?;

        tracing::info!(
            written = result.written_count,
            duplicates = result.duplicate_count,
            errors = result.errors.len(),
            "Appended lien rows"
        );
        Ok(result)
    }

    fn replace_data_rows(&self, rows: &[Row]) -> Result<(), StoreError> {
        if let Some(bad) = rows.iter().position(|r| r.len() != COLUMN_COUNT) {
            return Err(StoreError::Schema(format!(
                "Row {}: expected {COLUMN_COUNT} columns, got {}",
                bad + 1,
                rows[bad].len()
            )));
        }

        let tx = self.begin()?;
        tx.execute("DELETE FROM lien_rows", []).map_err(DatabaseError::from)?;
        for row in rows {
            insert_row(&tx, row)?;
        }
        tx.commit().map_err(DatabaseError::from)?;

        tracing::info!(rows = rows.len(), "Rewrote lien row data region");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn make_row(site: &str, amount: &str, last: &str) -> Row {
        let mut row = vec![String::new(); COLUMN_COUNT];
        row[0] = site.into();
        row[2] = amount.into();
        row[9] = last.into();
        row
    }

    #[test]
    fn empty_store_has_header_only() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        let rows = store.get_existing_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Site Id");
    }

    #[test]
    fn append_preserves_order() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        let result = store
            .append_rows(&[make_row("12", "5000", "Smith"), make_row("12", "7000", "Jones")])
            .unwrap();
        assert_eq!(result.written_count, 2);
        let rows = store.get_existing_rows().unwrap();
        assert_eq!(rows[1][9], "Smith");
        assert_eq!(rows[2][9], "Jones");
    }

    #[test]
    fn append_skips_existing_and_in_batch_duplicates() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        store.append_rows(&[make_row("12", "5000", "Smith")]).unwrap();

        let result = store
            .append_rows(&[
                make_row("12", "5000", "SMITH "),
                make_row("10", "8000", "Lee"),
                make_row("10", "8000", "lee"),
            ])
            .unwrap();
        assert_eq!(result.written_count, 1);
        assert_eq!(result.duplicate_count, 2);
        assert_eq!(store.data_row_count().unwrap(), 2);
    }

    #[test]
    fn append_reports_malformed_rows() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        let result = store
            .append_rows(&[vec!["12".to_string()], make_row("12", "5000", "Smith")])
            .unwrap();
        assert_eq!(result.written_count, 1);
        assert_eq!(result.errors, vec!["Row 1: expected 14 columns, got 1"]);
    }

    #[test]
    fn replace_rewrites_data_region() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        store
            .append_rows(&[make_row("12", "1", "A"), make_row("12", "2", "B")])
            .unwrap();
        store.replace_data_rows(&[make_row("20", "3", "C")]).unwrap();
        let rows = store.get_existing_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][9], "C");
    }

    #[test]
    fn replace_rejects_bad_width_without_touching_data() {
        let conn = open_memory_database().unwrap();
        let store = SqliteRowStore::new(&conn);
        store.append_rows(&[make_row("12", "1", "A")]).unwrap();
        let err = store.replace_data_rows(&[vec![]]).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
        assert_eq!(store.data_row_count().unwrap(), 1);
    }
}

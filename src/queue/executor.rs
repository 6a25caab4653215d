//! Per-site executors and their registry.
//!
//! `JsonDocumentExecutor` is the local adapter: a scraper drops RawDocument
//! JSON files into a site's `documents_dir` and the worker consumes them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::error::ExecutionError;
use super::traits::SiteExecutor;
use super::types::{Task, TASK_DATE_FORMAT};
use crate::config::AppConfig;
use crate::pipeline::extract::RawDocument;
use crate::pipeline::mapping::normalize::normalize_date;
use crate::pipeline::mapping::YearPivot;

/// Executors keyed by site id.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<String, Box<dyn SiteExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `JsonDocumentExecutor` per enabled site that has a documents_dir.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        let pivot = YearPivot(config.two_digit_year_pivot);
        for site in config.enabled_sites() {
            if let Some(dir) = &site.documents_dir {
                registry.register(Box::new(JsonDocumentExecutor::new(&site.site_id, dir, pivot)));
            }
        }
        registry
    }

    /// Replaces any executor already registered for the same site.
    pub fn register(&mut self, executor: Box<dyn SiteExecutor>) {
        self.executors.insert(executor.site_id().to_string(), executor);
    }

    pub fn get(&self, site_id: &str) -> Option<&dyn SiteExecutor> {
        self.executors.get(site_id).map(|e| e.as_ref())
    }

    pub fn site_ids(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<RawDocument>),
    One(RawDocument),
}

pub struct JsonDocumentExecutor {
    site_id: String,
    dir: PathBuf,
    pivot: YearPivot,
}

impl JsonDocumentExecutor {
    pub fn new(site_id: &str, dir: impl AsRef<Path>, pivot: YearPivot) -> Self {
        Self {
            site_id: site_id.to_string(),
            dir: dir.as_ref().to_path_buf(),
            pivot,
        }
    }

    fn json_files(&self) -> Result<Vec<PathBuf>, ExecutionError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ExecutionError::Source(format!("Cannot read {}: {e}", self.dir.display()))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_file(path: &Path) -> Option<Vec<RawDocument>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document file");
                return None;
            }
        };
        match serde_json::from_str::<DocumentFile>(&content) {
            Ok(DocumentFile::Many(docs)) => Some(docs),
            Ok(DocumentFile::One(doc)) => Some(vec![doc]),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping malformed document file");
                None
            }
        }
    }

    /// Documents with no (or an unparseable) result_date are kept.
    fn in_window(&self, doc: &RawDocument, start: NaiveDate, end: NaiveDate) -> bool {
        let Some(raw) = doc.result_date.as_deref() else {
            return true;
        };
        let Some(date) = normalize_date(raw, self.pivot)
            .and_then(|d| NaiveDate::parse_from_str(&d, TASK_DATE_FORMAT).ok())
        else {
            return true;
        };
        start <= date && date <= end
    }
}

impl SiteExecutor for JsonDocumentExecutor {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    fn fetch_documents(&self, task: &Task) -> Result<Vec<RawDocument>, ExecutionError> {
        let (start, end) = task.date_window().ok_or_else(|| {
            ExecutionError::InvalidTask(format!(
                "Unparseable date window {} - {}",
                task.date_start, task.date_end
            ))
        })?;

        let mut documents = Vec::new();
        for path in self.json_files()? {
            let Some(docs) = Self::read_file(&path) else {
                continue;
            };
            for doc in docs {
                if documents.len() >= task.max_records as usize {
                    break;
                }
                if self.in_window(&doc, start, end) {
                    documents.push(doc);
                }
            }
        }

        tracing::debug!(
            site_id = %self.site_id,
            task_id = %task.id,
            count = documents.len(),
            "Fetched documents"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::types::NewTask;

    fn make_task(max_records: u32) -> Task {
        NewTask::new("12", "01/01/2024", "01/31/2024", max_records).into_task()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn reads_single_and_array_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", r#"[{"raw_text": "second"}, {"raw_text": "third"}]"#);
        write(dir.path(), "a.json", r#"{"raw_text": "first"}"#);
        write(dir.path(), "notes.txt", "ignored");

        let executor = JsonDocumentExecutor::new("12", dir.path(), YearPivot::default());
        let docs = executor.fetch_documents(&make_task(50)).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn skips_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", "{not json");
        write(dir.path(), "b.json", r#"{"raw_text": "ok"}"#);

        let executor = JsonDocumentExecutor::new("12", dir.path(), YearPivot::default());
        assert_eq!(executor.fetch_documents(&make_task(50)).unwrap().len(), 1);
    }

    #[test]
    fn filters_by_result_date_window() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"[
                {"raw_text": "inside", "result_date": "01/15/2024"},
                {"raw_text": "outside", "result_date": "02/15/2024"},
                {"raw_text": "iso inside", "result_date": "2024-01-31"},
                {"raw_text": "undated"}
            ]"#,
        );

        let executor = JsonDocumentExecutor::new("12", dir.path(), YearPivot::default());
        let docs = executor.fetch_documents(&make_task(50)).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["inside", "iso inside", "undated"]);
    }

    #[test]
    fn caps_at_max_records() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"[{"raw_text": "1"}, {"raw_text": "2"}, {"raw_text": "3"}]"#,
        );
        let executor = JsonDocumentExecutor::new("12", dir.path(), YearPivot::default());
        assert_eq!(executor.fetch_documents(&make_task(2)).unwrap().len(), 2);
    }

    #[test]
    fn missing_directory_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let executor = JsonDocumentExecutor::new("12", dir.path().join("absent"), YearPivot::default());
        let err = executor.fetch_documents(&make_task(5)).unwrap_err();
        assert!(matches!(err, ExecutionError::Source(_)));
        assert!(!err.is_permanent());
    }

    #[test]
    fn bad_window_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let executor = JsonDocumentExecutor::new("12", dir.path(), YearPivot::default());
        let mut task = make_task(5);
        task.date_start = "someday".into();
        assert!(executor.fetch_documents(&task).unwrap_err().is_permanent());
    }

    #[test]
    fn registry_from_config_uses_enabled_sites_with_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.sites[0].documents_dir = Some(dir.path().to_path_buf());
        config.sites[1].documents_dir = Some(dir.path().to_path_buf());
        config.sites[1].enabled = false;

        let registry = ExecutorRegistry::from_config(&config);
        assert_eq!(registry.site_ids(), vec![config.sites[0].site_id.as_str()]);
        assert!(registry.get(&config.sites[0].site_id).is_some());
        assert!(registry.get("99").is_none());
    }
}

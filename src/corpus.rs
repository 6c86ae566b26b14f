//! Persisted course catalog.
//!
//! The catalog is a single pretty-printed JSON array of course records. It is
//! written whole by the crawler and read whole at startup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::StorageManager;

/// One course listing.
///
/// `title` and `link` are required and non-empty; `content` is empty when the
/// detail page could not be scraped. Links are not unique: the listing site
/// may repeat a course across pages and no deduplication is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub title: String,
    pub link: String,
    pub content: String,
}

impl CourseRecord {
    pub fn new(title: impl Into<String>, link: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            content: content.into(),
        }
    }

    /// Text handed to the encoder for this record.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }

    fn validate(&self, position: usize) -> Result<(), CorpusError> {
        if self.title.trim().is_empty() {
            return Err(CorpusError::Unavailable(format!(
                "record #{position} has an empty title"
            )));
        }
        if self.link.trim().is_empty() {
            return Err(CorpusError::Unavailable(format!(
                "record #{position} has an empty link"
            )));
        }
        Ok(())
    }
}

/// Ordered catalog in crawl order.
///
/// There is no way to insert or remove records once a snapshot exists, which
/// keeps it aligned with any embedding matrix built from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusSnapshot {
    records: Vec<CourseRecord>,
}

impl CorpusSnapshot {
    pub fn new(records: Vec<CourseRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&CourseRecord> {
        self.records.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }
}

impl FromIterator<CourseRecord> for CorpusSnapshot {
    fn from_iter<T: IntoIterator<Item = CourseRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus unavailable: {0}")]
    Unavailable(String),

    #[error("failed to write corpus: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize corpus: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes the catalog file through a storage backend.
#[derive(Clone)]
pub struct CorpusStore {
    storage: Arc<dyn StorageManager>,
    file_name: String,
}

impl CorpusStore {
    pub fn new(storage: Arc<dyn StorageManager>, file_name: &str) -> Self {
        Self {
            storage,
            file_name: file_name.to_string(),
        }
    }

    /// Human readable location of the catalog file.
    pub fn location(&self) -> String {
        self.storage.location(&self.file_name)
    }

    /// Reads the whole catalog.
    ///
    /// Fails with [`CorpusError::Unavailable`] when the file is missing, is not
    /// a JSON array of records, or any record lacks a title or link.
    pub fn load(&self) -> Result<CorpusSnapshot, CorpusError> {
        if !self.storage.exists(&self.file_name) {
            return Err(CorpusError::Unavailable(format!(
                "{} does not exist",
                self.location()
            )));
        }

        let data = self
            .storage
            .read(&self.file_name)
            .map_err(|err| CorpusError::Unavailable(format!("{}: {err}", self.location())))?;

        let snapshot: CorpusSnapshot = serde_json::from_slice(&data)
            .map_err(|err| CorpusError::Unavailable(format!("{}: {err}", self.location())))?;

        for (idx, record) in snapshot.iter().enumerate() {
            record.validate(idx)?;
        }

        log::debug!("loaded {} courses from {}", snapshot.len(), self.location());

        Ok(snapshot)
    }

    /// Replaces the whole catalog file with `snapshot`.
    pub fn save(&self, snapshot: &CorpusSnapshot) -> Result<(), CorpusError> {
        let mut data = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut data, formatter);
        snapshot.serialize(&mut ser)?;

        self.storage.write(&self.file_name, &data)?;

        log::info!("saved {} courses to {}", snapshot.len(), self.location());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendLocal;

    fn create_store() -> (CorpusStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let storage = BackendLocal::new(tmp.path().to_str().unwrap()).unwrap();
        (CorpusStore::new(Arc::new(storage), "courses_data.json"), tmp)
    }

    fn sample() -> CorpusSnapshot {
        CorpusSnapshot::new(vec![
            CourseRecord::new("Intro to Python", "https://x.test/courses/python", "Variables and loops"),
            CourseRecord::new("Deep Learning", "https://x.test/courses/dl", ""),
            CourseRecord::new("Intro to Python", "https://x.test/courses/python", "Variables and loops"),
        ])
    }

    #[test]
    fn test_save_load_preserves_order() {
        let (store, _tmp) = create_store();
        let snapshot = sample();

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.get(1).unwrap().title, "Deep Learning");
    }

    #[test]
    fn test_load_is_idempotent() {
        let (store, _tmp) = create_store();
        store.save(&sample()).unwrap();

        assert_eq!(store.load().unwrap(), store.load().unwrap());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let (store, _tmp) = create_store();
        store.save(&sample()).unwrap();

        let smaller = CorpusSnapshot::new(vec![CourseRecord::new("Only", "https://x.test/only", "c")]);
        store.save(&smaller).unwrap();

        assert_eq!(store.load().unwrap(), smaller);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let (store, _tmp) = create_store();
        assert!(matches!(store.load(), Err(CorpusError::Unavailable(_))));
    }

    #[test]
    fn test_malformed_json_is_unavailable() {
        let (store, tmp) = create_store();
        std::fs::write(tmp.path().join("courses_data.json"), b"{ not json").unwrap();

        assert!(matches!(store.load(), Err(CorpusError::Unavailable(_))));
    }

    #[test]
    fn test_missing_field_is_unavailable() {
        let (store, tmp) = create_store();
        std::fs::write(
            tmp.path().join("courses_data.json"),
            br#"[{"title": "A", "link": "https://x.test/a"}]"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(CorpusError::Unavailable(_))));
    }

    #[test]
    fn test_empty_link_is_unavailable() {
        let (store, tmp) = create_store();
        std::fs::write(
            tmp.path().join("courses_data.json"),
            br#"[{"title": "A", "link": "", "content": ""}]"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("empty link"));
    }

    #[test]
    fn test_file_is_pretty_printed_array() {
        let (store, tmp) = create_store();
        store.save(&sample()).unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("courses_data.json")).unwrap();
        assert!(raw.starts_with("[\n    {"));

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
        assert_eq!(value[0]["title"], "Intro to Python");
    }

    #[test]
    fn test_embedding_text() {
        let record = CourseRecord::new("Title", "https://x.test", "Body");
        assert_eq!(record.embedding_text(), "Title Body");
    }
}

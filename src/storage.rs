//! Release record persistence.
//!
//! The record is a single JSON file on the release branch:
//!
//! ```text
//! {
//!   "releaseDate": "2024/01/16",
//!   "reports": [ ... ],
//!   "dependencies": { "<ecosystem>": [ ... ] }
//! }
//! ```
//!
//! Writes are skipped unless the state is dirty, and every write is
//! followed by a publish so the change lands on the release branch.

use std::path::{Path, PathBuf};
use std::{fs, io};

use indexmap::IndexMap;
use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{DependencyUpdate, ReleaseState, VulnerabilityReport};
use crate::vcs::{Publisher, VcsError};

/// Commit message used when the record is written back.
pub const UPDATE_MESSAGE: &str = "chore: updated vulnerabilities.json";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("release record not found at {0}")]
    NotFound(PathBuf),

    #[error(
        "release date is not set in the release record, \
         run `secrel update-date YYYY/MM/DD` to set it"
    )]
    MissingReleaseDate,

    #[error("invalid release date '{0}', expected YYYY/MM/DD")]
    InvalidReleaseDate(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to publish release record: {0}")]
    Publish(#[from] VcsError),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// On-disk shape of the release record.
#[derive(Serialize, Deserialize)]
struct ReleaseRecord {
    #[serde(rename = "releaseDate", default, skip_serializing_if = "Option::is_none")]
    release_date: Option<String>,

    #[serde(default)]
    reports: Vec<VulnerabilityReport>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    dependencies: IndexMap<String, Vec<DependencyUpdate>>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// The release record file.
pub struct ReleaseStateStore {
    path: PathBuf,
}

impl ReleaseStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record, requiring a valid release date.
    pub fn load(&self) -> Result<ReleaseState> {
        let record = self.read_record()?;
        let raw = record.release_date.unwrap_or_default();
        let release_date = parse_release_date(&raw)?;
        Ok(ReleaseState::new(
            release_date,
            record.reports,
            record.dependencies,
            record.extra,
        ))
    }

    /// Writes the state back and publishes it, if it changed.
    ///
    /// Returns whether a write happened. The state is clean afterwards only
    /// if the file was written; a failed publish leaves the file written and
    /// the error reported.
    pub fn save(&self, state: &mut ReleaseState, publisher: &dyn Publisher) -> Result<bool> {
        if !state.is_dirty() {
            tracing::debug!(path = %self.path.display(), "release record unchanged, skipping write");
            return Ok(false);
        }

        let record = ReleaseRecord {
            release_date: Some(format_release_date(state.release_date())),
            reports: state.reports().to_vec(),
            dependencies: state.dependencies().clone(),
            extra: state.extra().clone(),
        };
        self.write_record(&record)?;
        state.mark_clean();

        publisher.publish(&self.path, UPDATE_MESSAGE)?;
        Ok(true)
    }

    /// Sets the release date directly on the record.
    ///
    /// Unlike [`load`](Self::load), this works on a record whose date is
    /// missing or invalid, since that is what it repairs. Returns whether the
    /// date changed; nothing is written or published otherwise.
    pub fn update_release_date(&self, date: Date, publisher: &dyn Publisher) -> Result<bool> {
        let mut record = self.read_record()?;
        let current = record
            .release_date
            .as_deref()
            .and_then(|raw| parse_release_date(raw).ok());
        if current == Some(date) {
            return Ok(false);
        }

        record.release_date = Some(format_release_date(date));
        self.write_record(&record)?;
        publisher.publish(&self.path, UPDATE_MESSAGE)?;
        Ok(true)
    }

    fn read_record(&self) -> Result<ReleaseRecord> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    fn write_record(&self, record: &ReleaseRecord) -> Result<()> {
        let mut json = serde_json::to_string_pretty(record)?;
        json.push('\n');
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Parses a release date written as `YYYY/MM/DD`, `YYYY-MM-DD`, or an
/// RFC 3339 timestamp (taken in UTC).
pub fn parse_release_date(raw: &str) -> Result<Date> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StorageError::MissingReleaseDate);
    }

    let dashed = trimmed.replace('/', "-");
    if let Ok(date) = dashed.parse::<Date>() {
        return Ok(date);
    }
    if let Ok(ts) = trimmed.parse::<Timestamp>() {
        return Ok(ts.to_zoned(TimeZone::UTC).date());
    }
    Err(StorageError::InvalidReleaseDate(raw.to_string()))
}

pub fn format_release_date(date: Date) -> String {
    date.strftime("%Y/%m/%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::vcs::RecordingPublisher;

    const RECORD: &str = r#"{
  "releaseDate": "2024/01/16",
  "reports": [
    {
      "id": "2254851",
      "title": "HTTP request smuggling",
      "cve_ids": ["CVE-2024-22019"],
      "severity": {"rating": "High"},
      "affectedVersions": ["20.x", "18.x"],
      "reporter": "bughunter",
      "patchAuthors": ["mcollina"],
      "summary": "Smuggling."
    }
  ],
  "dependencies": {
    "npm": [{"title": "deps: update undici to 5.28.3", "affectedVersions": ["20.x"]}]
  },
  "buildIssue": "https://github.com/nodejs/build/issues/1"
}
"#;

    fn store_with(contents: &str) -> (TempDir, ReleaseStateStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vulnerabilities.json");
        fs::write(&path, contents).unwrap();
        (dir, ReleaseStateStore::new(path))
    }

    fn record_with_date(date: &str) -> String {
        RECORD.replace("\"2024/01/16\"", &format!("\"{date}\""))
    }

    #[test]
    fn loads_clean_state() {
        let (_dir, store) = store_with(RECORD);
        let state = store.load().unwrap();

        assert_eq!(state.release_date(), Date::constant(2024, 1, 16));
        assert_eq!(state.reports().len(), 1);
        assert_eq!(state.dependencies()["npm"].len(), 1);
        assert!(!state.is_dirty());
    }

    #[test]
    fn empty_release_date_is_rejected() {
        let (_dir, store) = store_with(&record_with_date(""));
        assert!(matches!(store.load(), Err(StorageError::MissingReleaseDate)));
    }

    #[test]
    fn absent_release_date_is_rejected() {
        let (_dir, store) = store_with(r#"{"reports": []}"#);
        assert!(matches!(store.load(), Err(StorageError::MissingReleaseDate)));
    }

    #[test]
    fn impossible_release_date_is_rejected() {
        let (_dir, store) = store_with(&record_with_date("2024/02/30"));
        assert!(matches!(store.load(), Err(StorageError::InvalidReleaseDate(_))));
    }

    #[test]
    fn accepts_iso_dates() {
        assert_eq!(parse_release_date("2024-01-16").unwrap(), Date::constant(2024, 1, 16));
        assert_eq!(
            parse_release_date("2024-01-16T23:30:00Z").unwrap(),
            Date::constant(2024, 1, 16)
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ReleaseStateStore::new(dir.path().join("missing.json"));
        assert!(matches!(store.load(), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn clean_state_is_not_written() {
        let (_dir, store) = store_with(RECORD);
        let mut state = store.load().unwrap();
        let publisher = RecordingPublisher::default();

        assert!(!store.save(&mut state, &publisher).unwrap());
        assert!(publisher.calls.borrow().is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), RECORD);
    }

    #[test]
    fn dirty_state_is_written_and_published() {
        let (_dir, store) = store_with(RECORD);
        let mut state = store.load().unwrap();
        state.update_report("2254851", |r| r.summary = Some("Updated.".into()));
        let publisher = RecordingPublisher::default();

        assert!(store.save(&mut state, &publisher).unwrap());
        assert!(!state.is_dirty());
        assert_eq!(publisher.calls.borrow().len(), 1);
        assert_eq!(publisher.calls.borrow()[0].1, UPDATE_MESSAGE);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.reports()[0].summary.as_deref(), Some("Updated."));

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["buildIssue"], "https://github.com/nodejs/build/issues/1");
        assert_eq!(raw["releaseDate"], "2024/01/16");
    }

    #[test]
    fn publish_failure_is_reported_after_write() {
        let (_dir, store) = store_with(RECORD);
        let mut state = store.load().unwrap();
        state.set_release_date(Date::constant(2024, 2, 13));
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };

        let err = store.save(&mut state, &publisher).unwrap_err();
        assert!(matches!(err, StorageError::Publish(_)));
        assert_eq!(store.load().unwrap().release_date(), Date::constant(2024, 2, 13));
    }

    #[test]
    fn update_release_date_repairs_missing_date() {
        let (_dir, store) = store_with(&record_with_date(""));
        let publisher = RecordingPublisher::default();

        assert!(store.update_release_date(Date::constant(2024, 3, 5), &publisher).unwrap());
        assert_eq!(store.load().unwrap().release_date(), Date::constant(2024, 3, 5));
        assert_eq!(publisher.calls.borrow().len(), 1);
    }

    #[test]
    fn update_release_date_to_same_value_is_a_no_op() {
        let (_dir, store) = store_with(RECORD);
        let publisher = RecordingPublisher::default();

        assert!(!store.update_release_date(Date::constant(2024, 1, 16), &publisher).unwrap());
        assert!(publisher.calls.borrow().is_empty());
    }
}

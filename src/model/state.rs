//! Release state: the in-memory form of the persisted release record.

use indexmap::IndexMap;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::VulnerabilityReport;

/// A dependency bump shipped with the release, e.g. an `llhttp` update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyUpdate {
    pub title: String,

    #[serde(rename = "affectedVersions", default)]
    pub affected_versions: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The release being prepared.
///
/// Every mutation goes through a method here so that `dirty` tracks exactly
/// whether the in-memory state has diverged from disk. Persistence reads the
/// flag once and skips the write when nothing changed.
#[derive(Debug, Clone)]
pub struct ReleaseState {
    release_date: Date,
    reports: Vec<VulnerabilityReport>,
    dependencies: IndexMap<String, Vec<DependencyUpdate>>,
    extra: Map<String, Value>,
    dirty: bool,
}

impl ReleaseState {
    /// A clean state, as just read from disk.
    pub fn new(
        release_date: Date,
        reports: Vec<VulnerabilityReport>,
        dependencies: IndexMap<String, Vec<DependencyUpdate>>,
        extra: Map<String, Value>,
    ) -> Self {
        Self {
            release_date,
            reports,
            dependencies,
            extra,
            dirty: false,
        }
    }

    pub fn release_date(&self) -> Date {
        self.release_date
    }

    pub fn reports(&self) -> &[VulnerabilityReport] {
        &self.reports
    }

    pub fn report(&self, id: &str) -> Option<&VulnerabilityReport> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn dependencies(&self) -> &IndexMap<String, Vec<DependencyUpdate>> {
        &self.dependencies
    }

    /// Top-level record fields this crate does not interpret.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Whether there are changes not yet written back.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the state as matching what is on disk.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn set_release_date(&mut self, date: Date) -> bool {
        if self.release_date == date {
            return false;
        }
        self.release_date = date;
        self.dirty = true;
        true
    }

    /// Applies `edit` to the report with the given id.
    ///
    /// Returns whether anything changed; the state is marked dirty only then.
    /// Returns `false` when no report has that id.
    pub fn update_report(&mut self, id: &str, edit: impl FnOnce(&mut VulnerabilityReport)) -> bool {
        let Some(report) = self.reports.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        let before = report.clone();
        edit(report);
        let changed = *report != before;
        self.dirty |= changed;
        changed
    }

    /// Folds a freshly retrieved report into the state.
    ///
    /// Unknown reports are appended. For known ones, only platform-owned
    /// fields are refreshed; anything filled in locally is kept. Platform CVE
    /// ids are adopted only when none are recorded yet. The write-up is
    /// refreshed too, but it is not persisted so it never marks the state dirty.
    pub fn merge_report(&mut self, mut fetched: VulnerabilityReport) -> bool {
        let Some(index) = self.reports.iter().position(|r| r.id == fetched.id) else {
            self.reports.push(fetched);
            self.dirty = true;
            return true;
        };
        if fetched.details.is_some() {
            self.reports[index].details = fetched.details.take();
        }

        let id = fetched.id.clone();
        let fetched_rated = fetched.severity_rating().is_some();
        self.update_report(&id, |existing| {
            existing.title = fetched.title;
            if !fetched.link.is_empty() {
                existing.link = fetched.link;
            }
            if fetched.created_at.is_some() {
                existing.created_at = fetched.created_at;
            }
            if existing.cve_ids.is_empty() && !fetched.cve_ids.is_empty() {
                existing.cve_ids = fetched.cve_ids;
            }
            if existing.severity_rating().is_none() && fetched_rated {
                existing.severity = fetched.severity;
            }
            if existing.reporter.is_empty() {
                existing.reporter = fetched.reporter;
            }
        })
    }
}

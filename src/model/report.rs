//! Vulnerability report types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A vulnerability report correlated into the release.
///
/// Identity is the platform-native `id`. The platform owns `title`, `link`
/// and `created_at`; everything else may be filled in by hand, by the
/// reservation workflow, or while assembling announcements.
///
/// Field names follow the persisted record's mixed casing. Unknown fields
/// are carried through `extra` so write-back never drops hand-added data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Reserved CVE identifiers. Once non-empty, only replaced after the
    /// operator confirms an override.
    #[serde(default)]
    pub cve_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Release lines affected, e.g. `v20.x`. Order is preserved, duplicates are not meaningful.
    #[serde(rename = "affectedVersions", default)]
    pub affected_versions: Vec<String>,

    #[serde(default)]
    pub reporter: String,

    #[serde(rename = "patchAuthors", default, skip_serializing_if = "Option::is_none")]
    pub patch_authors: Option<Vec<String>>,

    #[serde(rename = "cveRequest", default, skip_serializing_if = "Option::is_none")]
    pub cve_request: Option<CveRequest>,

    /// The reporter's write-up as retrieved from the platform. Not persisted.
    #[serde(skip)]
    pub details: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VulnerabilityReport {
    /// A report with only its platform identity filled in.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: String::new(),
            created_at: None,
            summary: None,
            cve_ids: Vec::new(),
            severity: None,
            affected_versions: Vec::new(),
            reporter: String::new(),
            patch_authors: None,
            cve_request: None,
            details: None,
            extra: Map::new(),
        }
    }

    /// The severity rating, if one has been set.
    pub fn severity_rating(&self) -> Option<&str> {
        self.severity
            .as_ref()
            .and_then(|s| s.rating.as_deref())
            .filter(|r| !r.trim().is_empty())
    }

    /// Whether the reservation authority has already been contacted for this report.
    ///
    /// True when CVE ids are recorded or a request is still pending.
    pub fn has_reservation(&self) -> bool {
        !self.cve_ids.is_empty() || self.cve_request.is_some()
    }

    /// Text describing the vulnerability: the summary if there is one,
    /// otherwise the reporter's write-up.
    pub fn description(&self) -> Option<&str> {
        [self.summary.as_deref(), self.details.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }

    /// The public platform URL for this report.
    pub fn platform_url(&self) -> String {
        if self.link.is_empty() {
            format!("https://hackerone.com/reports/{}", self.id)
        } else {
            self.link.clone()
        }
    }
}

/// Severity assessment of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Severity {
    #[serde(default)]
    pub rating: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Severity {
    pub fn rated(rating: impl Into<String>) -> Self {
        Self {
            rating: Some(rating.into()),
            extra: Map::new(),
        }
    }
}

/// A CVE request the authority took but has not assigned identifiers for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CveRequest {
    pub status: CveRequestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    pub requested_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CveRequestStatus {
    /// Accepted; identifiers will be assigned later.
    Pending,

    /// Submitted, but the authority's answer could not be read. Check with
    /// the authority before requesting again.
    Unconfirmed,
}

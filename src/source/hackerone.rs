//! `HackerOne` reports: identifier resolution, retrieval, and projection.

use std::time::Duration;

use indexmap::IndexMap;
use jiff::Timestamp;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::batch::{self, Collected};
use crate::model::{Severity, VulnerabilityReport};

#[derive(Debug, thiserror::Error)]
pub enum HackerOneError {
    #[error("report {0} not found")]
    NotFound(String),

    #[error("no report id in {0}")]
    MissingReportId(String),

    #[error("invalid report URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("HackerOne returned {status} for report {id}")]
    Status { id: String, status: StatusCode },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed report: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, HackerOneError>;

/// Retrieves reports from the bug-bounty platform.
pub trait ReportSource {
    fn fetch(&self, report_id: &str) -> Result<RawReport>;

    /// The team-written summary of a report, if one exists.
    fn summary(&self, report_id: &str) -> Result<Option<String>> {
        Ok(self.fetch(report_id)?.team_summary())
    }
}

/// [`ReportSource`] over the `HackerOne` REST API.
pub struct HackerOneClient {
    client: reqwest::blocking::Client,
    api_url: String,
    username: String,
    token: String,
}

impl HackerOneClient {
    pub fn new(api_url: &str, username: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            token: token.to_string(),
        })
    }
}

impl ReportSource for HackerOneClient {
    fn fetch(&self, report_id: &str) -> Result<RawReport> {
        let response = self
            .client
            .get(format!("{}/reports/{report_id}", self.api_url))
            .basic_auth(&self.username, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(HackerOneError::NotFound(report_id.to_string())),
            status if !status.is_success() => Err(HackerOneError::Status {
                id: report_id.to_string(),
                status,
            }),
            _ => {
                let body = response.text()?;
                let envelope: Envelope = serde_json::from_str(&body)?;
                Ok(envelope.data)
            }
        }
    }
}

/// Resolves the platform report id a reference URL points at.
///
/// Prefers the `report_id` query parameter, then a numeric `/reports/<id>`
/// path segment. A URL carrying neither is an explicit error rather than an
/// empty lookup key.
pub fn resolve_report_id(reference: &str) -> Result<String> {
    let url = Url::parse(reference).map_err(|source| HackerOneError::InvalidUrl {
        url: reference.to_string(),
        source,
    })?;

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "report_id")
        && is_report_id(&id)
    {
        return Ok(id.into_owned());
    }

    let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
    segments
        .windows(2)
        .find(|pair| pair[0] == "reports" && is_report_id(pair[1]))
        .map(|pair| pair[1].to_string())
        .ok_or_else(|| HackerOneError::MissingReportId(reference.to_string()))
}

fn is_report_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Retrieves every referenced report, in order, skipping the ones that fail.
///
/// References are resolved to report ids first; a report linked more than
/// once is fetched once, under its first URL. Each failure is logged with
/// its URL. `on_retrieved` fires once per report as it arrives.
pub fn fetch_reports(
    urls: &[String],
    source: &dyn ReportSource,
    on_retrieved: impl FnMut(&VulnerabilityReport),
) -> Collected<VulnerabilityReport, HackerOneError> {
    let mut unresolved = Vec::new();
    let mut targets: IndexMap<String, &String> = IndexMap::new();
    for url in urls {
        match resolve_report_id(url) {
            Ok(id) if targets.contains_key(&id) => {
                tracing::debug!(%url, report = %id, "report already referenced");
            }
            Ok(id) => {
                targets.insert(id, url);
            }
            Err(error) => {
                tracing::warn!(%url, %error, "skipping report reference");
                unresolved.push((url.clone(), error));
            }
        }
    }

    let mut collected = batch::collect_with_skip(
        targets,
        |(_, url)| (*url).clone(),
        |(id, url)| {
            let fetched = source.fetch(id).map(|raw| raw.into_report(url));
            if let Err(error) = &fetched {
                tracing::warn!(%url, %error, "skipping report");
            }
            fetched
        },
        on_retrieved,
    );
    unresolved.append(&mut collected.failures);
    collected.failures = unresolved;
    collected
}

#[derive(Deserialize)]
struct Envelope {
    data: RawReport,
}

/// A report as the platform returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReport {
    pub id: String,
    pub attributes: ReportAttributes,
    #[serde(default)]
    pub relationships: Relationships,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportAttributes {
    pub title: String,
    #[serde(default)]
    pub vulnerability_information: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub cve_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub reporter: Option<One<ReporterAttributes>>,
    #[serde(default)]
    pub severity: Option<One<SeverityAttributes>>,
    #[serde(default)]
    pub summaries: Option<Many<SummaryAttributes>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct One<T> {
    pub data: Option<Node<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Many<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Node<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node<T> {
    pub attributes: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReporterAttributes {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeverityAttributes {
    #[serde(default)]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryAttributes {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RawReport {
    /// Projects the platform shape into a release report, linked to `url`.
    pub fn into_report(self, url: &str) -> VulnerabilityReport {
        let mut report = VulnerabilityReport::new(self.id, self.attributes.title);
        report.link = url.to_string();
        report.created_at = self.attributes.created_at;
        report.details = self.attributes.vulnerability_information;
        report.cve_ids = self.attributes.cve_ids.unwrap_or_default();
        report.severity = self
            .relationships
            .severity
            .and_then(|s| s.data)
            .and_then(|n| n.attributes.rating)
            .map(Severity::rated);
        report.reporter = self
            .relationships
            .reporter
            .and_then(|r| r.data)
            .map(|n| n.attributes.username)
            .unwrap_or_default();
        report
    }

    /// The summary written by the program team, if any.
    pub fn team_summary(&self) -> Option<String> {
        self.relationships
            .summaries
            .as_ref()?
            .data
            .iter()
            .filter(|n| n.attributes.category.as_deref() == Some("team"))
            .find_map(|n| n.attributes.content.clone())
            .filter(|c| !c.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    const REPORT: &str = r#"{
      "data": {
        "id": "2254851",
        "type": "report",
        "attributes": {
          "title": "HTTP request smuggling via chunk extensions",
          "vulnerability_information": "Full writeup...",
          "created_at": "2023-11-10T14:22:03.000Z",
          "cve_ids": null
        },
        "relationships": {
          "reporter": {"data": {"id": "7", "type": "user", "attributes": {"username": "bughunter"}}},
          "severity": {"data": {"id": "9", "type": "severity", "attributes": {"rating": "high"}}},
          "summaries": {"data": [
            {"id": "1", "type": "report-summary", "attributes": {"content": "Researcher view", "category": "researcher"}},
            {"id": "2", "type": "report-summary", "attributes": {"content": "Smuggling via chunk extensions.", "category": "team"}}
          ]}
        }
      }
    }"#;

    /// Serves canned reports by id; anything else is not found.
    #[derive(Default)]
    struct FakeSource {
        reports: HashMap<String, RawReport>,
        fetched: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn with_sample() -> Self {
            Self {
                reports: HashMap::from([("2254851".to_string(), raw())]),
                ..Self::default()
            }
        }
    }

    impl ReportSource for FakeSource {
        fn fetch(&self, report_id: &str) -> Result<RawReport> {
            self.fetched.borrow_mut().push(report_id.to_string());
            self.reports
                .get(report_id)
                .cloned()
                .ok_or_else(|| HackerOneError::NotFound(report_id.to_string()))
        }
    }

    fn raw() -> RawReport {
        serde_json::from_str::<Envelope>(REPORT).unwrap().data
    }

    #[test]
    fn resolves_id_from_query() {
        let id = resolve_report_id("https://hackerone.com/bugs?subject=nodejs&report_id=2237545").unwrap();
        assert_eq!(id, "2237545");
    }

    #[test]
    fn resolves_id_from_path() {
        let id = resolve_report_id("https://hackerone.com/reports/2254851").unwrap();
        assert_eq!(id, "2254851");
    }

    #[test]
    fn missing_id_is_explicit_error() {
        let err = resolve_report_id("https://hackerone.com/nodejs").unwrap_err();
        assert!(matches!(err, HackerOneError::MissingReportId(_)));

        let err = resolve_report_id("https://hackerone.com/bugs?report_id=").unwrap_err();
        assert!(matches!(err, HackerOneError::MissingReportId(_)));
    }

    #[test]
    fn projects_platform_report() {
        let url = "https://hackerone.com/reports/2254851";
        let report = raw().into_report(url);

        assert_eq!(report.id, "2254851");
        assert_eq!(report.title, "HTTP request smuggling via chunk extensions");
        assert_eq!(report.link, url);
        assert!(report.cve_ids.is_empty());
        assert_eq!(report.severity_rating(), Some("high"));
        assert_eq!(report.reporter, "bughunter");
        assert!(report.created_at.is_some());
        assert!(report.summary.is_none());
        assert_eq!(report.details.as_deref(), Some("Full writeup..."));
        assert_eq!(report.description(), Some("Full writeup..."));
    }

    #[test]
    fn team_summary_ignores_researcher_summary() {
        assert_eq!(raw().team_summary().as_deref(), Some("Smuggling via chunk extensions."));
    }

    #[test]
    fn sparse_report_projects_with_defaults() {
        let json = r#"{"data":{"id":"1","attributes":{"title":"t","cve_ids":["CVE-2024-1"]}}}"#;
        let report = serde_json::from_str::<Envelope>(json)
            .unwrap()
            .data
            .into_report("https://hackerone.com/reports/1");

        assert_eq!(report.cve_ids, vec!["CVE-2024-1"]);
        assert!(report.severity.is_none());
        assert!(report.reporter.is_empty());
    }

    #[test]
    fn one_not_found_does_not_abort_batch() {
        let source = FakeSource::with_sample();
        let urls = vec![
            "https://hackerone.com/reports/2254851".to_string(),
            "https://hackerone.com/reports/404404".to_string(),
        ];

        let mut progress = 0;
        let collected = fetch_reports(&urls, &source, |_| progress += 1);

        assert_eq!(collected.items.len(), 1);
        assert_eq!(progress, 1);
        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.failures[0].0, urls[1]);
        assert!(matches!(collected.failures[0].1, HackerOneError::NotFound(_)));
    }

    #[test]
    fn unresolvable_url_is_a_per_item_failure() {
        let source = FakeSource::default();
        let urls = vec!["https://hackerone.com/nodejs".to_string()];
        let collected = fetch_reports(&urls, &source, |_| {});

        assert!(collected.is_empty());
        assert!(matches!(collected.failures[0].1, HackerOneError::MissingReportId(_)));
        assert!(source.fetched.borrow().is_empty());
    }

    /// Log output collected in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn skipped_report_is_logged_with_its_url() {
        let source = FakeSource::default();
        let urls = vec!["https://hackerone.com/reports/404404".to_string()];
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || fetch_reports(&urls, &source, |_| {}));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("url=https://hackerone.com/reports/404404"), "{output}");
        assert!(output.contains("error=report 404404 not found"), "{output}");
    }

    #[test]
    fn report_linked_twice_is_fetched_once() {
        let source = FakeSource::with_sample();
        let urls = vec![
            "https://hackerone.com/reports/2254851".to_string(),
            "https://hackerone.com/bugs?subject=nodejs&report_id=2254851".to_string(),
        ];

        let collected = fetch_reports(&urls, &source, |_| {});

        assert_eq!(*source.fetched.borrow(), vec!["2254851"]);
        assert_eq!(collected.items.len(), 1);
        assert_eq!(collected.items[0].link, urls[0]);
        assert!(collected.failures.is_empty());
    }
}

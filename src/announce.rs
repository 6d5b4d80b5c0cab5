//! Security release announcements.
//!
//! Two documents come out of the release record. The pre-release heads-up
//! states what is coming and when. The post-release write-up is built later
//! and carries one narrative block per report. Building the post-release
//! document fills any gaps in the record interactively, so the record may be
//! dirty afterwards.

mod sections;
mod templates;

use std::io;
use std::path::PathBuf;

use jiff::Zoned;

use crate::model::ReleaseState;
use crate::prompt::Prompt;
use crate::source::ReportSource;
use crate::storage;

pub use sections::{file_name, splice};
pub use templates::Templates;

use templates::{
    AFFECTED_VERSIONS, ANNOUNCEMENT_DATE, AUTHOR, DEPENDENCY_UPDATES, DOWNLOADS, IMPACT, RELEASE_DATE, REPORTS,
    SLUG, VULNERABILITIES, render,
};

#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("severity rating missing for report {report_id}, add it to the release record before continuing")]
    MissingSeverity { report_id: String },

    #[error("summary missing for report {report_id}, add it before continuing")]
    MissingSummary { report_id: String },

    #[error("failed to read template {path}: {source}")]
    Template { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, AnnounceError>;

/// Builds announcement documents, asking the operator for what the record
/// does not hold.
pub struct Assembler<'a> {
    prompt: &'a dyn Prompt,
    product: &'a str,
}

impl<'a> Assembler<'a> {
    pub fn new(prompt: &'a dyn Prompt, product: &'a str) -> Self {
        Self { prompt, product }
    }

    /// The pre-release announcement.
    pub fn pre_release(&self, template: &str, state: &ReleaseState) -> Result<String> {
        let reports = state.reports();
        sections::require_severity(reports)?;

        let announced = self.announcement_date()?;
        let date = state.release_date();
        let released = sections::release_date(date);
        let slug = sections::slug(date);
        let affected = sections::affected_versions(reports);
        let vulnerabilities = sections::vulnerabilities(reports)?;
        let impact = sections::impact(reports, self.product)?;

        Ok(render(
            template,
            &[
                (ANNOUNCEMENT_DATE, announced.as_str()),
                (SLUG, slug.as_str()),
                (AFFECTED_VERSIONS, affected.as_str()),
                (VULNERABILITIES, vulnerabilities.as_str()),
                (RELEASE_DATE, released.as_str()),
                (IMPACT, impact.as_str()),
            ],
        ))
    }

    /// The post-release header, up to where the pre-release body is spliced.
    ///
    /// Missing CVE ids, summaries, and patch authors are asked for and
    /// recorded on `state`.
    pub fn post_release(&self, template: &str, state: &mut ReleaseState, source: &dyn ReportSource) -> Result<String> {
        sections::require_severity(state.reports())?;

        let announced = self.announcement_date()?;
        let author = self.prompt.input(
            "Who is the author of this security release? If multiple use & as separator",
            AUTHOR,
        )?;
        let author = sections::split_names(&author).join(" and ");
        let reports = self.report_blocks(state, source)?;

        let date = state.release_date();
        let released = sections::release_date(date);
        let slug = sections::slug(date);
        let affected = sections::affected_versions(state.reports());
        let vulnerabilities = sections::vulnerabilities(state.reports())?;
        let impact = sections::impact(state.reports(), self.product)?;
        let dependencies = sections::dependency_updates(state.dependencies());

        Ok(render(
            template,
            &[
                (ANNOUNCEMENT_DATE, announced.as_str()),
                (SLUG, slug.as_str()),
                (AFFECTED_VERSIONS, affected.as_str()),
                (VULNERABILITIES, vulnerabilities.as_str()),
                (RELEASE_DATE, released.as_str()),
                (IMPACT, impact.as_str()),
                (AUTHOR, author.as_str()),
                (REPORTS, reports.as_str()),
                (DEPENDENCY_UPDATES, dependencies.as_str()),
                (DOWNLOADS, ""),
            ],
        ))
    }

    /// Asks for the announcement date. An invalid answer leaves the
    /// placeholder in the document.
    fn announcement_date(&self) -> Result<String> {
        let today = storage::format_release_date(Zoned::now().date());
        let answer = self.prompt.input(
            "When is the security release going to be announced? Enter in YYYY/MM/DD format:",
            &today,
        )?;

        match storage::parse_release_date(&answer) {
            Ok(date) => Ok(sections::announcement_date(date)),
            Err(e) => {
                tracing::warn!(%answer, error = %e, "invalid announcement date, keeping placeholder");
                Ok(ANNOUNCEMENT_DATE.to_string())
            }
        }
    }

    fn report_blocks(&self, state: &mut ReleaseState, source: &dyn ReportSource) -> Result<String> {
        let ids: Vec<String> = state.reports().iter().map(|r| r.id.clone()).collect();

        let mut blocks = String::new();
        for id in &ids {
            self.fill_gaps(state, id, source)?;
            if let Some(report) = state.report(id) {
                blocks.push_str(&sections::report_block(report));
            }
        }
        Ok(blocks)
    }

    fn fill_gaps(&self, state: &mut ReleaseState, id: &str, source: &dyn ReportSource) -> Result<()> {
        let Some(report) = state.report(id).cloned() else {
            return Ok(());
        };
        let subject = format!("{} {}", report.platform_url(), report.title);

        if report.cve_ids.is_empty() {
            let cve = self
                .prompt
                .input(&format!("What is the CVE ID for vulnerability {subject}?"), "TBD")?;
            state.update_report(id, |r| r.cve_ids = vec![cve.trim().to_string()]);
        }

        if report.summary.as_deref().is_none_or(|s| s.trim().is_empty()) {
            let summary = self
                .summary(id, &subject, source)?
                .ok_or_else(|| AnnounceError::MissingSummary {
                    report_id: id.to_string(),
                })?;
            state.update_report(id, |r| r.summary = Some(summary));
        }

        if report.patch_authors.as_ref().is_none_or(Vec::is_empty) {
            let authors = self.prompt.input(
                &format!("Who fixed vulnerability {subject}? If multiple use & as separator"),
                "TBD",
            )?;
            state.update_report(id, |r| r.patch_authors = Some(sections::split_names(&authors)));
        }

        Ok(())
    }

    /// Fetches the summary from the platform if the operator agrees,
    /// otherwise asks for it.
    fn summary(&self, id: &str, subject: &str, source: &dyn ReportSource) -> Result<Option<String>> {
        let fetch = self.prompt.confirm(
            &format!("Summary missing for vulnerability {subject}. Fetch it from HackerOne?"),
            true,
        )?;
        if fetch {
            match source.summary(id) {
                Ok(Some(summary)) => return Ok(Some(summary)),
                Ok(None) => tracing::warn!(report = %id, "no team summary on the platform"),
                Err(e) => tracing::warn!(report = %id, error = %e, "failed to fetch summary"),
            }
        }

        let typed = self
            .prompt
            .input(&format!("Enter the summary for vulnerability {subject}:"), "")?;
        let typed = typed.trim();
        Ok((!typed.is_empty()).then(|| typed.to_string()))
    }
}

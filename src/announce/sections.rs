//! Rendering of the individual announcement sections.
//!
//! Everything here is a pure function of the release state; the prompting
//! lives in the parent module.

use indexmap::IndexMap;
use jiff::civil::Date;

use crate::model::{DependencyUpdate, VulnerabilityReport};

use super::{AnnounceError, Result};

/// Marker where the hand-edited body of a pre-release document begins.
pub const SUMMARY_MARKER: &str = "# Summary";

/// `Tuesday, January 16, 2024`.
pub fn release_date(date: Date) -> String {
    format!(
        "{}, {} {}, {}",
        date.strftime("%A"),
        date.strftime("%B"),
        date.day(),
        date.year()
    )
}

/// `january-2024-security-releases`.
pub fn slug(date: Date) -> String {
    format!("{}-{}-security-releases", date.strftime("%B").to_string().to_lowercase(), date.year())
}

/// File the pre-release document is written to.
pub fn file_name(date: Date) -> String {
    format!("{}.md", slug(date))
}

/// The announcement date as the blog front matter expects it.
pub fn announcement_date(date: Date) -> String {
    format!("{date}T00:00:00.000Z")
}

/// Every affected release line, first-seen order.
pub fn affected_versions(reports: &[VulnerabilityReport]) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for version in reports.iter().flat_map(|r| &r.affected_versions) {
        if !lines.contains(&version.as_str()) {
            lines.push(version);
        }
    }
    lines.join(", ")
}

/// Fails on the first report without a severity rating.
pub fn require_severity(reports: &[VulnerabilityReport]) -> Result<()> {
    match reports.iter().find(|r| r.severity_rating().is_none()) {
        Some(report) => Err(AnnounceError::MissingSeverity {
            report_id: report.id.clone(),
        }),
        None => Ok(()),
    }
}

/// `- 2 high severity issues.` per rating.
pub fn vulnerabilities(reports: &[VulnerabilityReport]) -> Result<String> {
    let counts = count_by_rating(reports.iter())?;
    Ok(counts
        .iter()
        .map(|(rating, n)| format!("- {n} {rating} severity issues."))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// One sentence per affected release line, with its issue counts by rating.
pub fn impact(reports: &[VulnerabilityReport], product: &str) -> Result<String> {
    let mut by_line: IndexMap<&str, Vec<&VulnerabilityReport>> = IndexMap::new();
    for report in reports {
        for line in &report.affected_versions {
            by_line.entry(line.as_str()).or_default().push(report);
        }
    }

    let mut sentences = Vec::with_capacity(by_line.len());
    for (line, reports) in by_line {
        let counts = count_by_rating(reports.into_iter())?;
        let issues = counts
            .iter()
            .map(|(rating, n)| format!("{n} {rating} severity issues"))
            .collect::<Vec<_>>()
            .join(", ");
        sentences.push(format!("The {line} release line of {product} is vulnerable to {issues}."));
    }
    Ok(sentences.join("\n"))
}

fn count_by_rating<'a>(reports: impl Iterator<Item = &'a VulnerabilityReport>) -> Result<IndexMap<String, usize>> {
    let mut counts = IndexMap::new();
    for report in reports {
        let rating = report
            .severity_rating()
            .ok_or_else(|| AnnounceError::MissingSeverity {
                report_id: report.id.clone(),
            })?;
        *counts.entry(rating.to_lowercase()).or_insert(0) += 1;
    }
    Ok(counts)
}

/// The narrative block for one fully populated report.
pub fn report_block(report: &VulnerabilityReport) -> String {
    let cves = report.cve_ids.join(", ");
    let rating = report.severity_rating().unwrap_or_default();
    let summary = report.summary.as_deref().unwrap_or_default();
    let lines = report.affected_versions.join(", ");
    let authors = report.patch_authors.as_deref().unwrap_or_default().join(" and ");

    format!(
        "## {title} ({cves}) - ({rating})\n\n\
         {summary}\n\n\
         Impact:\n\n\
         - This vulnerability affects all users in active release lines: {lines}\n\n\
         Thank you, to {reporter} for reporting this vulnerability and thank you {authors} for fixing it.\n\n",
        title = report.title,
        reporter = report.reporter,
    )
}

/// Bullet list of dependency updates, or nothing when there are none.
pub fn dependency_updates(dependencies: &IndexMap<String, Vec<DependencyUpdate>>) -> String {
    let updates: Vec<&DependencyUpdate> = dependencies.values().flatten().collect();
    if updates.is_empty() {
        return String::new();
    }

    let mut section = String::from(
        "This security release includes the following dependency updates to address public vulnerabilities:\n\n",
    );
    for update in updates {
        let title = update
            .title
            .split_once(':')
            .map_or(update.title.as_str(), |(_, rest)| rest)
            .trim();
        section.push_str(&format!("- {title} on {}\n", update.affected_versions.join(", ")));
    }
    section
}

/// Joins `&`-separated names into a list.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split('&')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Appends the pre-release body, from its summary onward, to a new header.
///
/// A document without the marker is appended whole.
pub fn splice(header: &str, pre_release: &str) -> String {
    let tail = pre_release
        .find(SUMMARY_MARKER)
        .map_or(pre_release, |at| &pre_release[at..]);
    format!("{header}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Map;

    use crate::model::Severity;

    fn report(id: &str, rating: &str, lines: &[&str]) -> VulnerabilityReport {
        let mut report = VulnerabilityReport::new(id, format!("Issue {id}"));
        report.severity = Some(Severity::rated(rating));
        report.affected_versions = lines.iter().map(ToString::to_string).collect();
        report
    }

    #[test]
    fn formats_release_date_and_slug() {
        let date = Date::constant(2024, 1, 16);
        assert_eq!(release_date(date), "Tuesday, January 16, 2024");
        assert_eq!(slug(date), "january-2024-security-releases");
        assert_eq!(file_name(date), "january-2024-security-releases.md");
        assert_eq!(announcement_date(Date::constant(2024, 1, 9)), "2024-01-09T00:00:00.000Z");
    }

    #[test]
    fn affected_versions_are_deduplicated_in_order() {
        let reports = [report("1", "High", &["21.x", "20.x"]), report("2", "Low", &["20.x", "18.x"])];
        assert_eq!(affected_versions(&reports), "21.x, 20.x, 18.x");
    }

    #[test]
    fn counts_vulnerabilities_by_rating() {
        let reports = [
            report("1", "High", &["20.x"]),
            report("2", "high", &["20.x"]),
            report("3", "Medium", &["20.x"]),
        ];
        assert_eq!(
            vulnerabilities(&reports).unwrap(),
            "- 2 high severity issues.\n- 1 medium severity issues."
        );
    }

    #[test]
    fn impact_is_per_release_line() {
        let reports = [report("1", "High", &["20.x", "18.x"]), report("2", "Low", &["20.x"])];
        assert_eq!(
            impact(&reports, "Node.js").unwrap(),
            "The 20.x release line of Node.js is vulnerable to 1 high severity issues, 1 low severity issues.\n\
             The 18.x release line of Node.js is vulnerable to 1 high severity issues."
        );
    }

    #[test]
    fn missing_severity_is_fatal() {
        let mut unrated = report("2", "High", &["20.x"]);
        unrated.severity = None;
        let reports = [report("1", "High", &["20.x"]), unrated];

        let err = require_severity(&reports).unwrap_err();
        assert!(matches!(err, AnnounceError::MissingSeverity { report_id } if report_id == "2"));
        assert!(impact(&reports, "Node.js").is_err());
    }

    #[test]
    fn renders_report_block() {
        let mut r = report("1", "High", &["20.x", "18.x"]);
        r.cve_ids = vec!["CVE-2024-22019".into()];
        r.summary = Some("Smuggling.".into());
        r.reporter = "bughunter".into();
        r.patch_authors = Some(vec!["alice".into(), "bob".into()]);

        let block = report_block(&r);
        assert!(block.starts_with("## Issue 1 (CVE-2024-22019) - (High)\n\nSmuggling.\n\n"));
        assert!(block.contains("active release lines: 20.x, 18.x"));
        assert!(block.contains("Thank you, to bughunter for reporting"));
        assert!(block.contains("thank you alice and bob for fixing it."));
    }

    #[test]
    fn renders_dependency_updates() {
        let mut deps = IndexMap::new();
        deps.insert(
            "npm".to_string(),
            vec![DependencyUpdate {
                title: "deps: update undici to 5.28.3".into(),
                affected_versions: vec!["20.x".into(), "18.x".into()],
                extra: Map::new(),
            }],
        );

        assert_eq!(
            dependency_updates(&deps),
            "This security release includes the following dependency updates to address public vulnerabilities:\n\n\
             - update undici to 5.28.3 on 20.x, 18.x\n"
        );
        assert_eq!(dependency_updates(&IndexMap::new()), "");
    }

    #[test]
    fn splits_names() {
        assert_eq!(split_names("alice & bob&carol"), vec!["alice", "bob", "carol"]);
        assert_eq!(split_names("TBD"), vec!["TBD"]);
    }

    #[test]
    fn splice_keeps_tail_from_summary() {
        let pre = "---\nold header\n---\n\n# Summary\n\nEdited by hand.\n";
        assert_eq!(splice("NEW\n", pre), "NEW\n# Summary\n\nEdited by hand.\n");
    }

    #[test]
    fn splice_without_marker_appends_everything() {
        let pre = "No marker here.\nStill kept.\n";
        assert_eq!(splice("NEW\n", pre), format!("NEW\n{pre}"));
    }
}

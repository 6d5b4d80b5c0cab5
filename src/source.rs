//! External sources: the issue tracker and the bug-bounty platform.
//!
//! Each source is a trait so the pipeline can run against fakes. The real
//! implementations shell out to `gh` for GitHub and talk to the `HackerOne`
//! REST API directly.

mod github;
mod hackerone;
mod links;

pub use github::{GhCli, GitHubError, IssueTracker};
pub use hackerone::{HackerOneClient, HackerOneError, RawReport, ReportSource, fetch_reports};
pub use links::extract_report_urls;

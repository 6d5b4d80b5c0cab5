//! GitHub issue tracker, via the `gh` CLI.
//!
//! Authentication is whatever `gh` is logged in as, optionally redirected
//! with `GH_CONFIG_DIR`.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use crate::model::{ReleaseIssue, Repository};

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("could not find issue {repo}#{number}")]
    IssueNotFound { repo: String, number: u64 },

    #[error("failed to run gh: {0}")]
    Spawn(#[from] io::Error),

    #[error("gh {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("unexpected gh output: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, GitHubError>;

/// Reads and creates issues on the hosting platform.
///
/// `Sync` because heads-up issues are created from parallel threads.
pub trait IssueTracker: Sync {
    /// Fetches an issue by number. Fails with [`GitHubError::IssueNotFound`] if absent.
    fn issue(&self, repo: &Repository, number: u64) -> Result<ReleaseIssue>;

    /// Opens an issue and returns its URL.
    fn create_issue(&self, repo: &Repository, title: &str, body: &str) -> Result<String>;
}

/// [`IssueTracker`] backed by the `gh` CLI.
pub struct GhCli {
    config_dir: Option<PathBuf>,
}

impl GhCli {
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        Self { config_dir }
    }

    /// Run `gh` with the given args and return stdout.
    fn gh(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new("gh");
        command.args(args);
        if let Some(dir) = &self.config_dir {
            command.env("GH_CONFIG_DIR", dir);
        }

        let output = command.output()?;
        if !output.status.success() {
            return Err(GitHubError::Command {
                command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

const ISSUE_QUERY: &str = "query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    issue(number: $number) {
      title
      bodyHTML
    }
  }
}";

impl IssueTracker for GhCli {
    fn issue(&self, repo: &Repository, number: u64) -> Result<ReleaseIssue> {
        let query = format!("query={ISSUE_QUERY}");
        let owner = format!("owner={}", repo.owner);
        let name = format!("repo={}", repo.name);
        let num = format!("number={number}");

        let json = match self.gh(&["api", "graphql", "-f", &query, "-f", &owner, "-f", &name, "-F", &num]) {
            Ok(json) => json,
            // GraphQL reports a missing issue as an error, which gh turns into a non-zero exit.
            Err(GitHubError::Command { stderr, .. }) if stderr.contains("Could not resolve to") => {
                return Err(not_found(repo, number));
            }
            Err(e) => return Err(e),
        };

        parse_issue_response(&json, repo, number)
    }

    fn create_issue(&self, repo: &Repository, title: &str, body: &str) -> Result<String> {
        let target = repo.to_string();
        let url = self.gh(&[
            "issue", "create", "--repo", &target, "--title", title, "--body", body,
        ])?;
        Ok(url.trim().to_string())
    }
}

/// JSON shape returned by the issue query.
#[derive(Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Deserialize)]
struct GqlData {
    repository: Option<GqlRepository>,
}

#[derive(Deserialize)]
struct GqlRepository {
    issue: Option<GqlIssue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlIssue {
    title: String,
    #[serde(rename = "bodyHTML")]
    body_html: String,
}

fn parse_issue_response(json: &str, repo: &Repository, number: u64) -> Result<ReleaseIssue> {
    let response: GqlResponse = serde_json::from_str(json)?;
    let issue = response
        .data
        .and_then(|d| d.repository)
        .and_then(|r| r.issue)
        .ok_or_else(|| not_found(repo, number))?;

    Ok(ReleaseIssue {
        number,
        title: issue.title,
        body_html: issue.body_html,
    })
}

fn not_found(repo: &Repository, number: u64) -> GitHubError {
    GitHubError::IssueNotFound {
        repo: repo.to_string(),
        number,
    }
}

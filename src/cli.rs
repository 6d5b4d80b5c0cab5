//! CLI interface for secrel.
//!
//! Every command works on the release record in the current checkout. Unless
//! git integration is turned off, the release branch is checked out first and
//! changes to the record are committed and pushed.

use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::announce::Templates;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::prompt::TerminalPrompt;
use crate::reserve::HttpAuthority;
use crate::source::{GhCli, HackerOneClient};
use crate::storage::ReleaseStateStore;
use crate::vcs::{Git, LocalOnly, Publisher};

/// secrel: prepare a security release.
#[derive(Debug, Parser)]
#[command(name = "secrel", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Accept the default answer to every prompt.
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Log debug output.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: preparing a release
  1. secrel update-date 2024/01/16
  2. secrel notify
  3. secrel request-cves 514
  4. secrel pre-release
  5. secrel post-release --pre-release january-2024-security-releases.md";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect the reports referenced by a tracking issue and request CVEs.
    ///
    /// Every request is staged to a file for review before it is submitted.
    RequestCves {
        /// Tracking issue number in the release repository.
        issue: u64,
    },

    /// Set the release date in the release record.
    UpdateDate {
        /// Release date, YYYY/MM/DD.
        date: String,
    },

    /// Write the pre-release announcement to the current directory.
    PreRelease,

    /// Turn the pre-release announcement into the post-release one.
    ///
    /// Missing CVE ids, summaries, and patch authors are asked for and saved
    /// to the release record.
    PostRelease {
        /// Existing pre-release document. Asked for when omitted.
        #[arg(long)]
        pre_release: Option<PathBuf>,
    },

    /// Open heads-up issues in the configured repositories.
    Notify,
}

/// Run a parsed command.
pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    let release = &config.release;
    let prompt = TerminalPrompt::new(cli.yes);
    let tracker = GhCli::new(config.github.config_dir.clone());

    let git = Git::new(&release.branch);
    let publisher: &dyn Publisher = if release.git {
        git.checkout()?;
        &git
    } else {
        &LocalOnly
    };

    let pipeline = Pipeline {
        repository: release.repository(),
        product: &release.product,
        store: ReleaseStateStore::new(&release.state_file),
        prompt: &prompt,
        tracker: &tracker,
        publisher,
    };

    match &cli.command {
        Command::RequestCves { issue } => {
            let (username, token) = config.hackerone.credentials()?;
            let source = HackerOneClient::new(&config.hackerone.api_url, &username, &token)?;
            let authority = HttpAuthority::new(&config.cve.endpoint, &username, &token)?;
            pipeline.request_cves(*issue, &source, &authority)
        }
        Command::UpdateDate { date } => pipeline.update_date(date).map(|_| ()),
        Command::PreRelease => {
            let templates = Templates::load(&config.templates)?;
            let dir = env::current_dir()?;
            pipeline.pre_release(&templates.pre_release, &dir).map(|_| ())
        }
        Command::PostRelease { pre_release } => {
            let (username, token) = config.hackerone.credentials()?;
            let source = HackerOneClient::new(&config.hackerone.api_url, &username, &token)?;
            let templates = Templates::load(&config.templates)?;
            pipeline
                .post_release(&templates.post_release, &source, pre_release.as_deref())
                .map(|_| ())
        }
        Command::Notify => {
            let repositories = release.notify_repositories()?;
            pipeline.notify(&repositories).map(|_| ())
        }
    }
}

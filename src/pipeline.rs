//! End-to-end release flows.
//!
//! Each flow loads the release record first, so an invalid record stops the
//! run before anything external is contacted. External services come in as
//! capability traits.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crate::announce::{self, Assembler};
use crate::error::{ReleaseError, Result};
use crate::model::{ReleaseState, Repository, ReservationResponse};
use crate::prompt::Prompt;
use crate::reserve::{ReservationAuthority, ReservationOutcome, Reservations};
use crate::source::{IssueTracker, ReportSource, extract_report_urls, fetch_reports};
use crate::storage::{self, ReleaseStateStore};
use crate::vcs::Publisher;

const HEADS_UP_BODY: &str = "As per security release workflow, creating issue to give a heads up.";

/// Attempts at naming an existing pre-release document before giving up.
const PATH_ATTEMPTS: usize = 3;

pub struct Pipeline<'a> {
    pub repository: Repository,
    pub product: &'a str,
    pub store: ReleaseStateStore,
    pub prompt: &'a dyn Prompt,
    pub tracker: &'a dyn IssueTracker,
    pub publisher: &'a dyn Publisher,
}

impl Pipeline<'_> {
    /// Correlates the reports referenced by a tracking issue and reserves
    /// CVEs for them.
    pub fn request_cves(
        &self,
        number: u64,
        source: &dyn ReportSource,
        authority: &dyn ReservationAuthority,
    ) -> Result<()> {
        let mut state = self.store.load()?;

        let issue = self.tracker.issue(&self.repository, number)?;
        eprintln!("Found issue #{}: {}", issue.number, issue.title);

        let urls = extract_report_urls(&issue.body_html, &self.repository);
        if urls.is_empty() {
            return Err(ReleaseError::NoReportReferencesFound {
                repo: self.repository.clone(),
                number,
            });
        }
        tracing::info!(count = urls.len(), "found report references");

        let collected = fetch_reports(&urls, source, |report| {
            eprintln!("Retrieved report {}: {}", report.id, report.title);
        });
        if collected.is_empty() {
            return Err(ReleaseError::NoReportsRetrieved {
                attempted: urls.len(),
            });
        }
        if !collected.failures.is_empty() {
            eprintln!(
                "Skipped {} of {} reports, see warnings above",
                collected.failures.len(),
                urls.len()
            );
        }

        let ids: Vec<String> = collected.items.iter().map(|r| r.id.clone()).collect();
        for report in collected.items {
            state.merge_report(report);
        }

        // Whatever was reserved before a failure is still written back.
        let reserved = Reservations::new(self.prompt, authority, self.product).run(&mut state, &ids);
        let saved = self.save(&mut state);
        let outcomes = reserved?;
        saved?;

        let mut requested = 0;
        let mut assigned = Vec::new();
        for (_, outcome) in &outcomes {
            if let ReservationOutcome::Reserved(response) = outcome {
                requested += 1;
                if let ReservationResponse::Assigned { cve_ids } = response {
                    assigned.extend(cve_ids.iter().map(String::as_str));
                }
            }
        }
        eprintln!("Requested CVEs for {requested} of {} reports", outcomes.len());
        if !assigned.is_empty() {
            eprintln!("Assigned {}", assigned.join(", "));
        }
        Ok(())
    }

    /// Sets the release date. Returns whether it changed.
    pub fn update_date(&self, raw: &str) -> Result<bool> {
        let date = storage::parse_release_date(raw)?;
        let changed = self
            .store
            .update_release_date(date, self.publisher)
            .map_err(ReleaseError::Persistence)?;

        if changed {
            eprintln!("Release date set to {}", storage::format_release_date(date));
        } else {
            eprintln!("Release date already {}", storage::format_release_date(date));
        }
        Ok(changed)
    }

    /// Writes the pre-release announcement into `dir`.
    pub fn pre_release(&self, template: &str, dir: &Path) -> Result<PathBuf> {
        let state = self.store.load()?;
        let document = Assembler::new(self.prompt, self.product).pre_release(template, &state)?;

        let path = dir.join(announce::file_name(state.release_date()));
        fs::write(&path, document)?;
        eprintln!("Pre-release announcement file created at {}", path.display());
        Ok(path)
    }

    /// Rewrites an existing pre-release document as the post-release one.
    ///
    /// Anything filled in along the way is saved to the release record.
    pub fn post_release(&self, template: &str, source: &dyn ReportSource, pre_release: Option<&Path>) -> Result<PathBuf> {
        let mut state = self.store.load()?;

        let path = match pre_release {
            Some(path) if path.exists() => path.to_path_buf(),
            Some(path) => return Err(ReleaseError::PreReleaseNotFound(path.to_path_buf())),
            None => self.ask_pre_release_path(&state)?,
        };
        let existing = fs::read_to_string(&path)?;

        let header = Assembler::new(self.prompt, self.product).post_release(template, &mut state, source)?;
        fs::write(&path, announce::splice(&header, &existing))?;
        eprintln!("Post-release announcement file updated at {}", path.display());

        self.save(&mut state)?;
        Ok(path)
    }

    /// Opens a heads-up issue in each repository, in parallel. Returns the
    /// issue URLs in repository order.
    pub fn notify(&self, repositories: &[Repository]) -> Result<Vec<String>> {
        let state = self.store.load()?;
        let title = format!(
            "[NEXT-SECURITY-RELEASE] Heads up on upcoming {} security release {}",
            self.product,
            storage::format_release_date(state.release_date())
        );

        let tracker = self.tracker;
        let title = title.as_str();
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = repositories
                .iter()
                .map(|repo| scope.spawn(move || tracker.create_issue(repo, title, HEADS_UP_BODY)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut urls = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (repo, result) in repositories.iter().zip(results) {
            match result {
                Ok(url) => {
                    eprintln!("Created: {url}");
                    urls.push(url);
                }
                Err(e) => {
                    tracing::error!(%repo, error = %e, "failed to create heads-up issue");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(urls),
        }
    }

    fn ask_pre_release_path(&self, state: &ReleaseState) -> Result<PathBuf> {
        let default = announce::file_name(state.release_date());
        let mut last = PathBuf::from(&default);
        for _ in 0..PATH_ATTEMPTS {
            let answer = self
                .prompt
                .input("Please provide the path of the existing pre-release announcement:", &default)?;
            last = PathBuf::from(answer.trim());
            if !answer.trim().is_empty() && last.exists() {
                return Ok(last);
            }
            eprintln!("No file at {}", last.display());
        }
        Err(ReleaseError::PreReleaseNotFound(last))
    }

    fn save(&self, state: &mut ReleaseState) -> Result<()> {
        match self.store.save(state, self.publisher) {
            Ok(true) => {
                eprintln!("Updated {}", self.store.path().display());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                tracing::error!(path = %self.store.path().display(), error = %e, "failed to update release record");
                Err(ReleaseError::Persistence(e))
            }
        }
    }
}

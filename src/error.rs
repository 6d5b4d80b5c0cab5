//! Run-level errors.
//!
//! Every variant ends the run with a non-zero exit. Per-report fetch failures
//! never reach this level; they are logged and skipped where they happen.

use std::io;
use std::path::PathBuf;

use crate::announce::AnnounceError;
use crate::config::ConfigError;
use crate::model::Repository;
use crate::reserve::ReservationError;
use crate::source::{GitHubError, HackerOneError};
use crate::storage::StorageError;
use crate::vcs::VcsError;

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("no HackerOne report links found in {repo}#{number}")]
    NoReportReferencesFound { repo: Repository, number: u64 },

    #[error("none of the {attempted} referenced reports could be retrieved")]
    NoReportsRetrieved { attempted: usize },

    #[error(transparent)]
    HackerOne(#[from] HackerOneError),

    #[error("CVE reservation stopped: {0}")]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Announce(#[from] AnnounceError),

    /// The release record could not be loaded or is invalid.
    #[error(transparent)]
    State(#[from] StorageError),

    /// The release record could not be written back or published.
    #[error("failed to update the release record: {0}")]
    Persistence(#[source] StorageError),

    #[error("failed to check out the release branch: {0}")]
    Checkout(#[from] VcsError),

    #[error("pre-release announcement not found at {0}")]
    PreReleaseNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, ReleaseError>;

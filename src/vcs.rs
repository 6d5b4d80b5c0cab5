//! Git operations on the release branch: checkout before work, commit and
//! push after the release record changes.

use std::io;
use std::path::Path;
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

pub type Result<T> = core::result::Result<T, VcsError>;

/// Publishes a changed file so other operators see it.
pub trait Publisher {
    fn publish(&self, path: &Path, message: &str) -> Result<()>;
}

/// The release branch in the current working tree.
pub struct Git {
    branch: String,
}

impl Git {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
        }
    }

    /// Switches the working tree to the release branch.
    pub fn checkout(&self) -> Result<()> {
        run_git(&["checkout", &self.branch])?;
        Ok(())
    }
}

impl Publisher for Git {
    fn publish(&self, path: &Path, message: &str) -> Result<()> {
        let path = path.to_string_lossy();
        run_git(&["add", &path])?;
        run_git(&["commit", "-m", message, "--", &path])?;
        run_git(&["push", "origin", &self.branch])?;
        Ok(())
    }
}

/// Leaves changes in the working tree; used when git integration is off.
pub struct LocalOnly;

impl Publisher for LocalOnly {
    fn publish(&self, path: &Path, _message: &str) -> Result<()> {
        tracing::info!(path = %path.display(), "git disabled, leaving change uncommitted");
        Ok(())
    }
}

/// Run a git command and return its stdout on success.
fn run_git(args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).output()?;

    if !output.status.success() {
        return Err(VcsError::Command {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
pub use recording::RecordingPublisher;

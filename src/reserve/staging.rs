//! Staged reservation requests.
//!
//! Requests are written to a temporary directory for the operator to review
//! and edit before submission. The directory lives for one reservation batch
//! and each file for one attempt; both are removed when dropped, so every
//! exit path cleans up.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::model::ReservationRequest;

use super::{ReservationError, Result};

/// Temporary directory holding staged requests for one batch.
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("secrel-cve-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a request as pretty JSON, named after its report.
    pub fn stage(&self, request: &ReservationRequest) -> Result<StagedArtifact> {
        let path = self.artifact_path(&request.report_id);
        let mut json = serde_json::to_string_pretty(request)?;
        json.push('\n');
        fs::write(&path, &json)?;

        Ok(StagedArtifact {
            path,
            digest: digest(json.as_bytes()),
        })
    }

    pub fn artifact_path(&self, report_id: &str) -> PathBuf {
        let name: String = report_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.path().join(format!("cve-request-{name}.json"))
    }
}

/// One staged request file. Removed on drop.
pub struct StagedArtifact {
    path: PathBuf,
    digest: String,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file as the operator left it.
    ///
    /// Returns the body and whether it differs from what was staged. The
    /// body must still be a JSON object.
    pub fn read(&self) -> Result<(Value, bool)> {
        let bytes = fs::read(&self.path)?;
        let edited = digest(&bytes) != self.digest;
        let body: Value = serde_json::from_slice(&bytes)?;
        if !body.is_object() {
            return Err(ReservationError::InvalidArtifact(self.path.clone()));
        }
        Ok((body, edited))
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staged request");
        }
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReservationRequest {
        ReservationRequest {
            report_id: "2254851".into(),
            title: "Smuggling".into(),
            description: String::new(),
            severity: Some("High".into()),
            affected_versions: vec!["20.x".into()],
            product: "Node.js".into(),
            references: vec!["https://hackerone.com/reports/2254851".into()],
        }
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let staging = StagingDir::new().unwrap();
        let artifact = staging.stage(&request()).unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let staging = StagingDir::new().unwrap();
        let dir = staging.path().to_path_buf();
        let _artifact = staging.stage(&request()).unwrap();

        drop(_artifact);
        drop(staging);
        assert!(!dir.exists());
    }

    #[test]
    fn unedited_artifact_reads_back_unchanged() {
        let staging = StagingDir::new().unwrap();
        let artifact = staging.stage(&request()).unwrap();

        let (body, edited) = artifact.read().unwrap();
        assert!(!edited);
        assert_eq!(body["reportId"], "2254851");
    }

    #[test]
    fn detects_operator_edits() {
        let staging = StagingDir::new().unwrap();
        let artifact = staging.stage(&request()).unwrap();
        fs::write(artifact.path(), r#"{"reportId":"2254851","description":"Edited."}"#).unwrap();

        let (body, edited) = artifact.read().unwrap();
        assert!(edited);
        assert_eq!(body["description"], "Edited.");
    }

    #[test]
    fn non_object_artifact_is_rejected() {
        let staging = StagingDir::new().unwrap();
        let artifact = staging.stage(&request()).unwrap();
        fs::write(artifact.path(), "[1, 2]").unwrap();

        assert!(matches!(artifact.read(), Err(ReservationError::InvalidArtifact(_))));
    }

    #[test]
    fn report_ids_are_sanitized_into_file_names() {
        let staging = StagingDir::new().unwrap();
        let path = staging.artifact_path("../evil");
        assert_eq!(path.parent().unwrap(), staging.path());
        assert!(path.ends_with("cve-request-___evil.json"));
    }
}

//! CVE reservation.
//!
//! Each report moves through check, stage, confirm, and reserve. A failure
//! anywhere stops the remaining batch; reservations are not attempted past an
//! error the operator has not seen.

mod authority;
mod staging;

use std::io;
use std::path::PathBuf;

use jiff::Timestamp;

use crate::batch;
use crate::model::{CveRequest, CveRequestStatus, ReleaseState, ReservationRequest, ReservationResponse};
use crate::prompt::Prompt;

pub use authority::{HttpAuthority, ReservationAuthority};
pub use staging::StagingDir;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("report {0} is not in the release record")]
    UnknownReport(String),

    #[error("staged request {0} is not a JSON object")]
    InvalidArtifact(PathBuf),

    #[error("CVE request for report {report_id} was rejected: {message}")]
    Rejected { report_id: String, message: String },

    #[error("CVE authority assigned no identifiers for report {0}")]
    EmptyAssignment(String),

    #[error("CVE authority accepted the request for report {report_id} but its answer was not understood: {body}")]
    UnrecognizedResponse { report_id: String, body: String },

    #[error("CVE authority returned {status} for report {report_id}")]
    Status {
        report_id: String,
        status: reqwest::StatusCode,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = core::result::Result<T, ReservationError>;

/// How one report's reservation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// The report already had identifiers and the override was declined.
    KeptExisting,

    /// The operator declined to submit the staged request.
    Declined,

    /// The authority answered and the answer was recorded.
    Reserved(ReservationResponse),
}

/// Drives reservations for a batch of reports.
pub struct Reservations<'a> {
    prompt: &'a dyn Prompt,
    authority: &'a dyn ReservationAuthority,
    product: &'a str,
}

impl<'a> Reservations<'a> {
    pub fn new(prompt: &'a dyn Prompt, authority: &'a dyn ReservationAuthority, product: &'a str) -> Self {
        Self {
            prompt,
            authority,
            product,
        }
    }

    /// Reserves identifiers for `report_ids`, in order.
    ///
    /// The staging directory exists for the duration of this call only.
    pub fn run(&self, state: &mut ReleaseState, report_ids: &[String]) -> Result<Vec<(String, ReservationOutcome)>> {
        let staging = StagingDir::new()?;
        self.run_in(&staging, state, report_ids)
    }

    /// Like [`run`](Self::run), staging into a caller-owned directory.
    pub fn run_in(
        &self,
        staging: &StagingDir,
        state: &mut ReleaseState,
        report_ids: &[String],
    ) -> Result<Vec<(String, ReservationOutcome)>> {
        batch::fail_fast(report_ids, |id| {
            let outcome = self.reserve_one(staging, state, id)?;
            Ok((id.clone(), outcome))
        })
    }

    fn reserve_one(&self, staging: &StagingDir, state: &mut ReleaseState, id: &str) -> Result<ReservationOutcome> {
        let report = state
            .report(id)
            .cloned()
            .ok_or_else(|| ReservationError::UnknownReport(id.to_string()))?;

        if report.has_reservation() {
            let existing = if !report.cve_ids.is_empty() {
                report.cve_ids.join(", ")
            } else if report
                .cve_request
                .as_ref()
                .is_some_and(|r| r.status == CveRequestStatus::Unconfirmed)
            {
                "an unconfirmed CVE request".to_string()
            } else {
                "a pending CVE request".to_string()
            };
            let question = format!("Report {id} already has {existing}. Request a new CVE anyway?");
            if !self.prompt.confirm(&question, false)? {
                tracing::info!(report = %id, "keeping existing CVE reservation");
                return Ok(ReservationOutcome::KeptExisting);
            }
        }

        let request = ReservationRequest::for_report(&report, self.product);
        let artifact = staging.stage(&request)?;
        eprintln!("Staged CVE request for report {id}: {}", artifact.path().display());
        eprintln!("Review or edit it before continuing.");

        let question = format!("Request a CVE for report {id} ({})?", report.title);
        if !self.prompt.confirm(&question, true)? {
            drop(artifact);
            tracing::error!(report = %id, "CVE request not submitted, operator declined");
            return Ok(ReservationOutcome::Declined);
        }

        let response = {
            let (body, edited) = artifact.read()?;
            if edited {
                eprintln!("Submitting edited request for report {id}");
            }
            self.authority.reserve(id, &body)?
        };
        drop(artifact);

        record(state, id, &response)?;
        Ok(ReservationOutcome::Reserved(response))
    }
}

/// Stores the authority's answer on the report.
fn record(state: &mut ReleaseState, id: &str, response: &ReservationResponse) -> Result<()> {
    match response {
        ReservationResponse::Assigned { cve_ids } => {
            if cve_ids.is_empty() {
                return Err(ReservationError::EmptyAssignment(id.to_string()));
            }
            state.update_report(id, |r| {
                r.cve_ids.clone_from(cve_ids);
                r.cve_request = None;
            });
            eprintln!("Reserved {} for report {id}", cve_ids.join(", "));
        }
        ReservationResponse::Pending { reference } => {
            state.update_report(id, |r| {
                r.cve_request = Some(CveRequest {
                    status: CveRequestStatus::Pending,
                    reference: reference.clone(),
                    requested_at: Timestamp::now(),
                });
            });
            eprintln!("CVE request for report {id} is pending");
        }
        ReservationResponse::Rejected { message } => {
            return Err(ReservationError::Rejected {
                report_id: id.to_string(),
                message: message.clone(),
            });
        }
        ReservationResponse::Unrecognized { reference, body } => {
            // The authority has the request; record it before failing.
            state.update_report(id, |r| {
                r.cve_request = Some(CveRequest {
                    status: CveRequestStatus::Unconfirmed,
                    reference: reference.clone(),
                    requested_at: Timestamp::now(),
                });
            });
            return Err(ReservationError::UnrecognizedResponse {
                report_id: id.to_string(),
                body: body.clone(),
            });
        }
    }
    Ok(())
}

//! Core data model for secrel.
//!
//! These types represent a security release as it moves through the pipeline:
//! the tracking issue it starts from, the vulnerability reports it correlates,
//! the persisted release state, and the CVE reservation exchange.

mod issue;
mod report;
mod reservation;
mod state;

pub use issue::{ReleaseIssue, Repository};
pub use report::{CveRequest, CveRequestStatus, Severity, VulnerabilityReport};
pub use reservation::{ReservationRequest, ReservationResponse};
pub use state::{DependencyUpdate, ReleaseState};

//! CVE reservation exchange: what is staged for review and what comes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::VulnerabilityReport;

/// The reviewable request staged for one report.
///
/// Written to disk for the operator to inspect and edit before submission.
/// The submitted body is whatever the file holds at confirmation time, so
/// this type only describes the initial contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub report_id: String,
    pub title: String,
    pub description: String,
    pub severity: Option<String>,
    pub affected_versions: Vec<String>,
    pub product: String,
    pub references: Vec<String>,
}

impl ReservationRequest {
    pub fn for_report(report: &VulnerabilityReport, product: &str) -> Self {
        Self {
            report_id: report.id.clone(),
            title: report.title.clone(),
            description: report.description().unwrap_or_default().to_string(),
            severity: report.severity_rating().map(str::to_string),
            affected_versions: report.affected_versions.clone(),
            product: product.to_string(),
            references: vec![report.platform_url()],
        }
    }
}

/// What the reservation authority answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReservationResponse {
    /// Identifiers were assigned immediately.
    #[serde(rename_all = "camelCase")]
    Assigned { cve_ids: Vec<String> },

    /// The request was accepted and will be assigned later.
    Pending {
        #[serde(default)]
        reference: Option<String>,
    },

    /// The authority refused the request.
    Rejected {
        #[serde(default)]
        message: String,
    },

    /// A successful answer in a shape not listed above. The request was
    /// still made.
    #[serde(skip)]
    Unrecognized { reference: Option<String>, body: String },
}

impl ReservationResponse {
    /// Reads a successful response body.
    ///
    /// Never fails: a body without a known `status` becomes
    /// [`Unrecognized`](Self::Unrecognized), keeping whatever id it carries
    /// (`data.id`, `id` or `reference`) as the reference.
    pub fn from_body(body: &str) -> Self {
        if let Ok(response) = serde_json::from_str(body) {
            return response;
        }

        let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let reference = ["/data/id", "/id", "/reference"]
            .into_iter()
            .filter_map(|pointer| value.pointer(pointer))
            .find_map(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Self::Unrecognized {
            reference,
            body: body.to_string(),
        }
    }
}

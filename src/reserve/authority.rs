//! The CVE reservation authority.

use std::time::Duration;

use serde_json::Value;

use crate::model::ReservationResponse;

use super::{ReservationError, Result};

/// Issues CVE identifiers.
pub trait ReservationAuthority {
    /// Submits a reviewed request for one report.
    ///
    /// The body is submitted as-is. Any successful answer means the request
    /// was made, even when its body cannot be read.
    fn reserve(&self, report_id: &str, request: &Value) -> Result<ReservationResponse>;
}

/// [`ReservationAuthority`] reached over HTTP with basic auth.
pub struct HttpAuthority {
    client: reqwest::blocking::Client,
    endpoint: String,
    username: String,
    token: String,
}

impl HttpAuthority {
    /// `endpoint` may contain `{report_id}`, replaced on each request.
    pub fn new(endpoint: &str, username: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            token: token.to_string(),
        })
    }

    fn url_for(&self, report_id: &str) -> String {
        self.endpoint.replace("{report_id}", report_id)
    }
}

impl ReservationAuthority for HttpAuthority {
    fn reserve(&self, report_id: &str, request: &Value) -> Result<ReservationResponse> {
        let response = self
            .client
            .post(self.url_for(report_id))
            .basic_auth(&self.username, Some(&self.token))
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReservationError::Status {
                report_id: report_id.to_string(),
                status,
            });
        }

        let body = response.text().unwrap_or_else(|error| {
            tracing::warn!(report = %report_id, %error, "could not read CVE authority response");
            String::new()
        });
        Ok(ReservationResponse::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answers one request with `status` and `body`. Yields the request body.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request = vec![0; content_length];
            reader.read_exact(&mut request).unwrap();

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8(request).unwrap()
        });
        (format!("http://{addr}/reports/{{report_id}}/cve_requests"), handle)
    }

    #[test]
    fn success_in_unknown_shape_is_still_a_made_request() {
        let (endpoint, server) = serve_once(
            "201 Created",
            r#"{"data":{"id":"77","type":"cve-request","attributes":{"state":"pending_hackerone_approval"}}}"#,
        );
        let authority = HttpAuthority::new(&endpoint, "user", "token").unwrap();

        let response = authority
            .reserve("2254851", &serde_json::json!({"reportId": "2254851"}))
            .unwrap();

        assert!(matches!(
            response,
            ReservationResponse::Unrecognized { reference: Some(ref id), .. } if id == "77"
        ));
        let sent: Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(sent["reportId"], "2254851");
    }

    #[test]
    fn tagged_answer_is_read() {
        let (endpoint, server) = serve_once("200 OK", r#"{"status":"assigned","cveIds":["CVE-2024-1"]}"#);
        let authority = HttpAuthority::new(&endpoint, "user", "token").unwrap();

        let response = authority.reserve("1", &serde_json::json!({})).unwrap();

        assert_eq!(
            response,
            ReservationResponse::Assigned {
                cve_ids: vec!["CVE-2024-1".into()]
            }
        );
        server.join().unwrap();
    }

    #[test]
    fn error_status_is_an_error() {
        let (endpoint, server) = serve_once("422 Unprocessable Entity", r#"{"errors":[]}"#);
        let authority = HttpAuthority::new(&endpoint, "user", "token").unwrap();

        let err = authority.reserve("1", &serde_json::json!({})).unwrap_err();

        assert!(matches!(err, ReservationError::Status { status, .. } if status.as_u16() == 422));
        server.join().unwrap();
    }

    #[test]
    fn endpoint_template_is_filled_per_report() {
        let authority = HttpAuthority::new(
            "https://cve.example/v1/reports/{report_id}/cve_requests",
            "user",
            "token",
        )
        .unwrap();

        assert_eq!(
            authority.url_for("2254851"),
            "https://cve.example/v1/reports/2254851/cve_requests"
        );
    }
}

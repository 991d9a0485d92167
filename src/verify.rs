//! Verification client.
//!
//! Submits a decoded one-time token to the redemption backend and folds the
//! HTTP result into a [`VerificationOutcome`]. Never retries on its own.

use std::future::Future;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::types::DecodedPayload;

/// Result of one verification round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The backend recognised the token; `data` is its payload, untouched.
    Validated { data: Value },
    /// The backend answered in its documented "no such token" shape.
    NotFound { message: Option<String> },
    /// Transport failure, non-success status, or an unreadable body.
    Failed { reason: String },
}

impl VerificationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, VerificationOutcome::Failed { .. })
    }
}

/// The external validation collaborator.
pub trait Verifier: Send + Sync + 'static {
    fn verify(&self, payload: &DecodedPayload) -> impl Future<Output = VerificationOutcome> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    one_time_token: &'a str,
}

/// What the token service encodes into the code it issues.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedCode {
    token: Option<String>,
    one_time_token: Option<String>,
}

/// Token to submit for a decoded payload. Issued codes are JSON objects
/// carrying a `token`; anything else is submitted verbatim.
pub fn one_time_token(payload: &str) -> String {
    match serde_json::from_str::<IssuedCode>(payload) {
        Ok(code) => code
            .token
            .or(code.one_time_token)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| payload.to_string()),
        Err(_) => payload.to_string(),
    }
}

/// Map an HTTP status and body to an outcome.
///
/// `{exists:false}` is "not found" on any status. Any other non-2xx is a
/// failure. A 2xx JSON body is validated: `{exists:true, data}` yields
/// `data`, any other JSON (including `exists:true` without `data`) yields
/// the whole body.
pub fn classify(status: u16, body: &str) -> VerificationOutcome {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(Value::Object(map)) = &parsed {
        if map.get("exists") == Some(&Value::Bool(false)) {
            let message = map.get("message").and_then(Value::as_str).map(str::to_string);
            return VerificationOutcome::NotFound { message };
        }
    }

    if !(200..300).contains(&status) {
        let reason = format!("server error ({status}) {}", body.trim());
        return VerificationOutcome::Failed { reason: reason.trim_end().to_string() };
    }

    match parsed {
        Some(Value::Object(mut map)) if map.get("exists") == Some(&Value::Bool(true)) => {
            match map.remove("data") {
                Some(data) => VerificationOutcome::Validated { data },
                None => VerificationOutcome::Validated { data: Value::Object(map) },
            }
        }
        Some(other) => VerificationOutcome::Validated { data: other },
        None => VerificationOutcome::Failed { reason: format!("malformed response body ({status})") },
    }
}

/// `POST {backend}/redemption/verify-token` with `{"oneTimeToken": ...}`.
pub struct HttpVerifier {
    client: Client,
    url: Option<String>,
    session_token: Option<String>,
}

impl HttpVerifier {
    pub fn new(config: &ScannerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            url: config.verify_url(),
            session_token: config.session_token.clone(),
        })
    }
}

impl Verifier for HttpVerifier {
    async fn verify(&self, payload: &DecodedPayload) -> VerificationOutcome {
        let Some(url) = self.url.as_deref() else {
            warn!("verification skipped: no backend address");
            return VerificationOutcome::Failed { reason: "backend address not configured".to_string() };
        };

        let token = one_time_token(payload.as_str());
        let mut request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&VerifyRequest { one_time_token: &token });
        if let Some(session) = &self.session_token {
            request = request.header("auth", session);
        }

        info!(%url, "verifying scanned token");
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("verification request failed: {e}");
                return VerificationOutcome::Failed { reason: format!("request failed: {e}") };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("reading verification response failed: {e}");
                return VerificationOutcome::Failed { reason: format!("reading response failed: {e}") };
            }
        };

        let outcome = classify(status.as_u16(), &body);
        match &outcome {
            VerificationOutcome::Validated { .. } => info!(%status, "token validated"),
            VerificationOutcome::NotFound { .. } => info!(%status, "token not found"),
            VerificationOutcome::Failed { reason } => warn!(%status, %reason, "verification failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn found_shape_yields_inner_data() {
        let out = classify(200, r#"{"exists":true,"data":{"objectId":"X"}}"#);
        assert_eq!(out, VerificationOutcome::Validated { data: json!({"objectId": "X"}) });
    }

    #[test]
    fn found_shape_without_data_keeps_the_whole_body() {
        let out = classify(200, r#"{"exists":true,"objectId":"X","owner":"0xabc"}"#);
        assert_eq!(
            out,
            VerificationOutcome::Validated { data: json!({"exists": true, "objectId": "X", "owner": "0xabc"}) }
        );
    }

    #[test]
    fn other_success_json_is_passed_through_whole() {
        let out = classify(201, r#"{"objectId":"X","remaining":"3"}"#);
        assert_eq!(out, VerificationOutcome::Validated { data: json!({"objectId": "X", "remaining": "3"}) });
    }

    #[test]
    fn not_found_shape_wins_over_status() {
        assert_eq!(
            classify(404, r#"{"exists":false}"#),
            VerificationOutcome::NotFound { message: None }
        );
        assert_eq!(
            classify(200, r#"{"exists":false,"message":"expired"}"#),
            VerificationOutcome::NotFound { message: Some("expired".into()) }
        );
    }

    #[test]
    fn non_success_without_known_shape_fails() {
        let out = classify(500, "upstream exploded");
        assert_eq!(out, VerificationOutcome::Failed { reason: "server error (500) upstream exploded".into() });
        assert!(classify(404, r#"{"error":"failed to verify"}"#).is_failure());
        assert!(classify(401, "").is_failure());
    }

    #[test]
    fn success_with_unreadable_body_fails() {
        assert!(classify(200, "<html>ok</html>").is_failure());
    }

    #[test]
    fn token_is_extracted_from_issued_code() {
        let issued = r#"{"token":"abc123","objectId":"0x9","expiresAt":"2026-01-01T00:00:00Z"}"#;
        assert_eq!(one_time_token(issued), "abc123");
        assert_eq!(one_time_token(r#"{"oneTimeToken":"zz"}"#), "zz");
    }

    #[test]
    fn opaque_payloads_are_submitted_verbatim() {
        assert_eq!(one_time_token("plain-token"), "plain-token");
        assert_eq!(one_time_token(r#"{"objectId":"0x9"}"#), r#"{"objectId":"0x9"}"#);
        assert_eq!(one_time_token("42"), "42");
    }

    #[tokio::test]
    async fn missing_backend_is_a_failed_outcome() {
        let verifier = HttpVerifier::new(&ScannerConfig::default()).unwrap();
        let out = verifier.verify(&DecodedPayload::from("T1")).await;
        assert_eq!(out, VerificationOutcome::Failed { reason: "backend address not configured".into() });
    }
}

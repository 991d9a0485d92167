use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use redeem_scanner::{DecodedPayload, HttpVerifier, ScannerConfig, VerificationOutcome, Verifier};

/// One request seen by the stub backend, split at the blank line.
struct Recorded {
    head: String,
    body: String,
}

/// Accept a single connection, answer it with `status` and `body`, and hand
/// back what the client sent.
async fn stub_backend(status: &'static str, body: &'static str) -> (String, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub backend");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        let recorded = loop {
            let n = stream.read(&mut chunk).await.expect("read request");
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let length = head
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                let body = &text[split + 4..];
                if body.len() >= length || n == 0 {
                    break Recorded { head, body: body.to_string() };
                }
            }
            if n == 0 {
                break Recorded { head: text, body: String::new() };
            }
        };

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.expect("write response");
        stream.shutdown().await.ok();
        recorded
    });

    (base, server)
}

fn verifier_for(base: &str) -> HttpVerifier {
    let config = ScannerConfig {
        backend_url: Some(base.to_string()),
        session_token: Some("sess".to_string()),
        ..ScannerConfig::default()
    };
    HttpVerifier::new(&config).expect("http client")
}

#[tokio::test]
async fn posts_the_extracted_token_with_session_headers() {
    let (base, server) = stub_backend("404 Not Found", r#"{"exists":false}"#).await;
    let issued = DecodedPayload::from(r#"{"token":"abc","objectId":"0x9","expiresAt":"2026-12-31T00:00:00Z"}"#);

    let out = verifier_for(&base).verify(&issued).await;
    assert_eq!(out, VerificationOutcome::NotFound { message: None });

    let seen = server.await.expect("stub backend task");
    let head = seen.head.to_ascii_lowercase();
    assert!(seen.head.starts_with("POST /redemption/verify-token HTTP/1.1"), "{}", seen.head);
    assert!(head.contains("\r\nauth: sess"), "{}", seen.head);
    assert!(head.contains("\r\naccept: application/json"), "{}", seen.head);
    assert!(head.contains("\r\ncontent-type: application/json"), "{}", seen.head);
    assert_eq!(seen.body, r#"{"oneTimeToken":"abc"}"#);
}

#[tokio::test]
async fn found_response_is_validated_with_its_data() {
    let (base, server) =
        stub_backend("200 OK", r#"{"exists":true,"data":{"objectId":"X","owner":"0xabc"}}"#).await;

    let out = verifier_for(&base).verify(&DecodedPayload::from("plain-token")).await;
    assert_eq!(out, VerificationOutcome::Validated { data: json!({"objectId": "X", "owner": "0xabc"}) });

    let seen = server.await.expect("stub backend task");
    assert_eq!(seen.body, r#"{"oneTimeToken":"plain-token"}"#);
}

#[tokio::test]
async fn server_error_is_a_failure() {
    let (base, _server) = stub_backend("502 Bad Gateway", "upstream down").await;

    let out = verifier_for(&base).verify(&DecodedPayload::from("T1")).await;
    assert_eq!(out, VerificationOutcome::Failed { reason: "server error (502) upstream down".into() });
}

#[tokio::test]
async fn refused_connection_is_a_failure() {
    // Bind then drop, so nothing listens on the port.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    drop(listener);

    let out = verifier_for(&base).verify(&DecodedPayload::from("T1")).await;
    match out {
        VerificationOutcome::Failed { reason } => assert!(reason.starts_with("request failed"), "{reason}"),
        other => panic!("expected a failure, got {other:?}"),
    }
}

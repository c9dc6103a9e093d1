//! Test fixtures: inbound email payloads and signed webhook requests.

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use chrono::{DateTime, Utc};
use lettertree_core::domains::newsletter::signature::{
    sign, SIGNATURE_HEADER, TIMESTAMP_HEADER, WORKER_VERSION_HEADER,
};
use lettertree_core::domains::newsletter::webhook::WEBHOOK_PATH;
use lettertree_core::kernel::test_dependencies::TEST_WEBHOOK_SECRET;
use serde_json::{json, Value};

/// Forwarding address owned by the default test user.
pub const ALICE_INBOX: &str = "alice@lettertr.ee";

pub const SENDER: &str = "weekly@brief.example.org";

/// Newsletter HTML with a real thumbnail, a "read more" link and
/// business-flavoured copy.
pub fn newsletter_html(headline: &str) -> String {
    format!(
        r#"<html><body>
          <img src="https://cdn.example.org/logo.png" width="120">
          <img src="https://cdn.example.org/hero-{slug}.png" width="600">
          <h1>{headline}</h1>
          <p>A startup closed its funding round this week.</p>
          <a href="https://brief.example.org/issues/{slug}">Read more</a>
          <a href="https://brief.example.org/unsubscribe">Unsubscribe</a>
        </body></html>"#,
        slug = headline.to_lowercase().replace(' ', "-"),
        headline = headline,
    )
}

/// Payload as posted by the email worker.
pub fn email_payload(to: &str, from: &str, subject: &str, html: &str) -> Value {
    json!({
        "messageId": format!("<{}@mail.example.org>", uuid::Uuid::new_v4()),
        "from": {"address": from, "name": "The Brief"},
        "to": [{"address": to, "name": ""}],
        "subject": subject,
        "bodyHtml": html,
        "bodyText": null,
        "headers": {"list-id": "<brief.example.org>"},
        "attachments": [{
            "filename": "issue.pdf",
            "contentType": "application/pdf",
            "size": 5,
            "content": "aGVsbG8="
        }],
        "receivedAt": "2025-06-01T09:30:00Z",
        "rawSize": 4096
    })
}

/// Default payload: ALICE_INBOX receiving an issue from SENDER.
pub fn issue_payload(headline: &str) -> Value {
    email_payload(ALICE_INBOX, SENDER, headline, &newsletter_html(headline))
}

/// POST `body` signed with `secret` as if sent at `sent_at`.
pub fn signed_request(body: Vec<u8>, secret: &str, sent_at: DateTime<Utc>) -> Request<Body> {
    let timestamp = sent_at.timestamp_millis().to_string();
    let signature = sign(secret, &timestamp, &body);

    Request::builder()
        .method(Method::POST)
        .uri(WEBHOOK_PATH)
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp)
        .header(WORKER_VERSION_HEADER, "test-worker/1.0")
        .body(Body::from(body))
        .unwrap()
}

/// POST `payload` signed with the test secret, sent now.
pub fn signed_json_request(payload: &Value) -> Request<Body> {
    signed_request(
        serde_json::to_vec(payload).unwrap(),
        TEST_WEBHOOK_SECRET,
        Utc::now(),
    )
}

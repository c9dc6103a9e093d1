//! Inbound email payload posted by the email worker.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::IngestSettings;

use super::email_parser;

lazy_static! {
    static ref EMAIL_ADDRESS: Regex =
        Regex::new(r"^[^\s@<>()\[\],;:]+@[^\s@<>()\[\],;:]+\.[^\s@<>()\[\],;:]+$").unwrap();
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    pub message_id: String,
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    pub headers: HashMap<String, String>,
    pub attachments: Vec<Attachment>,
    pub received_at: DateTime<Utc>,
    pub raw_size: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailAddress {
    pub address: String,
    /// Display name; the worker sends `""` when there is none.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    /// Base64 body. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Where an inbound email should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Addressed to our own outbound sender (bounce or auto-reply).
    Loopback,
    /// Not addressed to the reserved inbox domain.
    ForeignDomain(Option<String>),
    /// Deliver to the user owning this (lower-cased) inbox address.
    Deliver(String),
}

impl InboundEmail {
    /// Parse and validate a raw request body.
    ///
    /// JSON syntax errors and schema violations are reported the same way.
    pub fn from_slice(body: &[u8]) -> Result<Self, String> {
        let email: Self = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        email.validate()?;
        Ok(email)
    }

    /// Checks serde cannot express. The sender may be any string because
    /// SRS-rewritten envelope senders are not always valid addresses.
    pub fn validate(&self) -> Result<(), String> {
        for (i, recipient) in self.to.iter().enumerate() {
            if !EMAIL_ADDRESS.is_match(recipient.address.trim()) {
                return Err(format!("to[{}].address: invalid email address", i));
            }
        }
        Ok(())
    }

    pub fn recipient(&self) -> Option<String> {
        self.to
            .first()
            .map(|to| to.address.trim().to_lowercase())
            .filter(|a| !a.is_empty())
    }

    pub fn route(&self, settings: &IngestSettings) -> Route {
        let Some(recipient) = self.recipient() else {
            return Route::ForeignDomain(None);
        };

        if recipient == settings.mail_from.to_lowercase() {
            return Route::Loopback;
        }

        let suffix = format!("@{}", settings.inbox_domain.to_lowercase());
        if !recipient.ends_with(&suffix) {
            return Route::ForeignDomain(Some(recipient));
        }

        Route::Deliver(recipient)
    }

    pub fn sender_email(&self) -> String {
        email_parser::extract_address(&self.from.address)
            .unwrap_or_default()
            .to_lowercase()
    }

    /// `from.name`, else the name part of a `"Name <addr>"` address.
    pub fn sender_name(&self) -> Option<String> {
        Some(self.from.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| email_parser::display_name_from_header(&self.from.address))
    }

    /// Attachment descriptors with the binary content dropped.
    pub fn attachment_metadata(&self) -> Vec<Attachment> {
        self.attachments
            .iter()
            .map(|a| Attachment {
                content: None,
                ..a.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(to: &str) -> serde_json::Value {
        json!({
            "messageId": "<abc@mail.example.org>",
            "from": {"address": "Weekly@Example.org", "name": "  "},
            "to": [{"address": to, "name": ""}],
            "subject": "Issue #1",
            "bodyHtml": "<p>Hello</p>",
            "headers": {"x-mailer": "test"},
            "attachments": [{
                "filename": "a.pdf",
                "contentType": "application/pdf",
                "size": 12,
                "content": "aGVsbG8="
            }],
            "receivedAt": "2025-06-01T10:00:00.000Z",
            "rawSize": 2048
        })
    }

    fn parse(value: serde_json::Value) -> Result<InboundEmail, String> {
        InboundEmail::from_slice(&serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_parses_valid_payload() {
        let email = parse(payload("alice@lettertr.ee")).unwrap();

        assert_eq!(email.message_id, "<abc@mail.example.org>");
        assert_eq!(email.sender_email(), "weekly@example.org");
        assert_eq!(email.sender_name(), None);
        assert!(email.body_text.is_none());
        assert_eq!(email.raw_size, 2048);
    }

    #[test]
    fn test_rejects_missing_field_and_bad_json() {
        let mut value = payload("alice@lettertr.ee");
        value.as_object_mut().unwrap().remove("subject");

        assert!(parse(value).is_err());
        assert!(InboundEmail::from_slice(b"{not json").is_err());
    }

    #[test]
    fn test_rejects_missing_display_names() {
        let mut no_from_name = payload("alice@lettertr.ee");
        no_from_name["from"] = json!({"address": "weekly@example.org"});
        assert!(parse(no_from_name).unwrap_err().contains("name"));

        let mut no_to_name = payload("alice@lettertr.ee");
        no_to_name["to"] = json!([{"address": "alice@lettertr.ee"}]);
        assert!(parse(no_to_name).unwrap_err().contains("name"));
    }

    #[test]
    fn test_rejects_invalid_recipient_address() {
        let err = parse(payload("not an address")).unwrap_err();
        assert!(err.contains("to[0]"));
    }

    #[test]
    fn test_routes() {
        let settings = IngestSettings::default();

        assert_eq!(
            parse(payload("Alice@Lettertr.ee")).unwrap().route(&settings),
            Route::Deliver("alice@lettertr.ee".to_string())
        );
        assert_eq!(
            parse(payload("noreply@lettertr.ee")).unwrap().route(&settings),
            Route::Loopback
        );
        assert_eq!(
            parse(payload("user@otherdomain.com")).unwrap().route(&settings),
            Route::ForeignDomain(Some("user@otherdomain.com".to_string()))
        );

        let mut no_recipients = payload("alice@lettertr.ee");
        no_recipients["to"] = json!([]);
        assert_eq!(
            parse(no_recipients).unwrap().route(&settings),
            Route::ForeignDomain(None)
        );
    }

    #[test]
    fn test_sender_name_from_header_form() {
        let mut value = payload("alice@lettertr.ee");
        value["from"] = json!({"address": "\"The Brief\" <brief@example.org>", "name": ""});
        let email = parse(value).unwrap();

        assert_eq!(email.sender_name(), Some("The Brief".to_string()));
        assert_eq!(email.sender_email(), "brief@example.org");
    }

    #[test]
    fn test_attachment_content_dropped() {
        let email = parse(payload("alice@lettertr.ee")).unwrap();
        let meta = email.attachment_metadata();

        assert_eq!(meta[0].filename, "a.pdf");
        assert!(meta[0].content.is_none());
        assert!(serde_json::to_value(&meta).unwrap()[0].get("content").is_none());
    }
}

//! HMAC signature check for email worker webhooks.
//!
//! The worker signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the
//! hex digest in `x-cf-signature` and the epoch-millisecond timestamp in
//! `x-cf-timestamp`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-cf-signature";
pub const TIMESTAMP_HEADER: &str = "x-cf-timestamp";
pub const WORKER_VERSION_HEADER: &str = "x-cf-email-worker";

/// Accepted clock skew in either direction.
pub const REPLAY_WINDOW_MS: i64 = 300_000;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature against the raw request body.
///
/// Must run before the body is parsed. Comparison is constant-time.
pub fn verify_signature(
    raw_body: &[u8],
    signature: Option<&str>,
    timestamp: Option<&str>,
    secret: &str,
    now: DateTime<Utc>,
) -> bool {
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return false;
    };

    let Ok(sent_at_ms) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    if now.timestamp_millis().abs_diff(sent_at_ms) > REPLAY_WINDOW_MS as u64 {
        return false;
    }

    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.trim().as_bytes());
    mac.update(b".");
    mac.update(raw_body);

    mac.verify_slice(&provided).is_ok()
}

/// Hex signature for `body` sent at `timestamp` (epoch ms, as sent in the header).
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

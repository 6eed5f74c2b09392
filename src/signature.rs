//! Slack request signature verification

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State as AxumState},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::SharedState;
use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_VERSION: &str = "v0";

/// Requests older (or newer) than this many seconds are rejected
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Upper bound on a buffered request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn base_mac(secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{}:{}:", SIGNATURE_VERSION, timestamp).as_bytes());
    mac.update(body);
    Some(mac)
}

/// Compute `v0=<hex hmac>` for a body sent at `timestamp`
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mac = base_mac(secret, timestamp, body)?;
    Some(format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a Slack signature against `now` (unix seconds)
pub fn verify_slack_signature(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::StaleTimestamp)?;
    if (now - sent_at).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected_prefix = format!("{}=", SIGNATURE_VERSION);
    let provided = signature
        .strip_prefix(&expected_prefix)
        .and_then(|hex| hex_decode(hex).ok())
        .ok_or(SignatureError::Mismatch)?;

    let mac = base_mac(secret, timestamp, body).ok_or(SignatureError::Mismatch)?;
    // constant-time comparison
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Middleware for Slack-originated routes. A no-op when no signing secret is configured.
pub async fn require_slack_signature(
    AxumState(state): AxumState<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(secret) = state.config.slack.signing_secret.as_deref() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not read request body for {}: {}", parts.uri.path(), e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_slack_signature(secret, &parts.headers, &bytes, now) {
        warn!("Rejected request to {}: {}", parts.uri.path(), e);
        return e.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

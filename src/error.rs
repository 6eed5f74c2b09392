use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use tracing::debug;

/// Longest upstream body kept in an error
const MAX_BODY_LEN: usize = 200;

/// Which external platform an outbound call was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Slack,
    Jenkins,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Slack => write!(f, "slack"),
            Upstream::Jenkins => write!(f, "jenkins"),
        }
    }
}

/// Malformed or incomplete inbound request. Always answered with a 400.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientInputError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid form body: {0}")]
    InvalidForm(String),
}

impl IntoResponse for ClientInputError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Failure of an outbound call. Logged only; the inbound caller never sees it.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} unavailable: {source}")]
    Unavailable {
        service: Upstream,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} rejected request with status {status}: {body}")]
    Rejected {
        service: Upstream,
        status: u16,
        body: String,
    },

    #[error("slack method {method} returned error: {error}")]
    SlackApi { method: String, error: String },

    #[error("Job trigger failed with status {status}: {body}")]
    JobTriggerFailed { status: u16, body: String },
}

/// Startup configuration problems. Prevents the server from binding.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ConfigError>),
}

/// Rejected inbound request signature
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header: {0}")]
    MissingHeader(&'static str),

    #[error("Request timestamp is invalid or outside the allowed window")]
    StaleTimestamp,

    #[error("Signature mismatch")]
    Mismatch,
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Read an upstream response body. A failed read is logged and yields an empty body.
pub(crate) async fn read_body(service: Upstream, response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => text,
        Err(e) => {
            debug!("Could not read {} response body: {}", service, e);
            String::new()
        }
    }
}

pub(crate) fn truncate(body: &str) -> String {
    body.chars().take(MAX_BODY_LEN).collect()
}

/// Helper type for outbound results
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

//! HTTP clients for the assistant backend.
//!
//! This module provides:
//! - `AssistantClient` for the free-text chat endpoint
//! - `ActionClient` for the structured AI contact action endpoint
//! - `normalize_reply` and `error_from_response`, the single place where
//!   response bodies of either endpoint are probed

pub mod actions;
pub mod assistant;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config;

/// Reply fields probed in order; the first non-empty string wins.
pub const REPLY_FIELDS: &[&str] = &["response", "message", "text"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Rejected locally, no request was made.
    #[error("{0}")]
    Validation(String),
    /// No response was received.
    #[error("{0}")]
    Network(String),
    /// Non-2xx status without a usable message in the body.
    #[error("Server error: {status} {status_text}")]
    Server { status: u16, status_text: String },
    /// Non-2xx status whose body carried a message.
    #[error("{message}")]
    Application { message: String },
}

/// A response as received, before any interpretation of its body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared POST-JSON plumbing for both endpoints.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    client: Client,
    base_url: String,
}

impl Endpoint {
    pub(crate) fn new(base_url: &str, timeout_secs: u64) -> Self {
        let timeout = config::request_timeout(timeout_secs);
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    timeout_secs = timeout.as_secs(),
                    "HTTP client build failed, requests will not time out"
                );
                Client::new()
            }
        };
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base}/{route}`. An `Err` means no response arrived.
    pub(crate) async fn post(&self, route: &str, body: &Value) -> Result<RawResponse, reqwest::Error> {
        let url = format!("{}/{}", self.base_url, route);
        tracing::debug!(url = %url, "posting to assistant backend");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(url = %url, status = status.as_u16(), "assistant backend replied");
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

/// First non-empty string among [`REPLY_FIELDS`] of a JSON object.
pub fn probe_reply_field(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    REPLY_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

/// Turn a successful response body into display text.
///
/// A string body (JSON string literal or plain text) is used as is; an object
/// is probed for `response`, `message`, `text`; anything else is shown
/// pretty-printed. An empty body gives an empty reply.
pub fn normalize_reply(body: &str) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(text)) => text,
        Ok(value) => probe_reply_field(&value)
            .unwrap_or_else(|| serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string())),
        Err(_) => body.to_string(),
    }
}

/// Error for a non-2xx response: `error` then `message` from a JSON object,
/// then a non-empty text body, otherwise the bare status.
pub fn error_from_response(response: &RawResponse) -> RemoteError {
    let message = match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Object(object)) => ["error", "message"].iter().find_map(|field| {
            object
                .get(*field)
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string)
        }),
        Ok(Value::String(text)) => Some(text),
        Ok(_) => None,
        Err(_) => Some(response.body.trim().to_string()),
    };

    match message.filter(|text| !text.trim().is_empty()) {
        Some(message) => RemoteError::Application { message },
        None => RemoteError::Server {
            status: response.status,
            status_text: response.status_text.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            status_text: "Internal Server Error".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_endpoint_with_zero_timeout_still_builds() {
        let endpoint = Endpoint::new("http://localhost:3001/", 0);
        assert_eq!(endpoint.base_url(), "http://localhost:3001");
    }

    #[test]
    fn test_normalize_string_body() {
        assert_eq!(normalize_reply("\"OK\""), "OK");
        assert_eq!(normalize_reply("OK"), "OK");
    }

    #[test]
    fn test_normalize_probes_fields_in_order() {
        assert_eq!(normalize_reply(r#"{"message":"hi"}"#), "hi");
        assert_eq!(
            normalize_reply(r#"{"text":"third","message":"second","response":"first"}"#),
            "first"
        );
        // Empty strings are skipped
        assert_eq!(normalize_reply(r#"{"response":"","text":"fallback"}"#), "fallback");
    }

    #[test]
    fn test_normalize_falls_back_to_pretty_json() {
        assert_eq!(normalize_reply("{}"), "{}");
        assert_eq!(normalize_reply(r#"{"reply":1}"#), "{\n  \"reply\": 1\n}");
        assert_eq!(normalize_reply("[1,2]"), "[\n  1,\n  2\n]");
    }

    #[test]
    fn test_normalize_empty_body() {
        assert_eq!(normalize_reply(""), "");
        assert_eq!(normalize_reply("  \n"), "");
    }

    #[test]
    fn test_error_prefers_error_field() {
        let err = error_from_response(&failed(400, r#"{"error":"bad command","message":"ignored"}"#));
        assert_eq!(err, RemoteError::Application { message: "bad command".to_string() });

        let err = error_from_response(&failed(400, r#"{"message":"try again"}"#));
        assert_eq!(err.to_string(), "try again");
    }

    #[test]
    fn test_error_plain_text_body() {
        let err = error_from_response(&failed(502, "upstream down"));
        assert_eq!(err.to_string(), "upstream down");
    }

    #[test]
    fn test_error_without_body_uses_status() {
        let err = error_from_response(&failed(500, ""));
        assert_eq!(err.to_string(), "Server error: 500 Internal Server Error");

        let err = error_from_response(&failed(500, r#"{"detail":"x"}"#));
        assert!(matches!(err, RemoteError::Server { status: 500, .. }));
    }
}

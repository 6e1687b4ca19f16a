use serde_json::json;

use crate::config::AssistantConfig;

use super::{error_from_response, normalize_reply, Endpoint, RemoteError};

pub const EMPTY_MESSAGE: &str = "Please enter a message";
pub const NETWORK_ERROR: &str = "Network error: Unable to connect to the server";

/// Client for `POST {base}/chat`.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    endpoint: Endpoint,
}

impl AssistantClient {
    pub fn new(config: &AssistantConfig) -> Self {
        Self::with_base_url(&config.base_url, config.timeout_secs)
    }

    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, timeout_secs),
        }
    }

    /// Send `text` as typed and return the normalized reply.
    pub async fn send_message(&self, text: &str) -> Result<String, RemoteError> {
        if text.trim().is_empty() {
            return Err(RemoteError::Validation(EMPTY_MESSAGE.to_string()));
        }

        let response = self
            .endpoint
            .post("chat", &json!({ "message": text }))
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, base = %self.endpoint.base_url(), "chat request failed");
                RemoteError::Network(NETWORK_ERROR.to_string())
            })?;

        if !response.is_success() {
            let err = error_from_response(&response);
            tracing::warn!(status = response.status, error = %err, "chat endpoint returned an error");
            return Err(err);
        }

        Ok(normalize_reply(&response.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_message_is_rejected_without_request() {
        // Nothing listens on this port; a request would surface as Network.
        let client = AssistantClient::with_base_url("http://127.0.0.1:9", 1);
        let err = client.send_message("   ").await.unwrap_err();
        assert_eq!(err, RemoteError::Validation(EMPTY_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = AssistantClient::with_base_url("http://127.0.0.1:9", 1);
        let err = client.send_message("hello").await.unwrap_err();
        assert_eq!(err, RemoteError::Network(NETWORK_ERROR.to_string()));
    }
}

use serde_json::{json, Value};

use crate::config::AssistantConfig;

use super::{error_from_response, probe_reply_field, Endpoint};

pub const DEFAULT_KIND: &str = "contact_action";
pub const ERROR_KIND: &str = "contact_action_error";
pub const DEFAULT_MESSAGE: &str = "Action completed successfully";

/// Substrings that mark a message as a contact command.
pub const ACTION_KEYWORDS: &[&str] = &[
    "update",
    "change",
    "set",
    "modify",
    "edit",
    "delete",
    "remove",
    "add",
    "create",
    "new contact",
    "phone",
    "email",
    "address",
    "company",
    "name",
    "contact",
    "details",
    "information",
];

/// Case-insensitive keyword test used to route chat input.
pub fn is_action_command(text: &str) -> bool {
    let lower = text.to_lowercase();
    ACTION_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Outcome of a contact command. Errors are values here, never `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Completed {
        data: Value,
        message: String,
        kind: String,
    },
    Failed {
        error: String,
    },
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Completed { .. })
    }

    pub fn kind(&self) -> &str {
        match self {
            ActionResult::Completed { kind, .. } => kind,
            ActionResult::Failed { .. } => ERROR_KIND,
        }
    }

    /// Text shown to the user for either outcome.
    pub fn message(&self) -> &str {
        match self {
            ActionResult::Completed { message, .. } => message,
            ActionResult::Failed { error } => error,
        }
    }

    fn from_body(body: &str) -> Self {
        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
        };
        let message = probe_reply_field(&data).unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .unwrap_or(DEFAULT_KIND)
            .to_string();
        ActionResult::Completed { data, message, kind }
    }
}

/// Client for `POST {base}/ai-contact-action`.
#[derive(Debug, Clone)]
pub struct ActionClient {
    endpoint: Endpoint,
}

impl ActionClient {
    pub fn new(config: &AssistantConfig) -> Self {
        Self::with_base_url(&config.base_url, config.timeout_secs)
    }

    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, timeout_secs),
        }
    }

    pub async fn submit_command(&self, command: &str) -> ActionResult {
        let response = match self
            .endpoint
            .post("ai-contact-action", &json!({ "command": command }))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, base = %self.endpoint.base_url(), "contact action request failed");
                return ActionResult::Failed {
                    error: format!(
                        "Unable to connect to AI Contact Actions server. Please ensure the backend is running on {}",
                        self.endpoint.base_url()
                    ),
                };
            }
        };

        if !response.is_success() {
            let error = error_from_response(&response).to_string();
            tracing::warn!(status = response.status, error = %error, "contact action failed");
            return ActionResult::Failed { error };
        }

        ActionResult::from_body(&response.body)
    }
}

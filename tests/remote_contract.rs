//! Wire contracts of the assistant and contact action clients against a mock
//! backend: request bodies, reply normalization and error mapping.

use lodcrm::remote::actions::{ActionClient, ActionResult, DEFAULT_KIND, DEFAULT_MESSAGE, ERROR_KIND};
use lodcrm::remote::assistant::AssistantClient;
use lodcrm::remote::RemoteError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn assistant(server: &MockServer) -> AssistantClient {
    AssistantClient::with_base_url(&server.uri(), 5)
}

fn actions(server: &MockServer) -> ActionClient {
    ActionClient::with_base_url(&server.uri(), 5)
}

// ────────────────────────────────────────────────────────────────────────────
// Chat endpoint
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_posts_message_as_typed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"message": "  Who toured Oak Ave?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Tina"})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = assistant(&server).send_message("  Who toured Oak Ave?").await.unwrap();
    assert_eq!(reply, "Tina");
}

#[tokio::test]
async fn test_chat_string_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("OK")))
        .mount(&server)
        .await;

    assert_eq!(assistant(&server).send_message("ping").await.unwrap(), "OK");
}

#[tokio::test]
async fn test_chat_message_field_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "hi"})))
        .mount(&server)
        .await;

    assert_eq!(assistant(&server).send_message("hello").await.unwrap(), "hi");
}

#[tokio::test]
async fn test_chat_empty_object_reply_is_shown_serialized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    assert_eq!(assistant(&server).send_message("hello").await.unwrap(), "{}");
}

#[tokio::test]
async fn test_chat_error_body_becomes_application_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Model unavailable"})))
        .mount(&server)
        .await;

    let err = assistant(&server).send_message("hello").await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Application {
            message: "Model unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn test_chat_bare_status_becomes_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = assistant(&server).send_message("hello").await.unwrap_err();
    assert!(matches!(err, RemoteError::Server { status: 503, .. }));
    assert_eq!(err.to_string(), "Server error: 503 Service Unavailable");
}

#[tokio::test]
async fn test_blank_chat_message_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = assistant(&server).send_message("\n\t ").await.unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)));
}

// ────────────────────────────────────────────────────────────────────────────
// Contact action endpoint
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_action_posts_command() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai-contact-action"))
        .and(body_partial_json(json!({"command": "update Jane phone to 555"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Updated Jane",
            "type": "contact_update",
            "contactId": "c1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = actions(&server).submit_command("update Jane phone to 555").await;
    match result {
        ActionResult::Completed { data, message, kind } => {
            assert_eq!(message, "Updated Jane");
            assert_eq!(kind, "contact_update");
            assert_eq!(data["contactId"], json!("c1"));
        }
        ActionResult::Failed { error } => panic!("unexpected failure: {}", error),
    }
}

#[tokio::test]
async fn test_action_defaults_for_bare_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai-contact-action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = actions(&server).submit_command("add contact").await;
    assert!(result.is_success());
    assert_eq!(result.kind(), DEFAULT_KIND);
    assert_eq!(result.message(), DEFAULT_MESSAGE);
}

#[tokio::test]
async fn test_action_failure_is_a_value() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai-contact-action"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Contact not found"})))
        .mount(&server)
        .await;

    let result = actions(&server).submit_command("delete contact Bob").await;
    assert!(!result.is_success());
    assert_eq!(result.kind(), ERROR_KIND);
    assert_eq!(result.message(), "Contact not found");
}

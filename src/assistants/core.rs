use std::{collections::HashMap, time::Duration};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::errors::ChatError;

// The assistants API is versioned behind a beta marker header that must
// accompany every call alongside the bearer credential.
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VERSION: &str = "assistants=v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(from = "String")]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    /// Any role this client does not model. Never sent in requests.
    #[serde(rename = "unknown")]
    Unknown,
}

// Unrecognized roles must not fail a message decode
impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Unknown,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    Unknown,
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "incomplete" => RunStatus::Incomplete,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown,
        }
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }

    /// Whether the run has stopped processing. `RequiresAction` is not
    /// terminal: the service is waiting on tool output this client never
    /// provides, so it is left to time out at the poll boundary.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::Cancelled
                | RunStatus::Expired
                | RunStatus::Incomplete
        )
    }
}

/// A server-side conversation context. The id is opaque and never changes
/// once assigned.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Thread {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    // Dynamic map, passed through without interpretation
    #[serde(default)]
    pub tool_resources: Option<Value>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MessageText {
    pub value: String,
    // Annotation entries are service-defined objects; decoded verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Value>>,
}

// Observed responses encode `text` both as a bare string and as a
// {value, annotations} object. Try the structured form first, fall back
// to wrapping the bare string, otherwise leave the field absent.
fn text_string_or_object<'de, D>(deserializer: D) -> Result<Option<MessageText>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let text = match raw {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        Some(Value::String(value)) => Some(MessageText {
            value,
            annotations: None,
        }),
        _ => None,
    };
    Ok(text)
}

/// One unit of a message body, tagged by type. Only "text" parts carry a
/// payload this client reads.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ContentItem {
    pub r#type: String,
    #[serde(default, deserialize_with = "text_string_or_object")]
    pub text: Option<MessageText>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Tool {
    pub r#type: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Attachment {
    pub file_id: String,
    pub tool: Tool,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    #[serde(default)]
    pub assistant_id: Option<String>,
    pub thread_id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    pub role: Role,
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// One assistant-processing invocation bound to a thread.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Run {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub assistant_id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub model: Option<String>,
}

/// First page of a thread's messages. The pagination markers are decoded
/// but this client never walks past the first page.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MessageList {
    pub object: String,
    pub data: Vec<Message>,
    #[serde(default)]
    pub first_id: Option<String>,
    #[serde(default)]
    pub last_id: Option<String>,
    pub has_more: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Assistant {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// The error envelope the service wraps around every failure payload.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl From<ApiErrorBody> for ChatError {
    fn from(body: ApiErrorBody) -> Self {
        ChatError::Api {
            message: body.message,
            error_type: body.r#type,
            param: body.param,
            code: body.code,
        }
    }
}

fn request(method: reqwest::Method, url: String, api_key: &str) -> reqwest::RequestBuilder {
    reqwest::Client::new()
        .request(method, url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .header(BETA_HEADER, BETA_VERSION)
        .timeout(REQUEST_TIMEOUT)
}

/// Sends a request and decodes the body into the expected type. Failures
/// arrive as a well-formed error envelope, so that decode is attempted
/// first regardless of HTTP status; a body that matches neither shape
/// surfaces verbatim to aid diagnosis.
async fn perform_request<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ChatError> {
    let response = request.send().await?;
    let body = response.text().await?;

    if let Ok(envelope) = serde_json::from_str::<ErrorResponse>(&body) {
        tracing::error!(
            "API error ({}): {}",
            envelope.error.r#type,
            envelope.error.message
        );
        return Err(envelope.error.into());
    }

    serde_json::from_str::<T>(&body).map_err(|err| {
        tracing::error!("Failed to decode response: {}\nBody: {}", err, body);
        ChatError::Decode {
            reason: err.to_string(),
            body,
        }
    })
}

/// Creates a new conversation thread with an empty settings object.
pub async fn create_thread(api_hostname: &str, api_key: &str) -> Result<Thread, ChatError> {
    let url = format!("{}/v1/threads", api_hostname.trim_end_matches('/'));
    perform_request(request(reqwest::Method::POST, url, api_key).json(&json!({}))).await
}

/// Posts a single user-role message with one text content part.
pub async fn create_message(
    api_hostname: &str,
    api_key: &str,
    thread_id: &str,
    text: &str,
) -> Result<Message, ChatError> {
    let payload = json!({
        "role": "user",
        "content": [{"type": "text", "text": text}]
    });
    let url = format!(
        "{}/v1/threads/{}/messages",
        api_hostname.trim_end_matches('/'),
        thread_id
    );
    perform_request(request(reqwest::Method::POST, url, api_key).json(&payload)).await
}

/// Starts a non-streaming run of the given assistant against a thread.
pub async fn create_run(
    api_hostname: &str,
    api_key: &str,
    thread_id: &str,
    assistant_id: &str,
) -> Result<Run, ChatError> {
    let payload = json!({
        "assistant_id": assistant_id,
        "stream": false
    });
    let url = format!(
        "{}/v1/threads/{}/runs",
        api_hostname.trim_end_matches('/'),
        thread_id
    );
    perform_request(request(reqwest::Method::POST, url, api_key).json(&payload)).await
}

/// Fetches the current state of a run, used to poll it to completion.
pub async fn retrieve_run(
    api_hostname: &str,
    api_key: &str,
    thread_id: &str,
    run_id: &str,
) -> Result<Run, ChatError> {
    let url = format!(
        "{}/v1/threads/{}/runs/{}",
        api_hostname.trim_end_matches('/'),
        thread_id,
        run_id
    );
    perform_request(request(reqwest::Method::GET, url, api_key)).await
}

/// Fetches the first page of a thread's messages in ascending order.
pub async fn list_messages(
    api_hostname: &str,
    api_key: &str,
    thread_id: &str,
) -> Result<MessageList, ChatError> {
    let url = format!(
        "{}/v1/threads/{}/messages?order=asc",
        api_hostname.trim_end_matches('/'),
        thread_id
    );
    perform_request(request(reqwest::Method::GET, url, api_key)).await
}

/// Looks up the configured assistant, used to fail fast on a bad id.
pub async fn retrieve_assistant(
    api_hostname: &str,
    api_key: &str,
    assistant_id: &str,
) -> Result<Assistant, ChatError> {
    let url = format!(
        "{}/v1/assistants/{}",
        api_hostname.trim_end_matches('/'),
        assistant_id
    );
    perform_request(request(reqwest::Method::GET, url, api_key)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_deserialization() {
        let json = r#""user""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::User);

        let json = r#""assistant""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::Assistant);

        // Roles this client does not model must not fail the decode
        let json = r#""system""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::Unknown);
    }

    #[test]
    fn test_run_status_deserialization() {
        let json = r#""in_progress""#;
        assert_eq!(
            serde_json::from_str::<RunStatus>(json).unwrap(),
            RunStatus::InProgress
        );

        let json = r#""requires_action""#;
        assert_eq!(
            serde_json::from_str::<RunStatus>(json).unwrap(),
            RunStatus::RequiresAction
        );

        let json = r#""something_new""#;
        assert_eq!(
            serde_json::from_str::<RunStatus>(json).unwrap(),
            RunStatus::Unknown
        );
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Expired.is_terminal());
        assert!(RunStatus::Incomplete.is_terminal());

        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(!RunStatus::RequiresAction.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
        assert!(!RunStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_content_item_text_as_object() {
        let json = r#"{"type":"text","text":{"value":"Hello","annotations":[]}}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.text.unwrap().value, "Hello");
    }

    #[test]
    fn test_content_item_text_as_bare_string() {
        // Both encodings of the same text must yield the same value
        let json = r#"{"type":"text","text":"Hello"}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        let text = item.text.unwrap();
        assert_eq!(text.value, "Hello");
        assert!(text.annotations.is_none());
    }

    #[test]
    fn test_content_item_text_missing() {
        let json = r#"{"type":"image_file"}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert!(item.text.is_none());
    }

    #[test]
    fn test_content_item_text_unexpected_shape() {
        // Neither string nor object: the field is treated as absent, the
        // decode itself must not fail
        let json = r#"{"type":"text","text":42}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert!(item.text.is_none());

        // An object without a value field is also treated as absent
        let json = r#"{"type":"text","text":{"annotations":[]}}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert!(item.text.is_none());
    }

    #[test]
    fn test_content_item_annotations_pass_through() {
        let json = r#"{
            "type": "text",
            "text": {
                "value": "See the docs",
                "annotations": [{"type": "file_citation", "start_index": 0}]
            }
        }"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        let text = item.text.unwrap();
        assert_eq!(text.value, "See the docs");
        assert_eq!(text.annotations.unwrap().len(), 1);
    }

    #[test]
    fn test_message_list_deserialization() {
        let json = r#"{
            "object": "list",
            "data": [{
                "id": "msg_1",
                "object": "thread.message",
                "created_at": 1699000000,
                "thread_id": "t1",
                "role": "user",
                "content": [{"type": "text", "text": "hello"}]
            }],
            "first_id": "msg_1",
            "last_id": "msg_1",
            "has_more": false
        }"#;
        let list: MessageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].role, Role::User);
        assert_eq!(list.first_id.as_deref(), Some("msg_1"));
        assert!(!list.has_more);
    }

    #[test]
    fn test_error_envelope_deserialization() {
        let json = r#"{"error":{"message":"invalid_request","type":"invalid_request_error"}}"#;
        let envelope: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.message, "invalid_request");
        assert_eq!(envelope.error.r#type, "invalid_request_error");
        assert!(envelope.error.param.is_none());
        assert!(envelope.error.code.is_none());
    }

    #[tokio::test]
    async fn test_create_thread() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "thread_abc123",
            "object": "thread",
            "created_at": 1699000000,
            "metadata": {}
        }"#;

        let mock = server
            .mock("POST", "/v1/threads")
            .match_header("authorization", "Bearer test-key")
            .match_header("OpenAI-Beta", "assistants=v2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let thread = create_thread(&server.url(), "test-key").await.unwrap();

        mock.assert();
        assert_eq!(thread.id, "thread_abc123");
        assert_eq!(thread.object, "thread");
    }

    #[tokio::test]
    async fn test_create_message_posts_user_role() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "msg_1",
            "object": "thread.message",
            "created_at": 1699000000,
            "thread_id": "thread_abc123",
            "role": "user",
            "content": [{"type": "text", "text": {"value": "hello", "annotations": []}}]
        }"#;

        let mock = server
            .mock("POST", "/v1/threads/thread_abc123/messages")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "role": "user",
                "content": [{"type": "text", "text": "hello"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let message = create_message(&server.url(), "test-key", "thread_abc123", "hello")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.thread_id, "thread_abc123");
    }

    #[tokio::test]
    async fn test_create_run_is_non_streaming() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "run_1",
            "object": "thread.run",
            "created_at": 1699000000,
            "assistant_id": "asst_1",
            "thread_id": "thread_abc123",
            "status": "queued"
        }"#;

        let mock = server
            .mock("POST", "/v1/threads/thread_abc123/runs")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "assistant_id": "asst_1",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let run = create_run(&server.url(), "test-key", "thread_abc123", "asst_1")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_list_messages_first_page_ascending() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "object": "list",
            "data": [],
            "first_id": null,
            "last_id": null,
            "has_more": false
        }"#;

        let mock = server
            .mock("GET", "/v1/threads/thread_abc123/messages")
            .match_query(mockito::Matcher::UrlEncoded(
                "order".into(),
                "asc".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let list = list_messages(&server.url(), "test-key", "thread_abc123")
            .await
            .unwrap();

        mock.assert();
        assert!(list.data.is_empty());
    }

    #[tokio::test]
    async fn test_error_envelope_takes_priority_over_decode() {
        let mut server = mockito::Server::new_async().await;

        let response_body =
            r#"{"error":{"message":"invalid_request","type":"invalid_request_error"}}"#;

        let _mock = server
            .mock("POST", "/v1/threads")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let result = create_thread(&server.url(), "test-key").await;

        match result {
            Err(ChatError::Api {
                message,
                error_type,
                ..
            }) => {
                assert_eq!(message, "invalid_request");
                assert_eq!(error_type, "invalid_request_error");
            }
            other => panic!("Expected an API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces_body() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{"unexpected": true}"#;

        let _mock = server
            .mock("POST", "/v1/threads")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let result = create_thread(&server.url(), "test-key").await;

        match result {
            Err(ChatError::Decode { body, .. }) => {
                assert_eq!(body, response_body);
            }
            other => panic!("Expected a decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retrieve_assistant() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "asst_1",
            "object": "assistant",
            "created_at": 1699000000,
            "name": "Helper",
            "model": "gpt-4o",
            "tools": [{"type": "file_search"}]
        }"#;

        let mock = server
            .mock("GET", "/v1/assistants/asst_1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let assistant = retrieve_assistant(&server.url(), "test-key", "asst_1")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(assistant.name.as_deref(), Some("Helper"));
        assert_eq!(assistant.model, "gpt-4o");
    }
}

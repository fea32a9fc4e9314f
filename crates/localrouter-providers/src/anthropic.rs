//! The Anthropic Messages API provider.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use localrouter_config::StrategyCell;
use localrouter_core::{
    sse, ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, Choice, GatewayError,
    GatewayResult, Provider, Usage,
};
use parking_lot::RwLock;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Compile-time default model, used when neither the request nor the runtime
/// configuration names one, and as the 404 fallback target.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Claude rejects requests without max_tokens; inject this when the client
/// did not specify one.
const DEFAULT_MAX_TOKENS: u32 = 4096;

const API_VERSION: &str = "2023-06-01";

/// The Anthropic upstream.
pub struct AnthropicProvider {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
    default_model: RwLock<String>,
    strategy: StrategyCell,
}

impl AnthropicProvider {
    /// Create a provider instance. Empty `base_url` targets the Anthropic
    /// API; empty `default_model` falls back to [`DEFAULT_MODEL`].
    pub fn new(api_key: &str, base_url: &str, default_model: &str, strategy: StrategyCell) -> Self {
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };
        Self {
            api_key: SecretString::new(api_key.to_string()),
            base_url,
            client: reqwest::Client::new(),
            default_model: RwLock::new(default_model.to_string()),
            strategy,
        }
    }

    fn resolve_model(&self, requested: &str) -> String {
        if !requested.is_empty() {
            return requested.to_string();
        }
        let current = self.default_model.read();
        if !current.is_empty() {
            return current.clone();
        }
        DEFAULT_MODEL.to_string()
    }

    fn fallback_enabled(&self) -> bool {
        self.strategy.get().fallback_on_404_enabled()
    }

    async fn post_messages(&self, body: &AnthropicRequest) -> GatewayResult<reqwest::Response> {
        let url = format!("{}/messages", self.base_url);
        debug!(model = %body.model, stream = body.stream, "dispatching anthropic request");
        Ok(self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?)
    }

    async fn decode_success(&self, response: reqwest::Response) -> GatewayResult<ChatResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "anthropic request failed");
            return Err(GatewayError::upstream_status(
                "anthropic",
                status.as_u16(),
                body,
            ));
        }
        let native: AnthropicResponse = response.json().await?;
        Ok(to_chat_response(native))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat_completion(&self, req: ChatRequest) -> GatewayResult<ChatResponse> {
        let model = self.resolve_model(&req.model);
        let mut body = map_request(&model, &req, false);

        let response = self.post_messages(&body).await?;
        if response.status() == StatusCode::NOT_FOUND
            && body.model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                attempted_model = %body.model,
                fallback_model = DEFAULT_MODEL,
                "anthropic model not found, retrying with default"
            );
            body.model = DEFAULT_MODEL.to_string();
            let retry = self.post_messages(&body).await?;
            return self.decode_success(retry).await;
        }
        self.decode_success(response).await
    }

    async fn chat_completion_stream(
        &self,
        req: ChatRequest,
        tx: mpsc::Sender<ChatStreamChunk>,
    ) -> GatewayResult<()> {
        let model = self.resolve_model(&req.model);
        let mut body = map_request(&model, &req, true);

        let mut response = self.post_messages(&body).await?;
        if response.status() == StatusCode::NOT_FOUND
            && body.model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                attempted_model = %body.model,
                fallback_model = DEFAULT_MODEL,
                "anthropic model not found, retrying stream with default"
            );
            body.model = DEFAULT_MODEL.to_string();
            response = self.post_messages(&body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "anthropic streaming request failed");
            return Err(GatewayError::upstream_status(
                "anthropic",
                status.as_u16(),
                text,
            ));
        }

        let model = body.model;
        tokio::spawn(async move {
            forward_events(model, response, tx).await;
        });
        Ok(())
    }

    fn set_default_model(&self, model: &str) {
        *self.default_model.write() = model.to_string();
    }
}

/// Forward Anthropic stream events as content-delta chunks. Only
/// `content_block_delta` events carrying a `text_delta` reach the client;
/// message lifecycle events are dropped.
async fn forward_events(
    model: String,
    response: reqwest::Response,
    tx: mpsc::Sender<ChatStreamChunk>,
) {
    let mut events = std::pin::pin!(sse::data_events(response.bytes_stream()));
    while let Some(event) = events.next().await {
        let payload = match event {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "anthropic stream read failed");
                return;
            }
        };
        let event: AnthropicStreamEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to decode anthropic stream event");
                return;
            }
        };
        if event.kind != "content_block_delta" || event.delta.kind != "text_delta" {
            continue;
        }

        let chunk = ChatStreamChunk::content_delta(
            format!(
                "chatcmpl-claude-{}",
                Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ),
            model.clone(),
            event.delta.text,
        );
        if tx.send(chunk).await.is_err() {
            return;
        }
    }
}

// --- Anthropic wire structures ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    delta: AnthropicDelta,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicDelta {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Convert the gateway request into the Messages API shape.
///
/// The first message whose role is case-insensitively `system` is hoisted
/// into the top-level `system` field; remaining roles outside
/// `user`/`assistant` are coerced to `user`. Claude requires `max_tokens`, so
/// an unspecified value becomes [`DEFAULT_MAX_TOKENS`].
fn map_request(model: &str, req: &ChatRequest, stream: bool) -> AnthropicRequest {
    let mut system = None;
    let mut messages = Vec::with_capacity(req.messages.len());

    for message in &req.messages {
        if system.is_none() && message.role.eq_ignore_ascii_case("system") {
            system = Some(message.content.clone());
            continue;
        }
        let role = message.role.to_lowercase();
        let role = if role == "user" || role == "assistant" {
            role
        } else {
            "user".to_string()
        };
        messages.push(AnthropicMessage {
            role,
            content: message.content.clone(),
        });
    }

    AnthropicRequest {
        model: model.to_string(),
        messages,
        system,
        max_tokens: req.max_tokens.filter(|&m| m > 0).unwrap_or(DEFAULT_MAX_TOKENS),
        stream,
        temperature: req.temperature,
    }
}

/// Convert a Messages API response into the client-facing schema.
fn to_chat_response(native: AnthropicResponse) -> ChatResponse {
    let content = native
        .content
        .first()
        .map(|c| c.text.clone())
        .unwrap_or_default();

    ChatResponse {
        id: native.id,
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: native.model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: "stop".to_string(),
            extra: Default::default(),
        }],
        usage: Usage {
            prompt_tokens: native.usage.input_tokens,
            completion_tokens: native.usage.output_tokens,
            total_tokens: native.usage.input_tokens + native.usage.output_tokens,
            extra: Default::default(),
        },
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "claude-3-opus".to_string(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn first_system_message_is_hoisted() {
        let req = request(vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hello"),
        ]);
        let body = map_request("claude-3-opus", &req, false);
        assert_eq!(body.system.as_deref(), Some("be terse"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
    }

    #[test]
    fn system_hoist_is_case_insensitive() {
        let req = request(vec![
            ChatMessage::new("System", "be terse"),
            ChatMessage::user("hello"),
        ]);
        let body = map_request("m", &req, false);
        assert_eq!(body.system.as_deref(), Some("be terse"));
    }

    #[test]
    fn unknown_roles_are_coerced_to_user() {
        let req = request(vec![
            ChatMessage::new("function", "result"),
            ChatMessage::assistant("ok"),
            ChatMessage::new("tool", "output"),
        ]);
        let body = map_request("m", &req, false);
        let roles: Vec<_> = body.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[test]
    fn second_system_message_is_not_hoisted() {
        let req = request(vec![
            ChatMessage::system("first"),
            ChatMessage::system("second"),
            ChatMessage::user("hello"),
        ]);
        let body = map_request("m", &req, false);
        assert_eq!(body.system.as_deref(), Some("first"));
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.messages[0].content, "second");
    }

    #[test]
    fn max_tokens_injected_only_when_unspecified() {
        let mut req = request(vec![ChatMessage::user("hi")]);
        let body = map_request("m", &req, false);
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);

        req.max_tokens = Some(0);
        let body = map_request("m", &req, false);
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);

        req.max_tokens = Some(128);
        let body = map_request("m", &req, false);
        assert_eq!(body.max_tokens, 128);
    }

    #[test]
    fn temperature_passes_through_when_set() {
        let mut req = request(vec![ChatMessage::user("hi")]);
        req.temperature = Some(0.3);
        let body = map_request("m", &req, true);
        assert_eq!(body.temperature, Some(0.3));
        assert!(body.stream);

        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["temperature"], 0.3);
    }

    #[test]
    fn response_maps_content_and_usage() {
        let native: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "model": "claude-3-5-haiku-20241022",
                "content": [{"type": "text", "text": "hello there"}],
                "usage": {"input_tokens": 10, "output_tokens": 4}
            }"#,
        )
        .unwrap();
        let resp = to_chat_response(native);
        assert_eq!(resp.id, "msg_01");
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.choices[0].message.role, "assistant");
        assert_eq!(resp.choices[0].message.content, "hello there");
        assert_eq!(resp.usage.total_tokens, 14);
    }

    #[test]
    fn stream_event_decoding() {
        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "content_block_delta");
        assert_eq!(event.delta.kind, "text_delta");
        assert_eq!(event.delta.text, "hi");

        let other: AnthropicStreamEvent =
            serde_json::from_str(r#"{"type":"message_start"}"#).unwrap();
        assert_eq!(other.kind, "message_start");
        assert_eq!(other.delta.kind, "");
    }
}

//! Client-facing request types.
//!
//! The gateway speaks the OpenAI Chat Completions schema to its clients and
//! passes uninterpreted fields through to OpenAI-compatible upstreams via the
//! flattened `extra` maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message of a chat conversation.
///
/// `role` is an open set (`system`, `user`, `assistant`, `function`, ...), so
/// it is kept as a plain string rather than an enum; providers that only
/// understand a subset coerce unknown roles themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author.
    pub role: String,
    /// Text content of the message.
    pub content: String,
    /// Uninterpreted passthrough fields (`name`, `tool_calls`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Create a message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Create a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an `assistant` message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// An OpenAI-shaped chat completion request.
///
/// Immutable after decode except for `model`, which the router overwrites with
/// its resolved target before dispatch, and `stream`, which providers pin to
/// match the invoked mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Requested model; empty means "use the provider default".
    #[serde(default)]
    pub model: String,
    /// Conversation messages, oldest first. Must be non-empty.
    pub messages: Vec<ChatMessage>,
    /// Whether the client wants an SSE stream.
    #[serde(default)]
    pub stream: bool,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Uninterpreted passthrough fields (`top_p`, `stop`, `n`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    /// Content of the last message, if any.
    pub fn last_content(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

//! Client-facing streaming chunk types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One SSE chunk of a streamed chat completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    /// Completion identifier.
    #[serde(default)]
    pub id: String,
    /// Object type, `chat.completion.chunk`.
    #[serde(default)]
    pub object: String,
    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,
    /// Model producing the stream.
    #[serde(default)]
    pub model: String,
    /// Incremental choices.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Uninterpreted passthrough fields (`usage`, `system_fingerprint`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatStreamChunk {
    /// A chunk carrying a single content delta, as emitted when translating
    /// vendor-native stream events into the client schema.
    pub fn content_delta(id: impl Into<String>, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created: unix_now(),
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(text.into()),
                    extra: Map::new(),
                },
                finish_reason: None,
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }

    /// Content of the first choice's delta, empty when absent.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or("")
    }
}

/// One incremental choice within a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,
    /// The delta payload.
    pub delta: ChunkDelta,
    /// Why generation stopped; `null` until the final chunk.
    pub finish_reason: Option<String>,
    /// Uninterpreted passthrough fields (`logprobs`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present only in the first chunk of a stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Uninterpreted passthrough fields (`tool_calls`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Current Unix timestamp in seconds.
fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

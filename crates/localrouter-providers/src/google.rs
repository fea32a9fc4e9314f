//! The Google Gemini REST API provider.
//!
//! Gemini authenticates with an API key in the URL query string, so every
//! error string derived from a URL or a response body is passed through
//! [`GoogleProvider::redact`] before it can reach a log line or a caller.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use localrouter_config::StrategyCell;
use localrouter_core::{
    sse, ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, Choice, GatewayError,
    GatewayResult, Provider,
};
use parking_lot::RwLock;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Compile-time default model, used when neither the request nor the runtime
/// configuration names one, and as the 404 fallback target.
pub const DEFAULT_MODEL: &str = "gemini-3.0-flash-preview";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

/// The Google Gemini upstream.
pub struct GoogleProvider {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
    default_model: RwLock<String>,
    strategy: StrategyCell,
}

impl GoogleProvider {
    /// Create a provider instance. Empty `base_url` targets the Gemini API;
    /// empty `default_model` falls back to [`DEFAULT_MODEL`].
    pub fn new(api_key: &str, base_url: &str, default_model: &str, strategy: StrategyCell) -> Self {
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
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

    /// Replace every occurrence of the API key with `***`.
    fn redact(&self, text: &str) -> String {
        let key = self.api_key.expose_secret();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key.as_str(), "***")
    }

    fn endpoint_url(&self, model: &str, streaming: bool) -> String {
        if streaming {
            format!(
                "{}{}:streamGenerateContent?alt=sse&key={}",
                self.base_url,
                model,
                self.api_key.expose_secret()
            )
        } else {
            format!(
                "{}{}:generateContent?key={}",
                self.base_url,
                model,
                self.api_key.expose_secret()
            )
        }
    }

    async fn post_generate(
        &self,
        model: &str,
        streaming: bool,
        body: &GeminiRequest,
    ) -> GatewayResult<reqwest::Response> {
        let url = self.endpoint_url(model, streaming);
        debug!(model = %model, streaming, "dispatching gemini request");
        self.client.post(&url).json(body).send().await.map_err(|e| {
            let message = self.redact(&e.to_string());
            error!(model = %model, error = %message, "gemini request failed");
            GatewayError::upstream("google", message)
        })
    }

    /// Read a non-success response body into a redacted status error.
    async fn status_error(&self, response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = self.redact(&body);
        error!(status = status.as_u16(), error = %message, "gemini request failed with status");
        GatewayError::upstream_status("google", status.as_u16(), message)
    }

    async fn decode_success(
        &self,
        model: &str,
        response: reqwest::Response,
    ) -> GatewayResult<ChatResponse> {
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        let native: GeminiResponse = response.json().await?;
        Ok(to_chat_response(model, native))
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn chat_completion(&self, req: ChatRequest) -> GatewayResult<ChatResponse> {
        let mut model = self.resolve_model(&req.model);
        let body = map_request(&req);

        let response = self.post_generate(&model, false, &body).await?;
        if response.status() == StatusCode::NOT_FOUND
            && model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                attempted_model = %model,
                fallback_model = DEFAULT_MODEL,
                "gemini model not found, retrying with default"
            );
            model = DEFAULT_MODEL.to_string();
            let retry = self.post_generate(&model, false, &body).await?;
            return self.decode_success(&model, retry).await;
        }
        self.decode_success(&model, response).await
    }

    async fn chat_completion_stream(
        &self,
        req: ChatRequest,
        tx: mpsc::Sender<ChatStreamChunk>,
    ) -> GatewayResult<()> {
        let mut model = self.resolve_model(&req.model);
        let body = map_request(&req);

        let mut response = self.post_generate(&model, true, &body).await?;
        if response.status() == StatusCode::NOT_FOUND
            && model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                attempted_model = %model,
                fallback_model = DEFAULT_MODEL,
                "gemini model not found, retrying stream with default"
            );
            model = DEFAULT_MODEL.to_string();
            response = self.post_generate(&model, true, &body).await?;
        }

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        tokio::spawn(async move {
            forward_candidates(model, response, tx).await;
        });
        Ok(())
    }

    fn set_default_model(&self, model: &str) {
        *self.default_model.write() = model.to_string();
    }
}

/// Forward Gemini SSE payloads as content-delta chunks until the stream ends
/// or the receiver goes away. Undecodable payloads are skipped, matching the
/// tolerant Gemini stream format.
async fn forward_candidates(
    model: String,
    response: reqwest::Response,
    tx: mpsc::Sender<ChatStreamChunk>,
) {
    let mut events = std::pin::pin!(sse::data_events(response.bytes_stream()));
    while let Some(event) = events.next().await {
        let payload = match event {
            Ok(payload) => payload,
            Err(e) => {
                // The key only rides in the URL; stream read errors are safe to log.
                error!(error = %e, "gemini stream read failed");
                return;
            }
        };
        let Ok(native) = serde_json::from_str::<GeminiResponse>(&payload) else {
            continue;
        };
        let Some(text) = first_candidate_text(&native) else {
            continue;
        };

        let chunk = ChatStreamChunk::content_delta(
            format!(
                "chatcmpl-gemini-{}",
                Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ),
            model.clone(),
            text,
        );
        if tx.send(chunk).await.is_err() {
            return;
        }
    }
}

// --- Gemini wire structures ---

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiCandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

/// Convert the gateway request into Gemini `contents`. Gemini only knows the
/// `user` and `model` roles: `assistant` maps to `model`, everything else
/// (including `system`) maps to `user`.
fn map_request(req: &ChatRequest) -> GeminiRequest {
    let contents = req
        .messages
        .iter()
        .map(|message| {
            let role = if message.role.eq_ignore_ascii_case("assistant") {
                "model"
            } else {
                "user"
            };
            GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            }
        })
        .collect();
    GeminiRequest { contents }
}

fn first_candidate_text(native: &GeminiResponse) -> Option<String> {
    native
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.clone())
}

/// Convert a Gemini response into the client-facing schema.
fn to_chat_response(model: &str, native: GeminiResponse) -> ChatResponse {
    let content = first_candidate_text(&native).unwrap_or_default();
    ChatResponse {
        id: format!(
            "chatcmpl-gemini-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: "stop".to_string(),
            extra: Default::default(),
        }],
        usage: Default::default(),
        extra: Default::default(),
    }
}

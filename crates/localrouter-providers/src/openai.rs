//! The generic OpenAI-compatible provider.
//!
//! Serves every upstream that speaks the OpenAI Chat Completions API: OpenAI
//! itself, DeepSeek, and local vLLM servers. The client body passes through
//! unchanged apart from model resolution and the stream flag; stream chunks
//! pass through as-is.

use async_trait::async_trait;
use futures::StreamExt;
use localrouter_config::StrategyCell;
use localrouter_core::{
    sse, ChatRequest, ChatResponse, ChatStreamChunk, GatewayError, GatewayResult, Provider,
};
use parking_lot::RwLock;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Compile-time default model, used when neither the request nor the runtime
/// configuration names one, and as the 404 fallback target.
pub const DEFAULT_MODEL: &str = "gpt-5";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible upstream.
pub struct OpenAiProvider {
    name: String,
    api_key: Option<SecretString>,
    base_url: String,
    client: reqwest::Client,
    default_model: RwLock<String>,
    strategy: StrategyCell,
}

impl OpenAiProvider {
    /// Create a provider instance.
    ///
    /// `name` is the registration name (`openai`, `deepseek`, `local_vllm`,
    /// ...). An empty `api_key` sends no Authorization header; an empty
    /// `base_url` targets the OpenAI API; an empty `default_model` falls back
    /// to [`DEFAULT_MODEL`] at request time.
    pub fn new(
        name: impl Into<String>,
        api_key: &str,
        base_url: &str,
        default_model: &str,
        strategy: StrategyCell,
    ) -> Self {
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };
        let api_key = if api_key.is_empty() {
            None
        } else {
            Some(SecretString::new(api_key.to_string()))
        };
        Self {
            name: name.into(),
            api_key,
            base_url,
            client: reqwest::Client::new(),
            default_model: RwLock::new(default_model.to_string()),
            strategy,
        }
    }

    /// The requested model, the runtime default, or the compile-time default,
    /// in that order.
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

    /// Whether the active remote strategy allows 404 model fallback.
    fn fallback_enabled(&self) -> bool {
        self.strategy.get().fallback_on_404_enabled()
    }

    async fn post_chat(&self, req: &ChatRequest) -> GatewayResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        debug!(provider = %self.name, model = %req.model, stream = req.stream, "dispatching chat completion");
        Ok(builder.send().await?)
    }

    async fn decode_success(&self, response: reqwest::Response) -> GatewayResult<ChatResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = %self.name, status = status.as_u16(), "chat completion failed");
            return Err(GatewayError::upstream_status(
                &self.name,
                status.as_u16(),
                body,
            ));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(&self, mut req: ChatRequest) -> GatewayResult<ChatResponse> {
        req.stream = false;
        req.model = self.resolve_model(&req.model);

        let response = self.post_chat(&req).await?;
        if response.status() == StatusCode::NOT_FOUND
            && req.model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                provider = %self.name,
                attempted_model = %req.model,
                fallback_model = DEFAULT_MODEL,
                "model not found, retrying with default"
            );
            req.model = DEFAULT_MODEL.to_string();
            let retry = self.post_chat(&req).await?;
            return self.decode_success(retry).await;
        }
        self.decode_success(response).await
    }

    async fn chat_completion_stream(
        &self,
        mut req: ChatRequest,
        tx: mpsc::Sender<ChatStreamChunk>,
    ) -> GatewayResult<()> {
        req.stream = true;
        req.model = self.resolve_model(&req.model);

        let mut response = self.post_chat(&req).await?;
        if response.status() == StatusCode::NOT_FOUND
            && req.model != DEFAULT_MODEL
            && self.fallback_enabled()
        {
            warn!(
                provider = %self.name,
                attempted_model = %req.model,
                fallback_model = DEFAULT_MODEL,
                "model not found, retrying stream with default"
            );
            req.model = DEFAULT_MODEL.to_string();
            response = self.post_chat(&req).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = %self.name, status = status.as_u16(), "streaming chat completion failed");
            return Err(GatewayError::upstream_status(
                &self.name,
                status.as_u16(),
                body,
            ));
        }

        let provider = self.name.clone();
        tokio::spawn(async move {
            forward_chunks(provider, response, tx).await;
        });
        Ok(())
    }

    fn set_default_model(&self, model: &str) {
        *self.default_model.write() = model.to_string();
    }
}

/// Forward upstream SSE chunks into the gateway channel until the stream
/// ends, an error occurs, or the receiver goes away. Owning `tx` here closes
/// the channel exactly once on every exit path.
async fn forward_chunks(
    provider: String,
    response: reqwest::Response,
    tx: mpsc::Sender<ChatStreamChunk>,
) {
    let mut events = std::pin::pin!(sse::data_events(response.bytes_stream()));
    while let Some(event) = events.next().await {
        let payload = match event {
            Ok(payload) => payload,
            Err(e) => {
                error!(provider = %provider, error = %e, "stream read failed");
                return;
            }
        };
        let chunk: ChatStreamChunk = match serde_json::from_str(&payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(provider = %provider, error = %e, "failed to decode stream chunk");
                return;
            }
        };
        if tx.send(chunk).await.is_err() {
            // Receiver dropped: the client disconnected.
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn provider_with_default(default_model: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "openai",
            "sk-test",
            "http://127.0.0.1:9",
            default_model,
            StrategyCell::new(),
        )
    }

    #[test]
    fn resolve_model_prefers_request_model() {
        let provider = provider_with_default("runtime-default");
        assert_eq!(provider.resolve_model("explicit"), "explicit");
    }

    #[test]
    fn resolve_model_falls_back_to_runtime_then_const() {
        let provider = provider_with_default("runtime-default");
        assert_eq!(provider.resolve_model(""), "runtime-default");

        let provider = provider_with_default("");
        assert_eq!(provider.resolve_model(""), DEFAULT_MODEL);
    }

    #[test]
    fn set_default_model_takes_effect() {
        let provider = provider_with_default("");
        provider.set_default_model("qwen3-14b-awq");
        assert_eq!(provider.resolve_model(""), "qwen3-14b-awq");
    }

    #[test]
    fn base_url_defaults_and_trims() {
        let provider = OpenAiProvider::new("openai", "", "", "", StrategyCell::new());
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);

        let provider =
            OpenAiProvider::new("local_vllm", "", "http://10.0.0.2:8000/v1/", "", StrategyCell::new());
        assert_eq!(provider.base_url, "http://10.0.0.2:8000/v1");
    }

    #[test]
    fn fallback_gate_follows_strategy_cell() {
        let cell = StrategyCell::new();
        let provider = OpenAiProvider::new("openai", "", "", "", cell.clone());
        // No strategy fetched yet: fallback defaults to enabled.
        assert!(provider.fallback_enabled());

        cell.publish(localrouter_config::RemoteStrategy {
            strategy: "remote".to_string(),
            fallback_on_404: Some(false),
            ..Default::default()
        });
        assert!(!provider.fallback_enabled());
    }

    #[test]
    fn default_model_has_no_torn_reads_under_concurrency() {
        let provider = Arc::new(provider_with_default(""));
        let models: Vec<String> = (0..4).map(|i| format!("model-{i}")).collect();

        let mut handles = Vec::new();
        for writer in 0..100 {
            let provider = Arc::clone(&provider);
            let model = models[writer % models.len()].clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    provider.set_default_model(&model);
                }
            }));
        }
        for _ in 0..100 {
            let provider = Arc::clone(&provider);
            let models = models.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let seen = provider.resolve_model("");
                    assert!(
                        seen == DEFAULT_MODEL || models.contains(&seen),
                        "torn read: {seen:?}"
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

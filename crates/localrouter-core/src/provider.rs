//! The upstream provider abstraction.

use crate::error::GatewayResult;
use crate::request::ChatRequest;
use crate::response::ChatResponse;
use crate::streaming::ChatStreamChunk;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Providers registered for routing, keyed by configuration name
/// (`openai`, `google`, `local_vllm`, ...).
pub type ProviderMap = HashMap<String, Arc<dyn Provider>>;

/// A vendor-specific upstream client that translates between the gateway's
/// OpenAI-shaped wire schema and the vendor-native API.
impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's registration name.
    fn name(&self) -> &str;

    /// Perform a synchronous chat completion.
    ///
    /// An empty `req.model` resolves to the provider's runtime default, then
    /// its compile-time default. A 404 from the upstream is retried exactly
    /// once with the compile-time default model when the active strategy
    /// allows it.
    async fn chat_completion(&self, req: ChatRequest) -> GatewayResult<ChatResponse>;

    /// Perform a streaming chat completion.
    ///
    /// On success a background task owns `tx` and sends translated chunks in
    /// upstream order; the channel closes exactly once, when the upstream
    /// stream ends or the receiver goes away. An `Err` return means the
    /// stream never started and nothing was sent.
    async fn chat_completion_stream(
        &self,
        req: ChatRequest,
        tx: mpsc::Sender<ChatStreamChunk>,
    ) -> GatewayResult<()>;

    /// Replace the provider's runtime default model.
    ///
    /// Called by the remote strategy store when the polled document carries a
    /// per-provider model override. The default implementation ignores the
    /// update for providers without a runtime default.
    fn set_default_model(&self, _model: &str) {}
}

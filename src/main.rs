//! # localrouter
//!
//! An edge LLM gateway exposing one OpenAI-compatible Chat Completions
//! endpoint over heterogeneous upstreams (OpenAI-compatible, Anthropic,
//! Google Gemini, local vLLM). A remotely polled strategy document chooses
//! the active transport tier and per-provider default models; optional
//! generative routing scores each request with small local evaluators and
//! maps the intent vector to a provider.
//!
//! ```bash
//! # Config is read from $LOCALROUTER_CONFIG_PATH or the user config dir;
//! # a missing file is replaced with a template to fill in.
//! localrouter
//! ```

use localrouter_config::{Config, RemoteStrategyStore, StrategyCell};
use localrouter_core::{GatewayResult, Provider, ProviderMap};
use localrouter_providers::{AnthropicProvider, GoogleProvider, OpenAiProvider};
use localrouter_routing::RoutingEngine;
use localrouter_server::{serve, AppState};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Provider names served by the generic OpenAI-compatible adapter.
const OPENAI_COMPATIBLE_PROVIDERS: [&str; 3] = ["openai", "deepseek", "local_vllm"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting localrouter");

    if let Err(e) = run().await {
        error!(error = %e, "gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> GatewayResult<()> {
    let config = localrouter_config::local::load()?;

    let strategy = StrategyCell::new();
    let providers = build_providers(&config, &strategy);
    if providers.is_empty() {
        warn!("no providers configured; every request will fail routing");
    }
    info!(providers = providers.len(), "provider map initialized");

    let engine = Arc::new(RoutingEngine::new(providers.clone(), &config));

    let store = Arc::new(RemoteStrategyStore::new(
        config.remote_strategy.url.clone(),
        config.remote_strategy.poll_interval,
        strategy.clone(),
        providers,
    )?);
    let poller = store.start().await;

    let result = serve(
        &config.server.host,
        config.server.port,
        AppState::new(engine, strategy),
    )
    .await;

    poller.abort();
    result
}

/// Construct the provider map from configuration. Sections that are absent
/// simply leave their provider unregistered.
fn build_providers(config: &Config, strategy: &StrategyCell) -> ProviderMap {
    let mut providers = ProviderMap::new();

    for name in OPENAI_COMPATIBLE_PROVIDERS {
        if let Some(cfg) = config.providers.get(name) {
            providers.insert(
                name.to_string(),
                Arc::new(OpenAiProvider::new(
                    name,
                    &cfg.api_key,
                    &cfg.base_url,
                    &cfg.default_model,
                    strategy.clone(),
                )) as Arc<dyn Provider>,
            );
        }
    }

    if let Some(cfg) = config.providers.get("anthropic") {
        providers.insert(
            "anthropic".to_string(),
            Arc::new(AnthropicProvider::new(
                &cfg.api_key,
                &cfg.base_url,
                &cfg.default_model,
                strategy.clone(),
            )),
        );
    }

    if let Some(cfg) = config.providers.get("google") {
        providers.insert(
            "google".to_string(),
            Arc::new(GoogleProvider::new(
                &cfg.api_key,
                &cfg.base_url,
                &cfg.default_model,
                strategy.clone(),
            )),
        );
    }

    providers
}

//! The polled remote routing strategy.
//!
//! A single background task fetches the strategy JSON on an interval and
//! publishes each successful decode atomically into a [`StrategyCell`]. The
//! request path reads the cell lock-free; a fetch failure leaves the previous
//! snapshot in place.

use arc_swap::ArcSwap;
use localrouter_core::{GatewayError, Provider};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Client timeout for a single strategy fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval used when the configured interval is zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// The document served by the remote strategy origin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteStrategy {
    /// Active transport tier: `local` or `remote`. Empty until the first
    /// successful fetch.
    #[serde(default)]
    pub strategy: String,
    /// Model for the local tier.
    #[serde(default)]
    pub local_model: String,
    /// Provider for the remote tier; empty defaults to `google`.
    #[serde(default)]
    pub remote_provider: String,
    /// Model for the remote tier.
    #[serde(default)]
    pub remote_model: String,
    /// Per-provider default model overrides; empty values are ignored.
    #[serde(default)]
    pub provider_models: HashMap<String, String>,
    /// Whether providers may retry a 404 with their compile-time default
    /// model. Absent means enabled.
    #[serde(default)]
    pub fallback_on_404: Option<bool>,
    /// Opaque timestamp set by the origin.
    #[serde(default)]
    pub updated_at: String,
}

impl RemoteStrategy {
    /// Whether 404 model fallback is enabled. Absence of the field means
    /// enabled, the safe default.
    pub fn fallback_on_404_enabled(&self) -> bool {
        self.fallback_on_404.unwrap_or(true)
    }
}

/// The single atomically-replaceable slot holding the latest strategy.
///
/// Cloning the cell clones the handle; all clones observe the same slot.
/// Reads never block and never observe a partially-updated strategy.
#[derive(Clone)]
pub struct StrategyCell {
    inner: Arc<ArcSwap<RemoteStrategy>>,
}

impl StrategyCell {
    /// Create a cell seeded with the empty zero-valued strategy.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(RemoteStrategy::default())),
        }
    }

    /// The latest published strategy. Before the first successful fetch this
    /// is the empty strategy, never an absent value.
    pub fn get(&self) -> Arc<RemoteStrategy> {
        self.inner.load_full()
    }

    /// Atomically replace the published strategy.
    pub fn publish(&self, strategy: RemoteStrategy) {
        self.inner.store(Arc::new(strategy));
    }
}

impl Default for StrategyCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the strategy origin and keeps the [`StrategyCell`] fresh.
pub struct RemoteStrategyStore {
    url: String,
    interval: Duration,
    client: reqwest::Client,
    cell: StrategyCell,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl RemoteStrategyStore {
    /// Create a store publishing into `cell` and pushing model overrides to
    /// `providers`.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        cell: StrategyCell,
        providers: HashMap<String, Arc<dyn Provider>>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| {
                GatewayError::configuration(format!("failed to build strategy client: {e}"))
            })?;
        let interval = if interval.is_zero() {
            MIN_POLL_INTERVAL
        } else {
            interval
        };
        Ok(Self {
            url: url.into(),
            interval,
            client,
            cell,
            providers,
        })
    }

    /// Fetch once immediately (errors logged, not fatal), then poll on the
    /// configured interval from a background task. The returned handle can be
    /// aborted at shutdown.
    pub async fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        if let Err(e) = self.fetch().await {
            warn!(error = %e, "initial strategy fetch failed");
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately; the initial fetch above
            // already covered it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.fetch().await {
                    warn!(error = %e, "strategy fetch failed");
                }
            }
        })
    }

    /// Fetch, decode, publish, and apply provider model overrides once.
    ///
    /// # Errors
    /// Returns an error on an empty URL, a non-200 response, or a decode
    /// failure; in all cases the cell is left unchanged.
    pub async fn fetch(&self) -> Result<(), GatewayError> {
        if self.url.is_empty() {
            return Err(GatewayError::configuration("remote strategy URL is empty"));
        }

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GatewayError::upstream_status(
                "strategy-origin",
                status.as_u16(),
                "unexpected status",
            ));
        }

        let strategy: RemoteStrategy = response.json().await?;
        info!(
            strategy = %strategy.strategy,
            local_model = %strategy.local_model,
            remote_provider = %strategy.remote_provider,
            remote_model = %strategy.remote_model,
            provider_models = strategy.provider_models.len(),
            "remote strategy updated"
        );

        let models = strategy.provider_models.clone();
        self.cell.publish(strategy);
        self.apply_provider_models(&models);
        Ok(())
    }

    /// Push non-empty model overrides to registered providers. Empty values
    /// are skipped so a provider keeps its current default.
    fn apply_provider_models(&self, models: &HashMap<String, String>) {
        for (name, model) in models {
            if model.is_empty() {
                continue;
            }
            if let Some(provider) = self.providers.get(name) {
                provider.set_default_model(model);
                info!(provider = %name, model = %model, "provider default model updated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_enabled_when_absent() {
        let strategy = RemoteStrategy::default();
        assert!(strategy.fallback_on_404_enabled());
    }

    #[test]
    fn fallback_follows_explicit_flag() {
        let enabled: RemoteStrategy =
            serde_json::from_str(r#"{"strategy":"remote","fallback_on_404":true}"#).unwrap();
        assert!(enabled.fallback_on_404_enabled());

        let disabled: RemoteStrategy =
            serde_json::from_str(r#"{"strategy":"remote","fallback_on_404":false}"#).unwrap();
        assert!(!disabled.fallback_on_404_enabled());
    }

    #[test]
    fn cell_starts_with_empty_strategy() {
        let cell = StrategyCell::new();
        let strategy = cell.get();
        assert_eq!(strategy.strategy, "");
        assert!(strategy.provider_models.is_empty());
        assert!(strategy.fallback_on_404_enabled());
    }

    #[test]
    fn publish_replaces_snapshot_atomically() {
        let cell = StrategyCell::new();
        let before = cell.get();

        cell.publish(RemoteStrategy {
            strategy: "remote".to_string(),
            remote_provider: "openai".to_string(),
            remote_model: "gpt-4".to_string(),
            ..Default::default()
        });

        // The old snapshot is unaffected; new reads see the replacement.
        assert_eq!(before.strategy, "");
        let after = cell.get();
        assert_eq!(after.strategy, "remote");
        assert_eq!(after.remote_model, "gpt-4");
    }

    #[test]
    fn decodes_full_strategy_document() {
        let raw = r#"{
            "strategy": "remote",
            "local_model": "qwen3-14b-awq",
            "remote_provider": "google",
            "remote_model": "gemini-3.0-flash-preview",
            "provider_models": {
                "openai": "gpt-5",
                "anthropic": "claude-3-5-haiku-20241022",
                "google": "gemini-3.0-flash-preview",
                "local_vllm": "qwen3-14b-awq"
            },
            "fallback_on_404": true,
            "updated_at": "2026-03-01 00:00:00"
        }"#;
        let strategy: RemoteStrategy = serde_json::from_str(raw).unwrap();
        assert_eq!(strategy.strategy, "remote");
        assert_eq!(strategy.provider_models["local_vllm"], "qwen3-14b-awq");
        assert_eq!(strategy.updated_at, "2026-03-01 00:00:00");
    }
}

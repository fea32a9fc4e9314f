//! Local YAML configuration.
//!
//! The file lives at `$LOCALROUTER_CONFIG_PATH` when set, otherwise under the
//! user's config directory. A missing file is replaced with a commented
//! template and reported as an error so the operator fills in credentials
//! before the gateway serves traffic.

use localrouter_core::GatewayError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "LOCALROUTER_CONFIG_PATH";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote strategy origin and routing expression.
    #[serde(default)]
    pub remote_strategy: RemoteStrategyConfig,
    /// Upstream providers keyed by registration name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Optional generative (intent-vector) routing tier.
    #[serde(default)]
    pub generative_routing: Option<GenerativeRoutingConfig>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Remote strategy origin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStrategyConfig {
    /// URL serving the strategy JSON document.
    #[serde(default)]
    pub url: String,
    /// Poll interval, e.g. `60s`.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Optional global routing expression evaluated before the direct tier.
    /// Must return a provider name as a string to take effect.
    #[serde(default)]
    pub expression: String,
    /// Providers tried, in order, when no strategy has been fetched yet.
    #[serde(default)]
    pub default_providers: Vec<String>,
}

impl Default for RemoteStrategyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            poll_interval: default_poll_interval(),
            expression: String::new(),
            default_providers: Vec::new(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

/// One upstream provider's credentials and endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// API key; empty for keyless local endpoints.
    #[serde(default)]
    pub api_key: String,
    /// Base URL override; empty uses the vendor default.
    #[serde(default)]
    pub base_url: String,
    /// Initial runtime default model; empty uses the compile-time default.
    #[serde(default)]
    pub default_model: String,
}

/// Generative routing tier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerativeRoutingConfig {
    /// Whether the tier runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Deadline for the whole evaluator fan-out; `<= 0` uses a long default.
    #[serde(default)]
    pub global_timeout_ms: i64,
    /// Provider used when the resolver yields no decision.
    #[serde(default)]
    pub fallback_provider: String,
    /// Intent dimension evaluators.
    #[serde(default)]
    pub evaluators: Vec<EvaluatorConfig>,
    /// How the intent vector maps to a provider.
    #[serde(default)]
    pub resolution_strategy: ResolutionStrategyConfig,
}

/// One intent dimension evaluator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluatorConfig {
    /// Dimension name; becomes the key in the intent vector.
    #[serde(default)]
    pub name: String,
    /// Variant tag: `builtin`, `llm_api`, or `llm_logprob_api`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Upstream protocol for LLM-backed variants: `ollama` or `openai`.
    #[serde(default)]
    pub protocol: String,
    /// Endpoint URL for LLM-backed variants.
    #[serde(default)]
    pub endpoint: String,
    /// Model name for LLM-backed variants.
    #[serde(default)]
    pub model: String,
    /// How many messages before the last to include as history.
    #[serde(default)]
    pub history_rounds: usize,
    /// Socket-level timeout for the evaluator's HTTP client; 0 uses the
    /// variant default.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Per-token additive bias keyed by token id, forcing `0`/`1` outputs.
    #[serde(default)]
    pub logit_bias: HashMap<String, i64>,
    /// Prompt template rendered with `{{ History }}` and `{{ Current }}`.
    #[serde(default)]
    pub prompt_template: String,
    /// Length threshold for the builtin variant.
    #[serde(default)]
    pub threshold: usize,
}

/// Intent vector resolution settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionStrategyConfig {
    /// Variant tag: `dynamic_expression` or `strict_local_first`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Ordered rules for the dynamic-expression variant.
    #[serde(default)]
    pub rules: Vec<ResolutionRuleConfig>,
    /// Provider returned when no rule matches.
    #[serde(default)]
    pub default_provider: String,
}

/// One resolution rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionRuleConfig {
    /// Boolean expression over intent vector keys.
    #[serde(default)]
    pub condition: String,
    /// Provider selected when the condition holds.
    #[serde(default)]
    pub target_provider: String,
}

/// Template written when no configuration file exists yet.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"server:
  port: 8080
  host: "127.0.0.1"
remote_strategy:
  url: "https://your-config-domain.com/strategy.json"
  poll_interval: 60s
  # Optional routing expression returning a provider name. Available
  # variables: request_model, request_stream, request_message_count,
  # strategy, strategy_local_model, strategy_remote_provider,
  # strategy_remote_model.
  expression: ""
providers:
  openai:
    api_key: "sk-..."
  anthropic:
    api_key: "sk-ant-..."
  google:
    api_key: "AIza..."
  deepseek:
    api_key: "sk-..."
    base_url: "https://api.deepseek.com/v1"
  local_vllm:
    base_url: "http://192.168.1.100:8000/v1"
"#;

/// Resolve the configuration file path.
fn config_path() -> Result<PathBuf, GatewayError> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let base = dirs::config_dir()
        .ok_or_else(|| GatewayError::configuration("could not determine user config directory"))?;
    Ok(base.join("localrouter").join("config.yaml"))
}

/// Load the local configuration.
///
/// # Errors
/// Returns an error when the file is missing (after writing a default
/// template for the operator to edit) or fails to parse.
pub fn load() -> Result<Config, GatewayError> {
    let path = config_path()?;
    load_from(&path)
}

/// Load the configuration from an explicit path.
///
/// # Errors
/// Same contract as [`load`].
pub fn load_from(path: &std::path::Path) -> Result<Config, GatewayError> {
    if !path.exists() {
        warn!(path = %path.display(), "config file missing, writing default template");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::configuration(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| {
            GatewayError::configuration(format!(
                "failed to write default config to {}: {e}",
                path.display()
            ))
        })?;
        return Err(GatewayError::configuration(format!(
            "generated default config at {}; update it and restart",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::configuration(format!("failed to read config {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&raw)
        .map_err(|e| GatewayError::configuration(format!("failed to parse config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.remote_strategy.poll_interval, Duration::from_secs(60));
        assert!(config.providers.contains_key("local_vllm"));
        assert!(config.generative_routing.is_none());
    }

    #[test]
    fn parses_generative_routing_section() {
        let raw = r#"
server:
  port: 9090
remote_strategy:
  url: "https://cfg.example.com/strategy.json"
  poll_interval: 30s
  default_providers: ["local_vllm", "openai"]
providers:
  local_vllm:
    base_url: "http://127.0.0.1:8000/v1"
generative_routing:
  enabled: true
  global_timeout_ms: 1500
  fallback_provider: "google"
  evaluators:
    - name: complexity
      type: llm_logprob_api
      protocol: openai
      endpoint: "http://127.0.0.1:8000/v1/chat/completions"
      model: "qwen3-0.6b"
      history_rounds: 2
      timeout_ms: 800
      logit_bias:
        "15": 100
        "16": 100
      prompt_template: "History:\n{{ History }}\nCurrent: {{ Current }}\nAnswer 0 or 1."
    - name: length_check
      type: builtin
      threshold: 50
  resolution_strategy:
    type: dynamic_expression
    rules:
      - condition: "complexity == 0 && length_check < 50"
        target_provider: "local_vllm"
    default_provider: "google"
"#;
        let config: Config = serde_yaml::from_str(raw).unwrap();
        let routing = config.generative_routing.unwrap();
        assert!(routing.enabled);
        assert_eq!(routing.global_timeout_ms, 1500);
        assert_eq!(routing.evaluators.len(), 2);
        assert_eq!(routing.evaluators[0].kind, "llm_logprob_api");
        assert_eq!(routing.evaluators[0].logit_bias["15"], 100);
        assert_eq!(routing.evaluators[1].threshold, 50);
        assert_eq!(routing.resolution_strategy.kind, "dynamic_expression");
        assert_eq!(routing.resolution_strategy.rules.len(), 1);
        assert_eq!(
            config.remote_strategy.default_providers,
            vec!["local_vllm", "openai"]
        );
    }

    #[test]
    fn env_var_overrides_config_path() {
        let dir = std::env::temp_dir().join(format!(
            "localrouter-env-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.yaml");
        std::fs::write(&path, "server:\n  port: 9191\n").unwrap();

        std::env::set_var(CONFIG_PATH_ENV, &path);
        let config = load().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(config.server.port, 9191);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_writes_template_and_errors() {
        let dir = std::env::temp_dir().join(format!(
            "localrouter-config-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let path = dir.join("config.yaml");
        let _ = std::fs::remove_dir_all(&dir);

        let err = load_from(&path).unwrap_err();
        assert!(err.to_string().contains("generated default config"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DEFAULT_CONFIG_TEMPLATE
        );

        // Second load succeeds against the freshly written template.
        let config = load_from(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");

        let _ = std::fs::remove_dir_all(&dir);
    }
}

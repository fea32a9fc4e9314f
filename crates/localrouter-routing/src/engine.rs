//! The routing engine: one provider+model decision per request.

use crate::resolver::{build_resolver, Resolver};
use evalexpr::{ContextWithMutableVariables, HashMapContext, Node, Value};
use localrouter_config::{Config, GenerativeRoutingConfig, RemoteStrategy};
use localrouter_core::{ChatRequest, GatewayError, GatewayResult, Provider, ProviderMap};
use localrouter_evaluators::{build_evaluators, evaluate_all, Evaluator};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registration name of the local inference provider.
const LOCAL_PROVIDER: &str = "local_vllm";

/// Remote provider assumed when the strategy names none.
const DEFAULT_REMOTE_PROVIDER: &str = "google";

/// Providers tried in order when no strategy has been fetched and the
/// configuration does not override the preference list.
const DEFAULT_PREFERENCE: [&str; 2] = [DEFAULT_REMOTE_PROVIDER, LOCAL_PROVIDER];

/// Selects the upstream provider and target model for each request.
///
/// Decision tiers, in order:
/// 1. generative routing (evaluator pool + resolver), when enabled
/// 2. the default-provider preference list, when no strategy is known yet
/// 3. the configured global routing expression, when present
/// 4. the strategy's direct `local`/`remote` designation
pub struct RoutingEngine {
    providers: ProviderMap,
    generative: Option<GenerativeRoutingConfig>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    resolver: Option<Box<dyn Resolver>>,
    expression: Option<Node>,
    default_providers: Vec<String>,
}

impl RoutingEngine {
    /// Build the engine from the provider map and startup configuration.
    /// Broken pieces (bad expression, bad evaluators, unknown resolver type)
    /// are logged and dropped; the engine still routes with what remains.
    pub fn new(providers: ProviderMap, config: &Config) -> Self {
        let generative = config
            .generative_routing
            .clone()
            .filter(|routing| routing.enabled);

        let evaluators = generative
            .as_ref()
            .map(|routing| build_evaluators(&routing.evaluators))
            .unwrap_or_default();

        let resolver = generative
            .as_ref()
            .and_then(|routing| build_resolver(&routing.resolution_strategy));

        let expression = if config.remote_strategy.expression.is_empty() {
            None
        } else {
            match evalexpr::build_operator_tree(&config.remote_strategy.expression) {
                Ok(program) => Some(program),
                Err(e) => {
                    warn!(error = %e, "failed to compile routing expression");
                    None
                }
            }
        };

        let default_providers = if config.remote_strategy.default_providers.is_empty() {
            DEFAULT_PREFERENCE.iter().map(|s| s.to_string()).collect()
        } else {
            config.remote_strategy.default_providers.clone()
        };

        Self {
            providers,
            generative,
            evaluators,
            resolver,
            expression,
            default_providers,
        }
    }

    /// Choose the provider and target model for a request under the given
    /// strategy snapshot.
    ///
    /// # Errors
    /// Returns a routing error when no tier can produce a registered
    /// provider, or when the strategy names an unknown tier.
    pub async fn select_provider(
        &self,
        req: &ChatRequest,
        strategy: &RemoteStrategy,
    ) -> GatewayResult<(Arc<dyn Provider>, String)> {
        // Tier 1: generative routing.
        if let Some(generative) = &self.generative {
            if !self.evaluators.is_empty() {
                let vector =
                    evaluate_all(&req.messages, generative.global_timeout_ms, &self.evaluators)
                        .await;
                debug!(dimensions = vector.len(), "intent vector evaluated");

                let target = self
                    .resolver
                    .as_ref()
                    .and_then(|resolver| resolver.resolve(&vector))
                    .or_else(|| {
                        if generative.fallback_provider.is_empty() {
                            None
                        } else {
                            Some(generative.fallback_provider.clone())
                        }
                    });

                if let Some(name) = target {
                    if let Some(provider) = self.providers.get(&name) {
                        return Ok((Arc::clone(provider), req.model.clone()));
                    }
                    warn!(provider = %name, "generative routing target not registered, continuing to normal routing");
                }
            }
        }

        // Tier 2: no strategy fetched yet.
        if strategy.strategy.is_empty() {
            debug!("no remote strategy defined, trying default providers");
            for name in &self.default_providers {
                if let Some(provider) = self.providers.get(name) {
                    return Ok((Arc::clone(provider), req.model.clone()));
                }
            }
            return Err(GatewayError::routing(
                "no strategy and no sensible default providers found",
            ));
        }

        // Tier 3: global routing expression.
        if let Some(program) = &self.expression {
            match program.eval_with_context(&expression_env(req, strategy)) {
                Ok(Value::String(name)) => {
                    if let Some(provider) = self.providers.get(&name) {
                        let model = if name == LOCAL_PROVIDER && !strategy.local_model.is_empty() {
                            strategy.local_model.clone()
                        } else if !strategy.remote_model.is_empty() {
                            strategy.remote_model.clone()
                        } else {
                            req.model.clone()
                        };
                        return Ok((Arc::clone(provider), model));
                    }
                    warn!(provider = %name, "routing expression matched unknown provider");
                }
                Ok(other) => {
                    debug!(result = ?other, "routing expression returned non-provider value");
                }
                Err(e) => {
                    warn!(error = %e, "routing expression evaluation failed");
                }
            }
        }

        // Tier 4: direct strategy.
        match strategy.strategy.as_str() {
            "remote" => {
                let name = if strategy.remote_provider.is_empty() {
                    DEFAULT_REMOTE_PROVIDER
                } else {
                    strategy.remote_provider.as_str()
                };
                let provider = self.providers.get(name).ok_or_else(|| {
                    GatewayError::routing(format!("remote provider {name:?} not configured"))
                })?;
                Ok((Arc::clone(provider), strategy.remote_model.clone()))
            }
            "local" => {
                let provider = self.providers.get(LOCAL_PROVIDER).ok_or_else(|| {
                    GatewayError::routing(format!(
                        "local provider {LOCAL_PROVIDER:?} not configured"
                    ))
                })?;
                Ok((Arc::clone(provider), strategy.local_model.clone()))
            }
            other => Err(GatewayError::routing(format!("unknown strategy: {other}"))),
        }
    }
}

/// Flattened request+strategy environment for the routing expression.
fn expression_env(req: &ChatRequest, strategy: &RemoteStrategy) -> HashMapContext {
    let mut context = HashMapContext::new();
    let _ = context.set_value(
        "request_model".to_string(),
        Value::String(req.model.clone()),
    );
    let _ = context.set_value("request_stream".to_string(), Value::Boolean(req.stream));
    let _ = context.set_value(
        "request_message_count".to_string(),
        Value::Int(req.messages.len() as i64),
    );
    let _ = context.set_value(
        "strategy".to_string(),
        Value::String(strategy.strategy.clone()),
    );
    let _ = context.set_value(
        "strategy_local_model".to_string(),
        Value::String(strategy.local_model.clone()),
    );
    let _ = context.set_value(
        "strategy_remote_provider".to_string(),
        Value::String(strategy.remote_provider.clone()),
    );
    let _ = context.set_value(
        "strategy_remote_model".to_string(),
        Value::String(strategy.remote_model.clone()),
    );
    context
}

//! The resolution contract: intent vector in, provider name out.

use crate::expression::ExpressionResolver;
use crate::strict_local::StrictLocalResolver;
use localrouter_config::ResolutionStrategyConfig;
use std::collections::HashMap;
use tracing::warn;

/// Maps an intent vector to a target provider name.
pub trait Resolver: Send + Sync {
    /// Unique identifier of the strategy.
    fn name(&self) -> &str;

    /// Resolve the vector to a provider name. `None` means "no decision";
    /// the caller falls back to its own default.
    fn resolve(&self, vector: &HashMap<String, f64>) -> Option<String>;
}

/// Build the configured resolver. Unknown strategy types are logged and yield
/// no resolver, leaving the generative tier to its fallback provider.
pub fn build_resolver(config: &ResolutionStrategyConfig) -> Option<Box<dyn Resolver>> {
    match config.kind.as_str() {
        "dynamic_expression" => Some(Box::new(ExpressionResolver::new(config))),
        "strict_local_first" => Some(Box::new(StrictLocalResolver::new(config))),
        "" => None,
        other => {
            warn!(kind = %other, "unknown resolution strategy type");
            None
        }
    }
}

/// Treat an empty configured provider name as "no decision".
pub(crate) fn non_empty(name: &str) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

//! The hardcoded local-first resolution strategy.

use crate::resolver::{non_empty, Resolver};
use localrouter_config::ResolutionStrategyConfig;
use std::collections::HashMap;

/// Provider chosen when every gate dimension scores zero.
const LOCAL_TARGET: &str = "local_vllm";

/// The dimensions that must all be present and zero for local routing.
const GATE_DIMENSIONS: [&str; 3] = ["complexity", "context_rel", "length_check"];

/// Routes to the local provider only when complexity, context relevance, and
/// length all scored zero; anything else (including an incomplete vector)
/// goes to the configured default provider.
pub struct StrictLocalResolver {
    default_provider: String,
}

impl StrictLocalResolver {
    /// Create the resolver from its configuration.
    pub fn new(config: &ResolutionStrategyConfig) -> Self {
        Self {
            default_provider: config.default_provider.clone(),
        }
    }
}

impl Resolver for StrictLocalResolver {
    fn name(&self) -> &str {
        "strict_local_first"
    }

    fn resolve(&self, vector: &HashMap<String, f64>) -> Option<String> {
        let mut all_zero = true;
        for dimension in GATE_DIMENSIONS {
            match vector.get(dimension) {
                Some(&score) => all_zero &= score == 0.0,
                // Incomplete vector: an evaluator failed or timed out.
                None => return non_empty(&self.default_provider),
            }
        }

        if all_zero {
            Some(LOCAL_TARGET.to_string())
        } else {
            non_empty(&self.default_provider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StrictLocalResolver {
        StrictLocalResolver::new(&ResolutionStrategyConfig {
            kind: "strict_local_first".to_string(),
            default_provider: "google".to_string(),
            ..Default::default()
        })
    }

    fn vector(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn all_zero_routes_local() {
        let v = vector(&[("complexity", 0.0), ("context_rel", 0.0), ("length_check", 0.0)]);
        assert_eq!(resolver().resolve(&v), Some("local_vllm".to_string()));
    }

    #[test]
    fn any_nonzero_routes_default() {
        let v = vector(&[("complexity", 1.0), ("context_rel", 0.0), ("length_check", 0.0)]);
        assert_eq!(resolver().resolve(&v), Some("google".to_string()));
    }

    #[test]
    fn incomplete_vector_routes_default() {
        let v = vector(&[("complexity", 0.0), ("length_check", 0.0)]);
        assert_eq!(resolver().resolve(&v), Some("google".to_string()));
    }

    #[test]
    fn empty_default_provider_yields_no_decision() {
        let resolver = StrictLocalResolver::new(&ResolutionStrategyConfig::default());
        assert_eq!(resolver.resolve(&HashMap::new()), None);
    }

    #[test]
    fn extra_dimensions_are_ignored() {
        let v = vector(&[
            ("complexity", 0.0),
            ("context_rel", 0.0),
            ("length_check", 0.0),
            ("sentiment", 0.9),
        ]);
        assert_eq!(resolver().resolve(&v), Some("local_vllm".to_string()));
    }
}

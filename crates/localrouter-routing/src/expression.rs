//! The dynamic-expression resolution strategy.
//!
//! Rule conditions are boolean expressions over intent vector keys, compiled
//! once at startup. A condition referencing a dimension missing from the
//! vector (an evaluator failed or timed out) must not break the request: the
//! evaluation error just skips that rule.

use crate::resolver::{non_empty, Resolver};
use evalexpr::{ContextWithMutableVariables, HashMapContext, Node, Value};
use localrouter_config::ResolutionStrategyConfig;
use std::collections::HashMap;
use tracing::{debug, warn};

struct CompiledRule {
    program: Node,
    target_provider: String,
}

/// Resolves via an ordered list of precompiled boolean rules; the first rule
/// evaluating to true wins.
pub struct ExpressionResolver {
    rules: Vec<CompiledRule>,
    default_provider: String,
}

impl ExpressionResolver {
    /// Compile the configured rules. Rules that fail to compile are logged
    /// and dropped.
    pub fn new(config: &ResolutionStrategyConfig) -> Self {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            match evalexpr::build_operator_tree(&rule.condition) {
                Ok(program) => rules.push(CompiledRule {
                    program,
                    target_provider: rule.target_provider.clone(),
                }),
                Err(e) => {
                    warn!(condition = %rule.condition, error = %e, "failed to compile resolution rule");
                }
            }
        }
        Self {
            rules,
            default_provider: config.default_provider.clone(),
        }
    }
}

impl Resolver for ExpressionResolver {
    fn name(&self) -> &str {
        "dynamic_expression"
    }

    fn resolve(&self, vector: &HashMap<String, f64>) -> Option<String> {
        let mut context = HashMapContext::new();
        for (dimension, score) in vector {
            // Integral scores go in as integers so that `dim == 0` matches
            // classifier outputs; the engine's equality is typed.
            let value = if score.fract() == 0.0 && score.abs() < i64::MAX as f64 {
                Value::Int(*score as i64)
            } else {
                Value::Float(*score)
            };
            let _ = context.set_value(dimension.clone(), value);
        }

        for rule in &self.rules {
            match rule.program.eval_with_context(&context) {
                Ok(Value::Boolean(true)) => {
                    return Some(rule.target_provider.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    // Typically an undefined dimension; skip the rule.
                    debug!(target = %rule.target_provider, error = %e, "rule evaluation skipped");
                }
            }
        }

        non_empty(&self.default_provider)
    }
}

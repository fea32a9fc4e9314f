//! The evaluator contract and the config-driven factory.

use crate::builtin::BuiltinLengthEvaluator;
use crate::llm_api::LlmApiEvaluator;
use crate::llm_logprob::LlmLogprobEvaluator;
use async_trait::async_trait;
use localrouter_config::EvaluatorConfig;
use localrouter_core::{ChatMessage, GatewayResult};
use std::sync::Arc;
use tracing::warn;

/// A single dimension's score.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// The dimension name, equal to the evaluator's name.
    pub dimension: String,
    /// The score: `{0.0, 1.0}` for hard classifiers, `[0.0, 1.0]` for
    /// logprob-based evaluators.
    pub score: f64,
}

/// An intent detection evaluator scoring one dimension of a conversation.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Unique identifier; the key of this dimension in the intent vector.
    fn name(&self) -> &str;

    /// How many messages before the last are included as history context.
    fn history_rounds(&self) -> usize;

    /// Score the conversation. Implementations must honor cancellation by
    /// the caller dropping the future; the pool additionally bounds each
    /// call with the global deadline.
    async fn evaluate(&self, messages: &[ChatMessage]) -> GatewayResult<EvaluationResult>;
}

/// Build evaluators from configuration.
///
/// Unknown `type` tags and construction failures (bad prompt template, bad
/// endpoint) are logged and dropped; routing continues with the evaluators
/// that did construct.
pub fn build_evaluators(configs: &[EvaluatorConfig]) -> Vec<Arc<dyn Evaluator>> {
    let mut evaluators: Vec<Arc<dyn Evaluator>> = Vec::with_capacity(configs.len());
    for config in configs {
        match config.kind.as_str() {
            "builtin" => {
                evaluators.push(Arc::new(BuiltinLengthEvaluator::new(config)));
            }
            "llm_api" => match LlmApiEvaluator::new(config) {
                Ok(evaluator) => evaluators.push(Arc::new(evaluator)),
                Err(e) => {
                    warn!(evaluator = %config.name, error = %e, "failed to init LLM API evaluator");
                }
            },
            "llm_logprob_api" => match LlmLogprobEvaluator::new(config) {
                Ok(evaluator) => evaluators.push(Arc::new(evaluator)),
                Err(e) => {
                    warn!(evaluator = %config.name, error = %e, "failed to init LLM logprob evaluator");
                }
            },
            other => {
                warn!(evaluator = %config.name, kind = %other, "unknown evaluator type, skipping");
            }
        }
    }
    evaluators
}

/// Extract the first decimal digit of the trimmed content as a score.
///
/// This is how hard classifier outputs (`"0"`, `"1\n"`, `"Answer: 1"`) are
/// turned into numbers; anything without a digit is an error.
pub(crate) fn parse_digit_score(content: &str) -> GatewayResult<f64> {
    let trimmed = content.trim();
    trimmed
        .chars()
        .find_map(|c| c.to_digit(10))
        .map(f64::from)
        .ok_or_else(|| {
            localrouter_core::GatewayError::evaluation(format!(
                "no decimal digit in evaluator output {trimmed:?}"
            ))
        })
}

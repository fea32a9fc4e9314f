//! The builtin length classifier.

use crate::evaluator::{EvaluationResult, Evaluator};
use async_trait::async_trait;
use localrouter_config::EvaluatorConfig;
use localrouter_core::{ChatMessage, GatewayError, GatewayResult};
use tracing::debug;

/// Scores the character length of the latest message: `1.0` when the trimmed
/// content reaches the configured threshold, `0.0` below it.
pub struct BuiltinLengthEvaluator {
    name: String,
    threshold: usize,
}

impl BuiltinLengthEvaluator {
    /// Create the evaluator from its configuration.
    pub fn new(config: &EvaluatorConfig) -> Self {
        Self {
            name: config.name.clone(),
            threshold: config.threshold,
        }
    }
}

#[async_trait]
impl Evaluator for BuiltinLengthEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn history_rounds(&self) -> usize {
        // Only the current message matters.
        0
    }

    async fn evaluate(&self, messages: &[ChatMessage]) -> GatewayResult<EvaluationResult> {
        let last = messages
            .last()
            .ok_or_else(|| GatewayError::evaluation("no messages provided"))?;

        let length = last.content.trim().chars().count();
        let score = if length >= self.threshold { 1.0 } else { 0.0 };
        debug!(evaluator = %self.name, length, score, "length evaluation");

        Ok(EvaluationResult {
            dimension: self.name.clone(),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(threshold: usize) -> BuiltinLengthEvaluator {
        BuiltinLengthEvaluator::new(&EvaluatorConfig {
            name: "length_check".to_string(),
            kind: "builtin".to_string(),
            threshold,
            ..Default::default()
        })
    }

    async fn score(threshold: usize, content: &str) -> f64 {
        evaluator(threshold)
            .evaluate(&[ChatMessage::user(content)])
            .await
            .unwrap()
            .score
    }

    #[tokio::test]
    async fn threshold_boundary() {
        assert_eq!(score(5, "1234").await, 0.0);
        assert_eq!(score(5, "12345").await, 1.0);
        assert_eq!(score(5, "123456").await, 1.0);
    }

    #[tokio::test]
    async fn whitespace_is_trimmed_before_counting() {
        assert_eq!(score(3, "  ab  ").await, 0.0);
        assert_eq!(score(3, "  abc  ").await, 1.0);
    }

    #[tokio::test]
    async fn length_is_counted_in_chars_not_bytes() {
        // Five CJK characters are fifteen UTF-8 bytes but five runes.
        assert_eq!(score(6, "你好世界啊").await, 0.0);
        assert_eq!(score(5, "你好世界啊").await, 1.0);
    }

    #[tokio::test]
    async fn only_last_message_is_scored() {
        let result = evaluator(10)
            .evaluate(&[
                ChatMessage::user("a very long message that exceeds the threshold"),
                ChatMessage::user("short"),
            ])
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn empty_conversation_is_an_error() {
        assert!(evaluator(5).evaluate(&[]).await.is_err());
    }
}

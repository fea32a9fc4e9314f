//! Concurrent evaluator fan-out under a single deadline.

use crate::evaluator::Evaluator;
use localrouter_core::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;

/// Deadline used when the configured global timeout is zero or negative.
const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Run all evaluators concurrently and assemble the intent vector.
///
/// Each evaluator runs on its own task under a deadline of
/// `global_timeout_ms` from now (`<= 0` uses a long default). Partial failure
/// is never fatal: an evaluator that errors or misses the deadline is logged
/// and contributes nothing; its dimension is absent from the result, never
/// zero-filled. The call returns once every task has settled.
pub async fn evaluate_all(
    messages: &[ChatMessage],
    global_timeout_ms: i64,
    evaluators: &[Arc<dyn Evaluator>],
) -> HashMap<String, f64> {
    let timeout = if global_timeout_ms > 0 {
        Duration::from_millis(global_timeout_ms as u64)
    } else {
        DEFAULT_GLOBAL_TIMEOUT
    };
    let deadline = tokio::time::Instant::now() + timeout;

    let mut tasks = JoinSet::new();
    for evaluator in evaluators {
        let evaluator = Arc::clone(evaluator);
        let messages = messages.to_vec();
        tasks.spawn(async move {
            match tokio::time::timeout_at(deadline, evaluator.evaluate(&messages)).await {
                Ok(Ok(result)) => Some((result.dimension, result.score)),
                Ok(Err(e)) => {
                    warn!(evaluator = evaluator.name(), error = %e, "evaluator failed");
                    None
                }
                Err(_) => {
                    warn!(evaluator = evaluator.name(), "evaluator timed out");
                    None
                }
            }
        });
    }

    let mut vector = HashMap::new();
    while let Some(settled) = tasks.join_next().await {
        if let Ok(Some((dimension, score))) = settled {
            vector.insert(dimension, score);
        }
    }
    vector
}

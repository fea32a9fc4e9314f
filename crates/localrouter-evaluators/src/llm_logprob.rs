//! The logprob-based smooth classifier.
//!
//! Instead of reading the model's answer as text, this evaluator requests
//! token log-probabilities and computes a softmax between the `"0"` and `"1"`
//! tokens, yielding a continuous score in `[0.0, 1.0]`. Under the Ollama
//! protocol, which exposes no logprobs, it degrades to content parsing and
//! returns a hard `{0.0, 1.0}` score.

use crate::evaluator::{parse_digit_score, EvaluationResult, Evaluator};
use crate::http::post_json;
use crate::llm_api::parse_ollama_content;
use crate::prompt::PromptTemplate;
use async_trait::async_trait;
use localrouter_config::EvaluatorConfig;
use localrouter_core::{ChatMessage, GatewayError, GatewayResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Socket timeout when the configuration does not set one. Logprob calls may
/// hit reasoning models that think before answering.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A smooth classifier reading `"0"`/`"1"` token log-probabilities.
pub struct LlmLogprobEvaluator {
    name: String,
    endpoint: String,
    model: String,
    protocol: String,
    history_rounds: usize,
    logit_bias: HashMap<String, i64>,
    template: PromptTemplate,
    client: reqwest::Client,
}

impl LlmLogprobEvaluator {
    /// Create the evaluator from its configuration.
    ///
    /// # Errors
    /// Returns an error when the prompt template does not parse or the HTTP
    /// client cannot be built.
    pub fn new(config: &EvaluatorConfig) -> GatewayResult<Self> {
        let template = PromptTemplate::compile(&config.prompt_template)?;
        let timeout = if config.timeout_ms > 0 {
            Duration::from_millis(config.timeout_ms)
        } else {
            DEFAULT_TIMEOUT
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GatewayError::configuration(format!("failed to build evaluator client: {e}"))
            })?;

        let protocol = if config.protocol.is_empty() {
            "ollama".to_string()
        } else {
            config.protocol.clone()
        };

        Ok(Self {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            protocol,
            history_rounds: config.history_rounds,
            logit_bias: config.logit_bias.clone(),
            template,
            client,
        })
    }

    /// Ollama fallback: content parsing, discrete score.
    async fn evaluate_ollama(&self, prompt: &str) -> GatewayResult<f64> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
            "think": false,
            "options": {"temperature": 0.0, "num_predict": 1},
        });
        let response = post_json(&self.client, &self.name, &self.endpoint, &body).await?;
        parse_digit_score(&parse_ollama_content(&response)?)
    }

    /// OpenAI-compatible path: request logprobs, softmax the `"0"`/`"1"`
    /// alternatives of the answer token.
    async fn evaluate_openai(&self, prompt: &str) -> GatewayResult<f64> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
            "max_tokens": 150,
            "logprobs": true,
            "top_logprobs": 2,
            "disable_thinking": true,
            "think": false,
        });
        if !self.logit_bias.is_empty() {
            body["logit_bias"] = serde_json::json!(self.logit_bias);
        }
        let response = post_json(&self.client, &self.name, &self.endpoint, &body).await?;
        parse_logprob_score(&response)
    }
}

#[async_trait]
impl Evaluator for LlmLogprobEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn history_rounds(&self) -> usize {
        self.history_rounds
    }

    async fn evaluate(&self, messages: &[ChatMessage]) -> GatewayResult<EvaluationResult> {
        if messages.is_empty() {
            return Err(GatewayError::evaluation("no messages provided"));
        }
        let prompt = self.template.render(messages, self.history_rounds)?;

        let score = if self.protocol == "openai" {
            self.evaluate_openai(&prompt).await?
        } else {
            self.evaluate_ollama(&prompt).await?
        };

        Ok(EvaluationResult {
            dimension: self.name.clone(),
            score,
        })
    }
}

#[derive(Deserialize)]
struct TopLogprob {
    #[serde(default)]
    token: String,
    #[serde(default)]
    logprob: f64,
}

#[derive(Deserialize)]
struct LogprobToken {
    #[serde(default)]
    token: String,
    #[serde(default)]
    top_logprobs: Vec<TopLogprob>,
}

#[derive(Deserialize)]
struct LogprobContent {
    #[serde(default)]
    content: Vec<LogprobToken>,
}

#[derive(Deserialize)]
struct LogprobChoice {
    logprobs: Option<LogprobContent>,
}

#[derive(Deserialize)]
struct LogprobResponse {
    #[serde(default)]
    choices: Vec<LogprobChoice>,
}

/// Compute the softmax score for `"1"` from an OpenAI-compatible response.
///
/// The answer token is located by scanning the generated tokens backwards for
/// a trimmed `"0"` or `"1"`, skipping any reasoning prefix the model emitted.
pub(crate) fn parse_logprob_score(body: &[u8]) -> GatewayResult<f64> {
    let response: LogprobResponse = serde_json::from_slice(body)?;
    let tokens = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.logprobs)
        .map(|l| l.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GatewayError::evaluation("missing logprobs in response"))?;

    let top_logprobs = tokens
        .iter()
        .rev()
        .find(|t| matches!(t.token.trim(), "0" | "1"))
        .map(|t| &t.top_logprobs)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::evaluation("missing '0' or '1' token in logprobs"))?;

    let mut logprob_0 = f64::NEG_INFINITY;
    let mut logprob_1 = f64::NEG_INFINITY;
    for candidate in top_logprobs {
        match candidate.token.trim() {
            "0" => logprob_0 = candidate.logprob,
            "1" => logprob_1 = candidate.logprob,
            _ => {}
        }
    }

    softmax_score(logprob_0, logprob_1)
}

/// Numerically stable two-way softmax for the probability of `"1"`.
fn softmax_score(logprob_0: f64, logprob_1: f64) -> GatewayResult<f64> {
    match (
        logprob_0 == f64::NEG_INFINITY,
        logprob_1 == f64::NEG_INFINITY,
    ) {
        (true, true) => Err(GatewayError::evaluation(
            "neither '0' nor '1' found in top logprobs",
        )),
        (true, false) => Ok(1.0),
        (false, true) => Ok(0.0),
        (false, false) => {
            let max = logprob_0.max(logprob_1);
            let exp_0 = (logprob_0 - max).exp();
            let exp_1 = (logprob_1 - max).exp();
            Ok(exp_1 / (exp_0 + exp_1))
        }
    }
}

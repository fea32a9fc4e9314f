//! The LLM-backed hard classifier.
//!
//! Renders the prompt template, asks a small model over either the Ollama
//! native or an OpenAI-compatible chat API, and reads the first decimal digit
//! of the reply as the score.

use crate::evaluator::{parse_digit_score, EvaluationResult, Evaluator};
use crate::http::post_json;
use crate::prompt::PromptTemplate;
use async_trait::async_trait;
use localrouter_config::EvaluatorConfig;
use localrouter_core::{ChatMessage, GatewayError, GatewayResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Socket timeout when the configuration does not set one. Classifier calls
/// sit on the request path, so the default is aggressive.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// A single-digit classifier backed by a chat-completion endpoint.
pub struct LlmApiEvaluator {
    name: String,
    endpoint: String,
    model: String,
    protocol: String,
    history_rounds: usize,
    logit_bias: HashMap<String, i64>,
    template: PromptTemplate,
    client: reqwest::Client,
}

impl LlmApiEvaluator {
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

        Ok(Self {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            protocol: config.protocol.clone(),
            history_rounds: config.history_rounds,
            logit_bias: config.logit_bias.clone(),
            template,
            client,
        })
    }

    /// Request body for the Ollama native `/api/chat` protocol.
    fn ollama_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
            "think": false,
            "options": {"temperature": 0.0, "num_predict": 1},
        })
    }

    /// Request body for the OpenAI-compatible protocol.
    fn openai_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
            "max_tokens": 150,
            "disable_thinking": true,
            "think": false,
        });
        if !self.logit_bias.is_empty() {
            body["logit_bias"] = serde_json::json!(self.logit_bias);
        }
        body
    }
}

#[async_trait]
impl Evaluator for LlmApiEvaluator {
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

        let content = if self.protocol == "ollama" {
            let body = post_json(&self.client, &self.name, &self.endpoint, &self.ollama_body(&prompt)).await?;
            parse_ollama_content(&body)?
        } else {
            let body = post_json(&self.client, &self.name, &self.endpoint, &self.openai_body(&prompt)).await?;
            parse_openai_content(&body)?
        };

        Ok(EvaluationResult {
            dimension: self.name.clone(),
            score: parse_digit_score(&content)?,
        })
    }
}

/// Pull `.message.content` out of an Ollama chat response.
pub(crate) fn parse_ollama_content(body: &[u8]) -> GatewayResult<String> {
    #[derive(Deserialize)]
    struct OllamaMessage {
        #[serde(default)]
        content: String,
    }
    #[derive(Deserialize)]
    struct OllamaResponse {
        message: OllamaMessage,
    }

    let response: OllamaResponse = serde_json::from_slice(body)?;
    if response.message.content.trim().is_empty() {
        return Err(GatewayError::evaluation("empty content in ollama response"));
    }
    Ok(response.message.content)
}

/// Pull `.choices[0].message.content` out of an OpenAI-compatible response.
pub(crate) fn parse_openai_content(body: &[u8]) -> GatewayResult<String> {
    #[derive(Deserialize)]
    struct OpenAiMessage {
        #[serde(default)]
        content: String,
    }
    #[derive(Deserialize)]
    struct OpenAiChoice {
        message: OpenAiMessage,
    }
    #[derive(Deserialize)]
    struct OpenAiResponse {
        #[serde(default)]
        choices: Vec<OpenAiChoice>,
    }

    let response: OpenAiResponse = serde_json::from_slice(body)?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| GatewayError::evaluation("empty choices in response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EvaluatorConfig {
        EvaluatorConfig {
            name: "complexity".to_string(),
            kind: "llm_api".to_string(),
            endpoint: "http://127.0.0.1:8000/v1/chat/completions".to_string(),
            model: "qwen3-0.6b".to_string(),
            prompt_template: "{{ Current }}".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn openai_body_includes_logit_bias_when_set() {
        let mut cfg = config();
        cfg.logit_bias.insert("15".to_string(), 100);
        let evaluator = LlmApiEvaluator::new(&cfg).unwrap();

        let body = evaluator.openai_body("p");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["logit_bias"]["15"], 100);
        assert_eq!(body["disable_thinking"], true);
    }

    #[test]
    fn openai_body_omits_empty_logit_bias() {
        let evaluator = LlmApiEvaluator::new(&config()).unwrap();
        assert!(evaluator.openai_body("p").get("logit_bias").is_none());
    }

    #[test]
    fn ollama_body_shape() {
        let evaluator = LlmApiEvaluator::new(&config()).unwrap();
        let body = evaluator.ollama_body("p");
        assert_eq!(body["stream"], false);
        assert_eq!(body["think"], false);
        assert_eq!(body["options"]["num_predict"], 1);
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn parses_ollama_content() {
        let body = br#"{"message":{"role":"assistant","content":"1"}}"#;
        assert_eq!(parse_ollama_content(body).unwrap(), "1");
        assert!(parse_ollama_content(br#"{"message":{"content":"  "}}"#).is_err());
    }

    #[test]
    fn parses_openai_content() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"0"}}]}"#;
        assert_eq!(parse_openai_content(body).unwrap(), "0");
        assert!(parse_openai_content(br#"{"choices":[]}"#).is_err());
    }
}

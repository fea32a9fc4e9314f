//! Prompt template rendering shared by the LLM-backed evaluators.

use localrouter_core::{ChatMessage, GatewayError, GatewayResult};
use minijinja::{context, Environment};

/// A prompt template validated at construction and rendered per evaluation
/// with `{{ History }}` and `{{ Current }}`.
pub(crate) struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// Validate and keep the template source.
    ///
    /// # Errors
    /// Returns an error when the template fails to parse, so a broken
    /// evaluator is dropped at startup rather than failing every request.
    pub fn compile(source: &str) -> GatewayResult<Self> {
        let env = Environment::new();
        env.template_from_str(source)
            .map_err(|e| GatewayError::configuration(format!("invalid prompt template: {e}")))?;
        Ok(Self {
            source: source.to_string(),
        })
    }

    /// Render the template for a conversation. `History` is the last
    /// `history_rounds` messages before the final one, each formatted
    /// `<role>: <content>\n`; `Current` is the final message's content.
    pub fn render(&self, messages: &[ChatMessage], history_rounds: usize) -> GatewayResult<String> {
        let (history, current) = split_history(messages, history_rounds);
        let env = Environment::new();
        env.render_str(
            &self.source,
            context! { History => history, Current => current },
        )
        .map_err(|e| GatewayError::evaluation(format!("template rendering failed: {e}")))
    }
}

/// Split a non-empty conversation into rendered history and current content.
fn split_history(messages: &[ChatMessage], rounds: usize) -> (String, String) {
    let end = messages.len().saturating_sub(1);
    let start = end.saturating_sub(rounds);

    let mut history = String::new();
    for message in &messages[start..end] {
        history.push_str(&message.role);
        history.push_str(": ");
        history.push_str(&message.content);
        history.push('\n');
    }

    let current = messages.last().map(|m| m.content.clone()).unwrap_or_default();
    (history, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("current question"),
        ]
    }

    #[test]
    fn renders_history_and_current() {
        let template =
            PromptTemplate::compile("H:\n{{ History }}C: {{ Current }}").unwrap();
        let rendered = template.render(&conversation(), 2).unwrap();
        assert_eq!(
            rendered,
            "H:\nuser: first question\nassistant: first answer\nC: current question"
        );
    }

    #[test]
    fn history_is_clamped_to_available_messages() {
        let template = PromptTemplate::compile("{{ History }}|{{ Current }}").unwrap();
        let rendered = template.render(&conversation(), 10).unwrap();
        assert!(rendered.starts_with("system: be brief\n"));
        assert!(rendered.ends_with("|current question"));
    }

    #[test]
    fn zero_rounds_renders_empty_history() {
        let template = PromptTemplate::compile("{{ History }}|{{ Current }}").unwrap();
        let rendered = template.render(&conversation(), 0).unwrap();
        assert_eq!(rendered, "|current question");
    }

    #[test]
    fn invalid_template_fails_compile() {
        assert!(PromptTemplate::compile("{{ unclosed").is_err());
    }
}

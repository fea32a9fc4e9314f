//! # Localrouter Providers
//!
//! Upstream provider implementations:
//! - [`OpenAiProvider`]: any OpenAI-compatible API (OpenAI itself, DeepSeek,
//!   a local vLLM server, ...)
//! - [`AnthropicProvider`]: the Anthropic Messages API
//! - [`GoogleProvider`]: the Google Gemini REST API
//!
//! Each provider translates between the gateway's OpenAI-shaped wire schema
//! and the vendor-native one, resolves empty model names against its runtime
//! then compile-time default, and retries a 404 once with the compile-time
//! default when the active remote strategy allows it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;

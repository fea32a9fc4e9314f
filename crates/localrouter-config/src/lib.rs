//! # Localrouter Config
//!
//! Two configuration layers:
//! - [`local`]: the YAML file read once at startup (server address, provider
//!   credentials, generative routing setup)
//! - [`remote`]: the strategy JSON polled from a remote origin at runtime and
//!   published atomically to the request path

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod local;
pub mod remote;

pub use local::{
    Config, EvaluatorConfig, GenerativeRoutingConfig, ProviderConfig, RemoteStrategyConfig,
    ResolutionRuleConfig, ResolutionStrategyConfig, ServerConfig,
};
pub use remote::{RemoteStrategy, RemoteStrategyStore, StrategyCell};

//! Error types shared across the gateway.

use thiserror::Error;

/// Result type used throughout the gateway.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors produced while routing, evaluating, or proxying a request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid or missing configuration detected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No viable provider could be selected for a request.
    #[error("routing error: {0}")]
    Routing(String),

    /// An intent evaluator failed to produce a score.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The upstream HTTP request itself failed (connect, timeout, body read).
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream request failed with a provider-sanitized message.
    ///
    /// Used where the raw transport error cannot be carried because its text
    /// may embed secrets (the Gemini API key rides in the URL).
    #[error("{provider} request failed: {message}")]
    Upstream {
        /// Provider that made the request.
        provider: String,
        /// Sanitized error message.
        message: String,
    },

    /// The upstream answered with a non-success status.
    #[error("{provider} returned status {status}: {message}")]
    UpstreamStatus {
        /// Provider that produced the response.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body or a redacted summary of it.
        message: String,
    },

    /// An upstream payload could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A streaming response broke mid-flight.
    #[error("stream error: {0}")]
    Stream(String),

    /// Socket-level failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a routing error.
    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing(message.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Create a sanitized upstream error.
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an upstream status error.
    pub fn upstream_status(
        provider: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::UpstreamStatus {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }
}

//! # Localrouter Server
//!
//! The axum HTTP front-end: decodes client requests, asks the routing engine
//! for a provider, and proxies the response back — translating vendor stream
//! events into OpenAI-format SSE frames terminated by `data: [DONE]`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::serve;
pub use state::AppState;

//! # Localrouter Routing
//!
//! Turns a request plus the current remote strategy into one provider+model
//! decision. Two layers:
//! - [`resolver`]: maps an intent vector (from the evaluator pool) to a
//!   provider name
//! - [`engine`]: composes the generative tier, the missing-strategy
//!   preference list, the global routing expression, and the direct
//!   local/remote strategy into [`RoutingEngine::select_provider`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod expression;
pub mod resolver;
pub mod strict_local;

pub use engine::RoutingEngine;
pub use expression::ExpressionResolver;
pub use resolver::{build_resolver, Resolver};
pub use strict_local::StrictLocalResolver;

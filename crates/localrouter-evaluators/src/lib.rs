//! # Localrouter Evaluators
//!
//! Intent-score producers for generative routing. Each evaluator scores one
//! dimension of a request (complexity, length, context relevance, ...); the
//! [`pool`] runs all configured evaluators concurrently under a global
//! deadline and assembles the sparse intent vector.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtin;
pub mod evaluator;
mod http;
pub mod llm_api;
pub mod llm_logprob;
pub mod pool;
mod prompt;

pub use builtin::BuiltinLengthEvaluator;
pub use evaluator::{build_evaluators, EvaluationResult, Evaluator};
pub use llm_api::LlmApiEvaluator;
pub use llm_logprob::LlmLogprobEvaluator;
pub use pool::evaluate_all;

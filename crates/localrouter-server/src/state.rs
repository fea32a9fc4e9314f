//! Shared application state.

use localrouter_config::StrategyCell;
use localrouter_routing::RoutingEngine;
use std::sync::Arc;

/// State handed to every request handler.
///
/// Each request takes one strategy snapshot from the cell and uses it for its
/// whole lifetime, so concurrent strategy updates never produce a mixed view.
#[derive(Clone)]
pub struct AppState {
    /// The routing engine.
    pub engine: Arc<RoutingEngine>,
    /// The live strategy cell fed by the remote strategy store.
    pub strategy: StrategyCell,
}

impl AppState {
    /// Create the state.
    pub fn new(engine: Arc<RoutingEngine>, strategy: StrategyCell) -> Self {
        Self { engine, strategy }
    }
}

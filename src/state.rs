use std::sync::Arc;

use crate::engine::Engine;
use crate::heartbeat::QueryCounter;
use crate::time_util::AgeCutoffTable;

/// Shared application state for handlers: the data engine, the age-cutoff
/// table computed once at startup from "now", and the request counter the
/// heartbeat task samples.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub ages: Arc<AgeCutoffTable>,
    pub queries: Arc<QueryCounter>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, ages: Arc<AgeCutoffTable>, queries: Arc<QueryCounter>) -> Self {
        Self { engine, ages, queries }
    }
}

//! Application state.

use std::sync::Arc;

use headcount_worker::WorkerRegistry;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<WorkerRegistry>,
}

impl AppState {
    pub fn new(config: ApiConfig, registry: Arc<WorkerRegistry>) -> Self {
        Self { config, registry }
    }
}

//! Application state.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::service::PoolService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The account pool.
    pub service: Arc<PoolService>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(service: Arc<PoolService>, config: ServiceConfig) -> Self {
        Self { service, config }
    }
}

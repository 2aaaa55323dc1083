//! Application state.

use std::sync::Arc;

use actsense_media::ActivityAnalyzer;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub analyzer: Arc<ActivityAnalyzer>,
}

impl AppState {
    pub fn new(config: ApiConfig, analyzer: ActivityAnalyzer) -> Self {
        Self {
            config,
            analyzer: Arc::new(analyzer),
        }
    }
}

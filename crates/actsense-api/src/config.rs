//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size (uploads included)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(120),
            max_body_size: 100 * 1024 * 1024, // 100MB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            request_timeout: std::env::var("REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

//! Axum HTTP API server.
//!
//! This crate provides:
//! - Clip upload and activity analysis endpoints
//! - Canned scenario classification for smoke testing
//! - Health and capability endpoints
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

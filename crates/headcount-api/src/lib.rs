//! Axum HTTP API for the headcount workers.
//!
//! This crate provides:
//! - Start/stop/status endpoints per camera, with MP4 variants
//! - A health endpoint listing active cameras
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

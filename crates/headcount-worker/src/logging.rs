//! Structured per-camera logging.
//!
//! Every line carries the camera id and the operation so logs from many
//! concurrent workers can be filtered apart.

use tracing::{error, info, warn, Span};

/// Camera-scoped logger with consistent lifecycle messages.
#[derive(Debug, Clone)]
pub struct CameraLogger {
    camera_id: String,
    operation: String,
}

impl CameraLogger {
    /// Create a logger for one camera and operation (e.g. "frame_loop").
    pub fn new(camera_id: &str, operation: &str) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Camera started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Camera progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Camera warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Camera error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Camera stopped: {}", message
        );
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument a spawned task with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "camera",
            camera_id = %self.camera_id,
            operation = %self.operation
        )
    }
}

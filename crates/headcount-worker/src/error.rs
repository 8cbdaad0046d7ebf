//! Worker error types.

use std::path::PathBuf;

use headcount_models::{ModelError, WorkerState};
use thiserror::Error;

/// Why a `start` request was refused.
#[derive(Debug, Error)]
pub enum StartError {
    /// Rejected before any resource was opened.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source could not be opened; the worker is now `Failed`.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The worker already ran to a terminal state and cannot be reused.
    #[error("Worker already finished ({0})")]
    Finished(WorkerState),
}

impl StartError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }
}

impl From<ModelError> for StartError {
    fn from(err: ModelError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Opening or reading a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Failed to open source: {0}")]
    OpenFailed(String),

    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl SourceError {
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }
}

/// A single detector call failed; the frame is skipped.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detector request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid detector response: {0}")]
    InvalidResponse(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

impl DetectionError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Timeouts and connection failures are worth logging differently
    /// from a detector that answered with garbage.
    pub fn is_transient(&self) -> bool {
        match self {
            DetectionError::Network(e) => e.is_timeout() || e.is_connect(),
            DetectionError::RequestFailed(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
#[error("Tracking failed: {0}")]
pub struct TrackingError(pub String);

/// Annotated output writer failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("Failed to open output: {0}")]
    OpenFailed(String),

    #[error("Failed to write frame: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One webhook delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery timed out")]
    Timeout,

    #[error("Delivery failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid HMAC key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

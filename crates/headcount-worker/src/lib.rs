//! Per-camera people counting.
//!
//! A [`CameraWorker`] reads frames from a source, runs person detection and
//! optional tracking, counts line crossings and zone transitions, and pushes
//! HMAC-signed events to a webhook. The [`WorkerRegistry`] keeps at most one
//! live worker per camera id.
//!
//! Decoding, detection, tracking and annotated output are capabilities
//! (see [`capability`]); the crate ships FFmpeg, HTTP detector and IoU
//! tracker implementations.

pub mod annotate;
pub mod capability;
pub mod config;
pub mod counting;
pub mod delivery;
pub mod detector_client;
pub mod emitter;
pub mod error;
pub mod failure;
pub mod ffmpeg;
pub mod frame;
pub mod frame_loop;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod signing;
pub mod stats;
pub mod tracker;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use capability::{
    Capabilities, DetectionSettings, Detector, FrameSink, FrameSource, SinkFactory, SourceInfo,
    SourceOpener, Tracker, TrackerFactory,
};
pub use config::WorkerConfig;
pub use counting::{CountingConfig, CountingEngine, Direction, FrameOutcome};
pub use delivery::{Delivery, HttpDelivery};
pub use detector_client::{DetectorClientConfig, RemoteDetector};
pub use emitter::EventEmitter;
pub use error::{
    DeliveryError, DetectionError, SigningError, SinkError, SourceError, StartError,
    TrackingError,
};
pub use ffmpeg::{FfmpegSinkFactory, FfmpegSourceOpener};
pub use frame::Frame;
pub use frame_loop::ExitReason;
pub use logging::CameraLogger;
pub use registry::WorkerRegistry;
pub use tracker::{IouTracker, IouTrackerConfig, IouTrackerFactory};
pub use worker::{CameraWorker, StartOutcome, StopOutcome};

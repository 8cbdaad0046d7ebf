//! Capabilities a worker consumes: decoding, detection, tracking, output.
//!
//! The worker core only talks to these traits. Production adapters live in
//! [`crate::ffmpeg`], [`crate::detector_client`] and [`crate::tracker`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use headcount_models::{Detection, DetectionParams, SourceDescriptor, TrackedObject};
use image::RgbImage;

use crate::config::WorkerConfig;
use crate::delivery::Delivery;
use crate::error::{DetectionError, SinkError, SourceError, TrackingError};
use crate::frame::Frame;

/// Stream properties known once a source is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Opens frame sources from a descriptor.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// An open, ordered sequence of frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Release the capture handle. Safe to call more than once.
    async fn close(&mut self);

    fn info(&self) -> SourceInfo;
}

/// Detector parameters after per-start overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub conf: f32,
    pub imgsz: u32,
    pub model: String,
    pub class_id: u32,
}

impl DetectionSettings {
    pub fn resolve(params: &DetectionParams, config: &WorkerConfig) -> Self {
        Self {
            conf: params.conf.unwrap_or(config.default_confidence),
            imgsz: params.imgsz.unwrap_or(config.default_imgsz),
            model: params
                .model
                .clone()
                .unwrap_or_else(|| config.default_model.clone()),
            class_id: config.person_class_id,
        }
    }

    /// Whether a detection passes the class and confidence filter.
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.class_id == self.class_id && detection.confidence >= self.conf
    }
}

/// Object detector; opaque to the worker.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        frame: &Frame,
        settings: &DetectionSettings,
    ) -> Result<Vec<Detection>, DetectionError>;

    fn name(&self) -> &'static str;
}

/// Multi-object tracker holding identity state for one run.
pub trait Tracker: Send {
    fn update(
        &mut self,
        detections: &[Detection],
        frame: &Frame,
    ) -> Result<Vec<TrackedObject>, TrackingError>;
}

/// Creates a fresh tracker per run.
pub trait TrackerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Tracker>;
}

/// Annotated output writer for one run.
#[async_trait]
pub trait FrameSink: Send {
    async fn write(&mut self, image: &RgbImage) -> Result<(), SinkError>;

    /// Flush and close. Safe to call more than once.
    async fn finish(&mut self) -> Result<(), SinkError>;
}

#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn create(&self, path: &Path, info: SourceInfo) -> Result<Box<dyn FrameSink>, SinkError>;
}

/// Everything a worker needs from the outside world.
#[derive(Clone)]
pub struct Capabilities {
    pub sources: Arc<dyn SourceOpener>,
    pub detector: Arc<dyn Detector>,
    /// `None` runs the counting engine in detection-only mode.
    pub tracker: Option<Arc<dyn TrackerFactory>>,
    /// `None` disables annotated output regardless of configuration.
    pub sink: Option<Arc<dyn SinkFactory>>,
    pub delivery: Arc<dyn Delivery>,
}

impl Capabilities {
    pub fn new(
        sources: Arc<dyn SourceOpener>,
        detector: Arc<dyn Detector>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            sources,
            detector,
            tracker: None,
            sink: None,
            delivery,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TrackerFactory>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SinkFactory>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("detector", &self.detector.name())
            .field("tracker", &self.tracker.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

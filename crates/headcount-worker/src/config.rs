//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use headcount_models::PERSON_CLASS_ID;

/// Defaults shared by every camera worker in a process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between `people-stats` events
    pub stats_interval: Duration,
    /// Upper bound for one webhook delivery attempt
    pub delivery_timeout: Duration,
    /// Frames read but not processed at the start of every run
    pub warmup_frames: u64,
    /// Process every Nth frame when the start request does not say
    pub default_frame_skip: u32,
    /// Detector confidence threshold when the start request does not say
    pub default_confidence: f32,
    /// Inference image size when the start request does not say
    pub default_imgsz: u32,
    /// Model name when the start request does not say
    pub default_model: String,
    /// Detector class kept by the worker
    pub person_class_id: u32,
    /// Frames a track may be absent before its counting state is dropped
    pub stale_track_frames: u64,
    /// Log progress every N frames read
    pub progress_log_interval: u64,
    /// Directory for annotated output; `None` disables the writer
    pub output_dir: Option<PathBuf>,
    /// Emit `enter`/`exit` events for crossings and zone transitions
    pub emit_crossing_events: bool,
    /// Consecutive detection failures logged before suppression
    pub detection_failure_log_limit: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            delivery_timeout: Duration::from_millis(1500),
            warmup_frames: 4,
            default_frame_skip: 1,
            default_confidence: 0.35,
            default_imgsz: 640,
            default_model: "yolov8n.pt".to_string(),
            person_class_id: PERSON_CLASS_ID,
            stale_track_frames: 30,
            progress_log_interval: 30,
            output_dir: None,
            emit_crossing_events: true,
            detection_failure_log_limit: 5,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stats_interval: Duration::from_millis(
                std::env::var("HEADCOUNT_STATS_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            delivery_timeout: Duration::from_millis(
                std::env::var("HEADCOUNT_DELIVERY_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1500),
            ),
            warmup_frames: std::env::var("HEADCOUNT_WARMUP_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.warmup_frames),
            default_frame_skip: std::env::var("HEADCOUNT_FRAME_SKIP")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.default_frame_skip),
            default_confidence: std::env::var("HEADCOUNT_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_confidence),
            default_imgsz: std::env::var("HEADCOUNT_IMGSZ")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_imgsz),
            default_model: std::env::var("HEADCOUNT_MODEL").unwrap_or(defaults.default_model),
            person_class_id: std::env::var("HEADCOUNT_PERSON_CLASS_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.person_class_id),
            stale_track_frames: std::env::var("HEADCOUNT_STALE_TRACK_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stale_track_frames),
            progress_log_interval: std::env::var("HEADCOUNT_PROGRESS_LOG_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.progress_log_interval),
            output_dir: std::env::var("HEADCOUNT_OUTPUT_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            emit_crossing_events: std::env::var("HEADCOUNT_EMIT_CROSSING_EVENTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.emit_crossing_events),
            detection_failure_log_limit: std::env::var("HEADCOUNT_DETECTION_FAILURE_LOG_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.detection_failure_log_limit),
        }
    }
}

//! Worker metrics.
//!
//! Recorded through the `metrics` facade; the binary decides which exporter
//! is installed.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_READ_TOTAL: &str = "headcount_frames_read_total";
    pub const FRAMES_PROCESSED_TOTAL: &str = "headcount_frames_processed_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "headcount_detection_failures_total";
    pub const DETECTION_DURATION_SECONDS: &str = "headcount_detection_duration_seconds";
    pub const CROSSINGS_TOTAL: &str = "headcount_crossings_total";
    pub const ZONE_TRANSITIONS_TOTAL: &str = "headcount_zone_transitions_total";
    pub const EVENTS_DELIVERED_TOTAL: &str = "headcount_events_delivered_total";
    pub const EVENTS_FAILED_TOTAL: &str = "headcount_events_failed_total";
    pub const DELIVERY_DURATION_SECONDS: &str = "headcount_delivery_duration_seconds";
    pub const ACTIVE_WORKERS: &str = "headcount_active_workers";
    pub const WORKER_STARTS_TOTAL: &str = "headcount_worker_starts_total";
}

pub fn record_frame_read(camera_id: &str) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::FRAMES_READ_TOTAL, &labels).increment(1);
}

pub fn record_frame_processed(camera_id: &str, detection_secs: f64) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::DETECTION_DURATION_SECONDS, &labels).record(detection_secs);
}

pub fn record_detection_failure(camera_id: &str) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::DETECTION_FAILURES_TOTAL, &labels).increment(1);
}

/// `direction` is "in" or "out".
pub fn record_crossing(camera_id: &str, direction: &str) {
    let labels = [
        ("camera", camera_id.to_string()),
        ("direction", direction.to_string()),
    ];
    counter!(names::CROSSINGS_TOTAL, &labels).increment(1);
}

pub fn record_zone_transition(camera_id: &str, kind: &str) {
    let labels = [
        ("camera", camera_id.to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::ZONE_TRANSITIONS_TOTAL, &labels).increment(1);
}

pub fn record_event_delivered(event_type: &str, duration_secs: f64) {
    let labels = [("type", event_type.to_string())];
    counter!(names::EVENTS_DELIVERED_TOTAL, &labels).increment(1);
    histogram!(names::DELIVERY_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_event_failed(event_type: &str, reason: &str) {
    let labels = [
        ("type", event_type.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::EVENTS_FAILED_TOTAL, &labels).increment(1);
}

/// `outcome` is "started", "already_running", "invalid", "failed" or "cancelled".
pub fn record_worker_start(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::WORKER_STARTS_TOTAL, &labels).increment(1);
}

pub fn set_active_workers(count: usize) {
    gauge!(names::ACTIVE_WORKERS).set(count as f64);
}

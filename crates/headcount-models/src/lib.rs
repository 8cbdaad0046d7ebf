//! Shared data models for the headcount analytics service.
//!
//! This crate provides Serde-serializable types for:
//! - Frame geometry (points, boxes, counting lines, zones)
//! - Detections and tracked objects
//! - Stats snapshots and webhook events
//! - Worker lifecycle state
//! - The validated start request for a camera worker

pub mod detection;
pub mod error;
pub mod event;
pub mod geometry;
pub mod spec;
pub mod stats;
pub mod worker_state;

// Re-export common types
pub use detection::{Detection, TrackedObject, PERSON_CLASS_ID};
pub use error::{ModelError, ModelResult};
pub use event::{CrossingData, CrossingSource, ErrorData, Event, EventKind, SignedEvent};
pub use geometry::{BoundingBox, Line, LineSide, Point, Side, Zone};
pub use spec::{DetectionParams, SourceDescriptor, StartRequest, WorkerSpec};
pub use stats::StatsSnapshot;
pub use worker_state::WorkerState;

//! Detector and tracker outputs.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// COCO class id for "person".
pub const PERSON_CLASS_ID: u32 = 0;

/// A single detector hit for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    #[serde(default)]
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            label: String::new(),
            confidence,
        }
    }

    /// Create a person detection.
    pub fn person(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            class_id: PERSON_CLASS_ID,
            label: "person".to_string(),
            confidence,
        }
    }

    pub fn centroid(&self) -> Point {
        self.bbox.centroid()
    }
}

/// A detection with a stable identity assigned by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub track_id: u64,
    pub detection: Detection,
    /// Recent centroids, oldest first; the last entry is the current one.
    #[serde(default)]
    pub history: Vec<Point>,
}

impl TrackedObject {
    pub fn new(track_id: u64, detection: Detection) -> Self {
        let history = vec![detection.centroid()];
        Self {
            track_id,
            detection,
            history,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.detection.bbox
    }

    pub fn centroid(&self) -> Point {
        self.detection.centroid()
    }
}

//! Greedy IoU association tracker.
//!
//! Each frame, all (track, detection) pairs are scored by IoU and matched
//! best-first. Unmatched detections open new tracks; unmatched tracks age
//! and are dropped after `max_missing` frames.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use headcount_models::{BoundingBox, Detection, Point, TrackedObject};

use crate::capability::{Tracker, TrackerFactory};
use crate::error::TrackingError;
use crate::frame::Frame;

#[derive(Debug, Clone)]
pub struct IouTrackerConfig {
    pub iou_threshold: f64,
    /// Frames a track survives without a matching detection.
    pub max_missing: u32,
    /// Centroids kept per track.
    pub history_len: usize,
}

impl Default for IouTrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_missing: 10,
            history_len: 16,
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    detection: Detection,
    history: Vec<Point>,
    missing: u32,
}

impl Track {
    fn push_centroid(&mut self, limit: usize) {
        self.history.push(self.detection.centroid());
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

#[derive(Debug)]
pub struct IouTracker {
    config: IouTrackerConfig,
    tracks: HashMap<u64, Track>,
    next_id: u64,
}

impl IouTracker {
    pub fn new(config: IouTrackerConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            next_id: 1,
        }
    }

    /// Ids handed out so far.
    pub fn total_unique(&self) -> u64 {
        self.next_id - 1
    }

    fn associate(&mut self, detections: &[Detection]) -> Vec<u64> {
        let mut pairs: Vec<(f64, u64, usize)> = Vec::new();
        for (track_id, track) in &self.tracks {
            for (idx, det) in detections.iter().enumerate() {
                let iou = track.detection.bbox.iou(&det.bbox);
                if iou >= self.config.iou_threshold {
                    pairs.push((iou, *track_id, idx));
                }
            }
        }
        // Best IoU first; ties broken by id for stable output.
        pairs.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let mut matched_tracks: HashSet<u64> = HashSet::new();
        let mut assigned: Vec<Option<u64>> = vec![None; detections.len()];
        for (_, track_id, idx) in pairs {
            if matched_tracks.contains(&track_id) || assigned[idx].is_some() {
                continue;
            }
            matched_tracks.insert(track_id);
            assigned[idx] = Some(track_id);
        }

        for (track_id, track) in self.tracks.iter_mut() {
            if !matched_tracks.contains(track_id) {
                track.missing += 1;
            }
        }
        let max_missing = self.config.max_missing;
        self.tracks.retain(|_, t| t.missing <= max_missing);

        let mut ids = Vec::with_capacity(detections.len());
        for (idx, det) in detections.iter().enumerate() {
            let id = match assigned[idx] {
                Some(id) => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.detection = det.clone();
                        track.missing = 0;
                        track.push_centroid(self.config.history_len);
                    }
                    id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(
                        id,
                        Track {
                            detection: det.clone(),
                            history: vec![det.centroid()],
                            missing: 0,
                        },
                    );
                    id
                }
            };
            ids.push(id);
        }
        ids
    }
}

impl Tracker for IouTracker {
    fn update(
        &mut self,
        detections: &[Detection],
        _frame: &Frame,
    ) -> Result<Vec<TrackedObject>, TrackingError> {
        let ids = self.associate(detections);
        let mut visible: Vec<TrackedObject> = ids
            .into_iter()
            .filter_map(|id| {
                self.tracks.get(&id).map(|t| TrackedObject {
                    track_id: id,
                    detection: t.detection.clone(),
                    history: t.history.clone(),
                })
            })
            .collect();
        visible.sort_by_key(|t| t.track_id);
        Ok(visible)
    }
}

/// Hands a fresh [`IouTracker`] to every run.
#[derive(Debug, Clone, Default)]
pub struct IouTrackerFactory {
    config: IouTrackerConfig,
}

impl IouTrackerFactory {
    pub fn new(config: IouTrackerConfig) -> Self {
        Self { config }
    }
}

impl TrackerFactory for IouTrackerFactory {
    fn create(&self) -> Box<dyn Tracker> {
        Box::new(IouTracker::new(self.config.clone()))
    }
}

/// Convenience for building boxes in tracker tests and fakes.
pub fn bbox_around(center: Point, width: f64, height: f64) -> BoundingBox {
    BoundingBox::new(
        center.x - width / 2.0,
        center.y - height / 2.0,
        center.x + width / 2.0,
        center.y + height / 2.0,
    )
}

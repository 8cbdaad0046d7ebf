//! Line crossing and zone occupancy counting.
//!
//! The engine is fed once per processed frame, either with identity-tagged
//! tracks or, when no tracker is configured, with bare detections.
//!
//! With tracks, each id remembers the last side of the counting line its
//! centroid was seen on and whether it was inside each zone. A count is
//! produced only when the remembered value flips, and the remembered value is
//! updated in the same step, so a track sitting on the boundary cannot count
//! twice without crossing back first.
//!
//! Direction: a move from [`Side::Left`] to [`Side::Right`] is "out", the
//! reverse is "in". `invert_direction` swaps the two.

use std::collections::HashMap;

use headcount_models::{Detection, Line, LineSide, Side, StatsSnapshot, TrackedObject, Zone};

#[derive(Debug, Clone, Default)]
pub struct CountingConfig {
    pub line: Option<Line>,
    pub zones: Vec<Zone>,
    pub invert_direction: bool,
    /// Processed frames a track may be absent before its state is dropped.
    pub stale_after_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// A counted line crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub track_id: u64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneTransitionKind {
    Enter,
    Exit,
}

impl ZoneTransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneTransitionKind::Enter => "enter",
            ZoneTransitionKind::Exit => "exit",
        }
    }
}

/// A track entering or leaving one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTransition {
    pub track_id: u64,
    /// Index into the configured zones.
    pub zone: usize,
    pub kind: ZoneTransitionKind,
}

/// What changed in one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub crossings: Vec<Crossing>,
    pub zone_transitions: Vec<ZoneTransition>,
}

impl FrameOutcome {
    pub fn is_empty(&self) -> bool {
        self.crossings.is_empty() && self.zone_transitions.is_empty()
    }
}

/// Per-track memory needed for debouncing.
#[derive(Debug, Clone)]
struct TrackSideState {
    side: LineSide,
    in_zone: Vec<bool>,
    last_seen: u64,
}

impl TrackSideState {
    fn new(zone_count: usize, frame: u64) -> Self {
        Self {
            side: LineSide::Unknown,
            in_zone: vec![false; zone_count],
            last_seen: frame,
        }
    }
}

#[derive(Debug)]
pub struct CountingEngine {
    config: CountingConfig,
    tracks: HashMap<u64, TrackSideState>,
    count_in: u64,
    count_out: u64,
    /// Occupancy when it is not derived from the line counters.
    visible: u64,
    current_detected: u64,
    peak_detected: u64,
    zone_occupancy: Vec<u64>,
    /// Number of observe calls so far; the clock for stale-state GC.
    frames_observed: u64,
    /// Whether the last frame carried track identities.
    identity: bool,
}

impl CountingEngine {
    pub fn new(config: CountingConfig) -> Self {
        let zone_count = config.zones.len();
        Self {
            config,
            tracks: HashMap::new(),
            count_in: 0,
            count_out: 0,
            visible: 0,
            current_detected: 0,
            peak_detected: 0,
            zone_occupancy: vec![0; zone_count],
            frames_observed: 0,
            identity: false,
        }
    }

    /// Detection-only mode: no identity, so no crossings or transitions.
    pub fn observe_detections(&mut self, detections: &[Detection]) -> FrameOutcome {
        self.frames_observed += 1;
        self.identity = false;
        self.record_detected(detections.len() as u64);
        self.visible = detections.len() as u64;

        for (idx, zone) in self.config.zones.iter().enumerate() {
            self.zone_occupancy[idx] = detections
                .iter()
                .filter(|d| zone.contains(d.centroid()))
                .count() as u64;
        }

        FrameOutcome::default()
    }

    /// Identity mode: debounced line crossings and zone transitions.
    pub fn observe_tracks(&mut self, tracks: &[TrackedObject]) -> FrameOutcome {
        self.frames_observed += 1;
        self.identity = true;
        let frame = self.frames_observed;
        let zone_count = self.config.zones.len();
        let mut outcome = FrameOutcome::default();

        self.record_detected(tracks.len() as u64);
        self.visible = tracks.len() as u64;
        self.zone_occupancy.iter_mut().for_each(|n| *n = 0);

        for track in tracks {
            let centroid = track.centroid();
            let state = self
                .tracks
                .entry(track.track_id)
                .or_insert_with(|| TrackSideState::new(zone_count, frame));
            state.last_seen = frame;

            if let Some(line) = &self.config.line {
                if let Some(side) = line.side_of(centroid) {
                    if let Some(direction) =
                        transition(state.side, side, self.config.invert_direction)
                    {
                        match direction {
                            Direction::In => self.count_in += 1,
                            Direction::Out => self.count_out += 1,
                        }
                        outcome.crossings.push(Crossing {
                            track_id: track.track_id,
                            direction,
                        });
                    }
                    state.side = side.into();
                }
            }

            for (idx, zone) in self.config.zones.iter().enumerate() {
                let inside = zone.contains(centroid);
                if inside != state.in_zone[idx] {
                    outcome.zone_transitions.push(ZoneTransition {
                        track_id: track.track_id,
                        zone: idx,
                        kind: if inside {
                            ZoneTransitionKind::Enter
                        } else {
                            ZoneTransitionKind::Exit
                        },
                    });
                    state.in_zone[idx] = inside;
                }
                if inside {
                    self.zone_occupancy[idx] += 1;
                }
            }
        }

        self.evict_stale(frame, &mut outcome);
        outcome
    }

    fn record_detected(&mut self, n: u64) {
        self.current_detected = n;
        self.peak_detected = self.peak_detected.max(n);
    }

    /// Drop tracks unseen for too long. A track evicted while inside a zone
    /// exits it, so zone enters and exits stay paired.
    fn evict_stale(&mut self, frame: u64, outcome: &mut FrameOutcome) {
        let max_age = self.config.stale_after_frames;
        let mut stale: Vec<u64> = self
            .tracks
            .iter()
            .filter(|(_, state)| frame.saturating_sub(state.last_seen) > max_age)
            .map(|(id, _)| *id)
            .collect();
        stale.sort_unstable();

        for track_id in stale {
            let Some(state) = self.tracks.remove(&track_id) else {
                continue;
            };
            for (zone, _) in state.in_zone.iter().enumerate().filter(|(_, inside)| **inside) {
                outcome.zone_transitions.push(ZoneTransition {
                    track_id,
                    zone,
                    kind: ZoneTransitionKind::Exit,
                });
            }
        }
    }

    pub fn count_in(&self) -> u64 {
        self.count_in
    }

    pub fn count_out(&self) -> u64 {
        self.count_out
    }

    /// `max(0, in - out)` with a line and identity, otherwise what is
    /// visible right now.
    pub fn occupancy(&self) -> u64 {
        if self.identity && self.config.line.is_some() {
            self.count_in.saturating_sub(self.count_out)
        } else {
            self.visible
        }
    }

    /// Number of tracks with live counting state.
    pub fn tracked_ids(&self) -> usize {
        self.tracks.len()
    }

    pub fn snapshot(&self, frame_count: u64, total_frames_processed: u64) -> StatsSnapshot {
        StatsSnapshot {
            count_in: self.count_in,
            count_out: self.count_out,
            occupancy: self.occupancy(),
            total_detected: self.peak_detected,
            current_detected: self.current_detected,
            frame_count,
            total_frames_processed,
            zone_occupancy: self.zone_occupancy.clone(),
        }
    }
}

/// Counted direction for a side change, `None` when nothing is counted.
fn transition(previous: LineSide, current: Side, invert: bool) -> Option<Direction> {
    let direction = match (previous, current) {
        (LineSide::Left, Side::Right) => Direction::Out,
        (LineSide::Right, Side::Left) => Direction::In,
        _ => return None,
    };
    Some(match (direction, invert) {
        (d, false) => d,
        (Direction::In, true) => Direction::Out,
        (Direction::Out, true) => Direction::In,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use headcount_models::{BoundingBox, Point};

    /// Horizontal line at y = 100 from x = 0 to x = 200. With image
    /// coordinates a centroid below the line (y > 100) is on the left.
    fn line() -> Line {
        Line::new(Point::new(0.0, 100.0), Point::new(200.0, 100.0)).unwrap()
    }

    fn track_at(id: u64, x: f64, y: f64) -> TrackedObject {
        let bbox = BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0);
        TrackedObject::new(id, Detection::person(bbox, 0.9))
    }

    fn left(id: u64) -> TrackedObject {
        track_at(id, 50.0, 150.0)
    }

    fn right(id: u64) -> TrackedObject {
        track_at(id, 50.0, 50.0)
    }

    fn engine_with_line() -> CountingEngine {
        CountingEngine::new(CountingConfig {
            line: Some(line()),
            stale_after_frames: 30,
            ..Default::default()
        })
    }

    #[test]
    fn test_side_convention_used_by_fixtures() {
        assert_eq!(line().side_of(left(1).centroid()), Some(Side::Left));
        assert_eq!(line().side_of(right(1).centroid()), Some(Side::Right));
    }

    #[test]
    fn test_first_sighting_then_crossing_counts_once() {
        let mut engine = engine_with_line();

        let first = engine.observe_tracks(&[left(1)]);
        assert!(first.is_empty());

        let second = engine.observe_tracks(&[right(1)]);
        assert_eq!(
            second.crossings,
            vec![Crossing {
                track_id: 1,
                direction: Direction::Out
            }]
        );
        assert_eq!(engine.count_out(), 1);
        assert_eq!(engine.count_in(), 0);
    }

    #[test]
    fn test_oscillation_counts_every_crossing() {
        let mut engine = engine_with_line();
        engine.observe_tracks(&[left(7)]);
        engine.observe_tracks(&[right(7)]);
        engine.observe_tracks(&[left(7)]);
        engine.observe_tracks(&[right(7)]);

        assert_eq!(engine.count_out(), 2);
        assert_eq!(engine.count_in(), 1);
    }

    #[test]
    fn test_staying_on_one_side_is_debounced() {
        let mut engine = engine_with_line();
        engine.observe_tracks(&[left(1)]);
        engine.observe_tracks(&[right(1)]);
        for _ in 0..10 {
            assert!(engine.observe_tracks(&[right(1)]).crossings.is_empty());
        }
        assert_eq!(engine.count_out(), 1);
    }

    #[test]
    fn test_centroid_on_line_keeps_previous_side() {
        let mut engine = engine_with_line();
        engine.observe_tracks(&[left(1)]);
        engine.observe_tracks(&[track_at(1, 50.0, 100.0)]);
        engine.observe_tracks(&[left(1)]);
        assert_eq!(engine.count_in() + engine.count_out(), 0);

        engine.observe_tracks(&[track_at(1, 50.0, 100.0)]);
        engine.observe_tracks(&[right(1)]);
        assert_eq!(engine.count_out(), 1);
    }

    #[test]
    fn test_invert_direction() {
        let mut engine = CountingEngine::new(CountingConfig {
            line: Some(line()),
            invert_direction: true,
            stale_after_frames: 30,
            ..Default::default()
        });
        engine.observe_tracks(&[left(1)]);
        engine.observe_tracks(&[right(1)]);
        assert_eq!(engine.count_in(), 1);
        assert_eq!(engine.count_out(), 0);
    }

    #[test]
    fn test_counts_match_side_changes() {
        // Deterministic pseudo-random walks for a handful of tracks.
        let mut engine = engine_with_line();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut last: HashMap<u64, Side> = HashMap::new();
        let mut expected_changes = 0u64;

        for _ in 0..500 {
            let mut frame = Vec::new();
            for id in 0..4u64 {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let side = if seed % 2 == 0 { Side::Left } else { Side::Right };
                if let Some(prev) = last.insert(id, side) {
                    if prev != side {
                        expected_changes += 1;
                    }
                }
                frame.push(match side {
                    Side::Left => left(id),
                    Side::Right => right(id),
                });
            }

            let before = engine.count_in() + engine.count_out();
            let outcome = engine.observe_tracks(&frame);
            let after = engine.count_in() + engine.count_out();
            assert_eq!(after - before, outcome.crossings.len() as u64);
            assert!(engine.occupancy() <= engine.count_in());
        }

        assert_eq!(engine.count_in() + engine.count_out(), expected_changes);
        assert_eq!(
            engine.occupancy(),
            engine.count_in().saturating_sub(engine.count_out())
        );
    }

    #[test]
    fn test_occupancy_never_negative() {
        let mut engine = engine_with_line();
        engine.observe_tracks(&[left(1)]);
        engine.observe_tracks(&[right(1)]);
        assert_eq!(engine.count_out(), 1);
        assert_eq!(engine.occupancy(), 0);
    }

    #[test]
    fn test_detection_only_mode() {
        let mut engine = engine_with_line();
        for _ in 0..100 {
            let outcome = engine.observe_detections(&[]);
            assert!(outcome.is_empty());
        }
        let snapshot = engine.snapshot(100, 100);
        assert_eq!(snapshot.occupancy, 0);
        assert_eq!(snapshot.count_in, 0);
        assert_eq!(snapshot.count_out, 0);

        let dets: Vec<Detection> = (0..3)
            .map(|i| Detection::person(BoundingBox::new(i as f64, 0.0, i as f64 + 1.0, 1.0), 0.8))
            .collect();
        engine.observe_detections(&dets);
        assert_eq!(engine.occupancy(), 3);
    }

    #[test]
    fn test_identity_without_line_counts_visible_tracks() {
        let mut engine = CountingEngine::new(CountingConfig {
            stale_after_frames: 30,
            ..Default::default()
        });
        engine.observe_tracks(&[left(1), right(2)]);
        assert_eq!(engine.occupancy(), 2);
        engine.observe_tracks(&[left(1)]);
        assert_eq!(engine.occupancy(), 1);
    }

    #[test]
    fn test_peak_and_current_detected() {
        let mut engine = engine_with_line();
        engine.observe_tracks(&[left(1), left(2), left(3)]);
        engine.observe_tracks(&[left(1)]);
        let snapshot = engine.snapshot(10, 2);
        assert_eq!(snapshot.total_detected, 3);
        assert_eq!(snapshot.current_detected, 1);
        assert_eq!(snapshot.frame_count, 10);
        assert_eq!(snapshot.total_frames_processed, 2);
    }

    #[test]
    fn test_zone_enter_exit_and_occupancy() {
        let zone = Zone::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap();
        let mut engine = CountingEngine::new(CountingConfig {
            zones: vec![zone],
            stale_after_frames: 30,
            ..Default::default()
        });

        let outside = track_at(4, 150.0, 150.0);
        let inside = track_at(4, 50.0, 50.0);

        assert!(engine.observe_tracks(&[outside.clone()]).is_empty());

        let outcome = engine.observe_tracks(&[inside.clone()]);
        assert_eq!(
            outcome.zone_transitions,
            vec![ZoneTransition {
                track_id: 4,
                zone: 0,
                kind: ZoneTransitionKind::Enter
            }]
        );
        assert_eq!(engine.snapshot(0, 0).zone_occupancy, vec![1]);

        assert!(engine.observe_tracks(&[inside]).is_empty());

        let outcome = engine.observe_tracks(&[outside]);
        assert_eq!(outcome.zone_transitions[0].kind, ZoneTransitionKind::Exit);
        assert_eq!(engine.snapshot(0, 0).zone_occupancy, vec![0]);
    }

    #[test]
    fn test_evicting_a_track_inside_a_zone_exits_it() {
        let zone = Zone::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap();
        let mut engine = CountingEngine::new(CountingConfig {
            zones: vec![zone],
            stale_after_frames: 2,
            ..Default::default()
        });
        let elsewhere = track_at(9, 150.0, 150.0);

        engine.observe_tracks(&[track_at(3, 50.0, 50.0), elsewhere.clone()]);
        assert!(engine.observe_tracks(&[elsewhere.clone()]).is_empty());
        assert!(engine.observe_tracks(&[elsewhere.clone()]).is_empty());

        let outcome = engine.observe_tracks(&[elsewhere]);
        assert_eq!(
            outcome.zone_transitions,
            vec![ZoneTransition {
                track_id: 3,
                zone: 0,
                kind: ZoneTransitionKind::Exit
            }]
        );
        assert_eq!(engine.tracked_ids(), 1);
    }

    #[test]
    fn test_first_sighting_inside_zone_is_an_enter() {
        let zone = Zone::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap();
        let mut engine = CountingEngine::new(CountingConfig {
            zones: vec![zone],
            stale_after_frames: 30,
            ..Default::default()
        });
        let outcome = engine.observe_tracks(&[track_at(1, 10.0, 10.0)]);
        assert_eq!(outcome.zone_transitions.len(), 1);
        assert_eq!(outcome.zone_transitions[0].kind, ZoneTransitionKind::Enter);
    }

    #[test]
    fn test_stale_tracks_are_evicted() {
        let mut engine = CountingEngine::new(CountingConfig {
            line: Some(line()),
            stale_after_frames: 3,
            ..Default::default()
        });
        engine.observe_tracks(&[left(1), left(2)]);
        assert_eq!(engine.tracked_ids(), 2);

        for _ in 0..3 {
            engine.observe_tracks(&[left(2)]);
        }
        assert_eq!(engine.tracked_ids(), 2);

        engine.observe_tracks(&[left(2)]);
        assert_eq!(engine.tracked_ids(), 1);

        // An evicted id starts over as a first sighting.
        assert!(engine.observe_tracks(&[right(1)]).crossings.is_empty());
        assert_eq!(engine.count_out(), 0);
    }
}

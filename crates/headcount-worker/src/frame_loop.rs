//! The per-camera frame loop.
//!
//! One iteration: check cancellation, read a frame (the only await that
//! cancellation can interrupt), apply warm-up and frame skip, detect, filter,
//! track, count, publish the snapshot and write the annotated frame.
//!
//! Every exit path closes the source and finalises the sink before
//! returning.

use std::sync::Arc;
use std::time::Instant;

use headcount_models::{CrossingData, Detection, EventKind, StatsSnapshot};
use tokio::sync::watch;

use crate::annotate::Annotator;
use crate::capability::{DetectionSettings, Detector, FrameSink, FrameSource, Tracker};
use crate::counting::{CountingEngine, Direction, FrameOutcome, ZoneTransitionKind};
use crate::emitter::EventEmitter;
use crate::failure::FailureTracker;
use crate::frame::Frame;
use crate::logging::CameraLogger;
use crate::metrics;

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    EndOfStream,
    ReadFailure(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub exit: ExitReason,
    pub frames_read: u64,
    pub frames_processed: u64,
    pub last_snapshot: StatsSnapshot,
}

/// Sampling policy applied before detection.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub warmup_frames: u64,
    /// Process every Nth frame; values below 1 are treated as 1.
    pub frame_skip: u64,
}

impl Sampling {
    /// Whether the `n`th frame read (1-based) goes through detection.
    pub fn should_process(&self, n: u64) -> bool {
        n > self.warmup_frames && n % self.frame_skip.max(1) == 0
    }
}

pub struct FrameLoop {
    pub(crate) source: Box<dyn FrameSource>,
    pub(crate) detector: Arc<dyn Detector>,
    pub(crate) settings: DetectionSettings,
    pub(crate) tracker: Option<Box<dyn Tracker>>,
    pub(crate) sink: Option<Box<dyn FrameSink>>,
    pub(crate) annotator: Annotator,
    pub(crate) engine: CountingEngine,
    pub(crate) emitter: EventEmitter,
    pub(crate) snapshots: watch::Sender<StatsSnapshot>,
    pub(crate) sampling: Sampling,
    pub(crate) progress_log_interval: u64,
    pub(crate) emit_crossing_events: bool,
    pub(crate) failures: FailureTracker,
    pub(crate) logger: CameraLogger,
}

impl FrameLoop {
    /// Run until end of stream, read failure or cancellation.
    ///
    /// Cancellation is `true` on `shutdown` or the sender being dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopSummary {
        let mut frames_read = 0u64;
        let mut frames_processed = 0u64;

        let exit = loop {
            if *shutdown.borrow() {
                break ExitReason::Cancelled;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => break ExitReason::Cancelled,
                next = self.source.next_frame() => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break ExitReason::EndOfStream,
                Err(e) => {
                    let message = format!("Failed to read frame: {}", e);
                    self.logger.log_error(&message);
                    self.emitter.emit(EventKind::error(message.clone()));
                    break ExitReason::ReadFailure(message);
                }
            };

            frames_read += 1;
            metrics::record_frame_read(self.emitter.camera_id());
            if frames_read % self.progress_log_interval.max(1) == 0 {
                self.logger.log_progress(&format!(
                    "frame {} read, {} processed, in={} out={} occupancy={}",
                    frames_read,
                    frames_processed,
                    self.engine.count_in(),
                    self.engine.count_out(),
                    self.engine.occupancy()
                ));
            }

            if self.sampling.should_process(frames_read) && self.process(frame).await {
                frames_processed += 1;
            }

            self.snapshots
                .send_replace(self.engine.snapshot(frames_read, frames_processed));
        };

        self.source.close().await;
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.finish().await {
                self.logger
                    .log_warning(&format!("Failed to finalise annotated output: {}", e));
            }
        }

        let last_snapshot = self.engine.snapshot(frames_read, frames_processed);
        self.snapshots.send_replace(last_snapshot.clone());
        self.logger.log_completion(&format!(
            "{:?} after {} frames ({} processed)",
            exit, frames_read, frames_processed
        ));

        LoopSummary {
            exit,
            frames_read,
            frames_processed,
            last_snapshot,
        }
    }

    /// Detect, track and count one frame. Returns `false` when the frame was
    /// dropped because detection or tracking failed.
    async fn process(&mut self, frame: Frame) -> bool {
        let started = Instant::now();
        let detections = match self.detector.detect(&frame, &self.settings).await {
            Ok(detections) => {
                self.failures.record_success();
                detections
            }
            Err(e) => {
                metrics::record_detection_failure(self.emitter.camera_id());
                if self.failures.record_failure() {
                    self.logger.log_warning(&format!(
                        "Detection failed on frame {}: {}",
                        frame.seq, e
                    ));
                }
                return false;
            }
        };
        metrics::record_frame_processed(
            self.emitter.camera_id(),
            started.elapsed().as_secs_f64(),
        );

        let people: Vec<Detection> = detections
            .into_iter()
            .filter(|d| self.settings.accepts(d))
            .collect();

        let (outcome, boxes) = match self.tracker.as_mut() {
            Some(tracker) => match tracker.update(&people, &frame) {
                Ok(tracks) => {
                    let boxes = tracks.iter().map(|t| *t.bbox()).collect::<Vec<_>>();
                    (self.engine.observe_tracks(&tracks), boxes)
                }
                Err(e) => {
                    self.logger
                        .log_warning(&format!("Tracking failed on frame {}: {}", frame.seq, e));
                    return false;
                }
            },
            None => {
                let boxes = people.iter().map(|d| d.bbox).collect::<Vec<_>>();
                (self.engine.observe_detections(&people), boxes)
            }
        };

        self.publish(&outcome);
        self.write_annotated(frame, &boxes).await;
        true
    }

    fn publish(&self, outcome: &FrameOutcome) {
        let camera_id = self.emitter.camera_id();
        for crossing in &outcome.crossings {
            metrics::record_crossing(camera_id, crossing.direction.as_str());
            if self.emit_crossing_events {
                let data = CrossingData::line(crossing.track_id);
                self.emitter.emit(match crossing.direction {
                    Direction::In => EventKind::Enter(data),
                    Direction::Out => EventKind::Exit(data),
                });
            }
        }
        for transition in &outcome.zone_transitions {
            metrics::record_zone_transition(camera_id, transition.kind.as_str());
            if self.emit_crossing_events {
                let data = CrossingData::zone(transition.track_id, transition.zone);
                self.emitter.emit(match transition.kind {
                    ZoneTransitionKind::Enter => EventKind::Enter(data),
                    ZoneTransitionKind::Exit => EventKind::Exit(data),
                });
            }
        }
    }

    async fn write_annotated(&mut self, frame: Frame, boxes: &[headcount_models::BoundingBox]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let seq = frame.seq;
        let Some(mut image) = frame.into_image() else {
            self.logger
                .log_warning(&format!("Frame {} has an unexpected buffer size", seq));
            return;
        };
        self.annotator.draw(&mut image, boxes);
        if let Err(e) = sink.write(&image).await {
            self.logger
                .log_warning(&format!("Dropping annotated output after write failure: {}", e));
            if let Err(e) = sink.finish().await {
                self.logger.log_warning(&format!("Failed to close annotated output: {}", e));
            }
            self.sink = None;
        }
    }
}

//! One camera's lifecycle.
//!
//! `Idle -> Starting -> Running -> Stopping -> Stopped`, or
//! `Starting -> Failed` when the source cannot be opened. A worker runs at
//! most once; `Stopped` and `Failed` are terminal.

use std::path::PathBuf;
use std::sync::Arc;

use headcount_models::{EventKind, StatsSnapshot, WorkerSpec, WorkerState};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::annotate::Annotator;
use crate::capability::{Capabilities, DetectionSettings, FrameSink, SourceInfo};
use crate::config::WorkerConfig;
use crate::counting::{CountingConfig, CountingEngine};
use crate::emitter::EventEmitter;
use crate::error::StartError;
use crate::failure::FailureTracker;
use crate::frame_loop::{ExitReason, FrameLoop, LoopSummary, Sampling};
use crate::logging::CameraLogger;
use crate::metrics;
use crate::stats::StatsAggregator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Tasks belonging to one run.
struct RunHandle {
    shutdown: watch::Sender<bool>,
    frame_task: JoinHandle<LoopSummary>,
    stats_task: JoinHandle<()>,
}

/// Fails the worker if `start` is dropped before the run is installed.
///
/// An opened source or sink is dropped with the future; the ffmpeg adapters
/// kill their child process on drop.
struct StartGuard {
    state: Arc<watch::Sender<WorkerState>>,
    logger: CameraLogger,
    armed: bool,
}

impl StartGuard {
    fn new(state: Arc<watch::Sender<WorkerState>>, logger: CameraLogger) -> Self {
        Self {
            state,
            logger,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(WorkerState::Failed);
            self.logger.log_warning("Start cancelled before the source was running");
            metrics::record_worker_start("cancelled");
        }
    }
}

pub struct CameraWorker {
    camera_id: String,
    capabilities: Capabilities,
    config: WorkerConfig,
    state: Arc<watch::Sender<WorkerState>>,
    /// Serialises start and stop; holds the live run, if any.
    run: Mutex<Option<RunHandle>>,
    logger: CameraLogger,
}

impl CameraWorker {
    pub fn new(camera_id: impl Into<String>, capabilities: Capabilities, config: WorkerConfig) -> Self {
        let camera_id = camera_id.into();
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            logger: CameraLogger::new(&camera_id, "worker"),
            camera_id,
            capabilities,
            config,
            state: Arc::new(state),
            run: Mutex::new(None),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// `true` while starting or running.
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Open the source and start processing.
    ///
    /// Returns once the source is open; frames are processed on a separate
    /// task. Starting an already live worker is a no-op.
    pub async fn start(&self, spec: WorkerSpec) -> Result<StartOutcome, StartError> {
        let mut run = self.run.lock().await;

        match self.state() {
            WorkerState::Starting | WorkerState::Running | WorkerState::Stopping => {
                metrics::record_worker_start("already_running");
                return Ok(StartOutcome::AlreadyRunning);
            }
            state @ (WorkerState::Stopped | WorkerState::Failed) => {
                return Err(StartError::Finished(state));
            }
            WorkerState::Idle => {}
        }

        if spec.camera_id != self.camera_id {
            metrics::record_worker_start("invalid");
            return Err(StartError::invalid_config(format!(
                "Start request for camera {} sent to worker {}",
                spec.camera_id, self.camera_id
            )));
        }
        if let Err(e) = spec.validate() {
            metrics::record_worker_start("invalid");
            return Err(e.into());
        }

        self.set_state(WorkerState::Starting);
        let guard = StartGuard::new(Arc::clone(&self.state), self.logger.clone());
        self.logger.log_start(&format!("Opening {}", spec.source));

        let emitter = EventEmitter::new(
            self.camera_id.clone(),
            spec.webhook.clone(),
            spec.secret.clone(),
            Arc::clone(&self.capabilities.delivery),
            self.config.delivery_timeout,
        );

        let source = match self.capabilities.sources.open(&spec.source).await {
            Ok(source) => source,
            Err(e) => {
                let message = format!("Failed to open {}: {}", spec.source, e);
                self.logger.log_error(&message);
                emitter.emit(EventKind::error(message.clone()));
                self.set_state(WorkerState::Failed);
                guard.disarm();
                metrics::record_worker_start("failed");
                return Err(StartError::source_unavailable(message));
            }
        };

        let info = source.info();
        let sink = self.open_sink(&spec, info).await;
        let (snapshots_tx, snapshots_rx) = watch::channel(StatsSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let frame_loop = FrameLoop {
            detector: Arc::clone(&self.capabilities.detector),
            settings: DetectionSettings::resolve(&spec.detection, &self.config),
            tracker: self.capabilities.tracker.as_ref().map(|f| f.create()),
            sink,
            annotator: Annotator::new(spec.line, spec.zones.clone()),
            engine: CountingEngine::new(CountingConfig {
                line: spec.line,
                zones: spec.zones.clone(),
                invert_direction: spec.invert_direction,
                stale_after_frames: self.config.stale_track_frames,
            }),
            emitter: emitter.clone(),
            snapshots: snapshots_tx,
            sampling: Sampling {
                warmup_frames: self.config.warmup_frames,
                frame_skip: u64::from(spec.frame_skip.unwrap_or(self.config.default_frame_skip)),
            },
            progress_log_interval: self.config.progress_log_interval,
            emit_crossing_events: self.config.emit_crossing_events,
            failures: FailureTracker::new(self.config.detection_failure_log_limit),
            logger: CameraLogger::new(&self.camera_id, "frame_loop"),
            source,
        };

        let stats_task =
            StatsAggregator::new(emitter, self.config.stats_interval, snapshots_rx).spawn();

        self.set_state(WorkerState::Running);
        guard.disarm();
        let state = Arc::clone(&self.state);
        let frame_task = tokio::spawn(async move {
            let summary = frame_loop.run(shutdown_rx).await;
            // Natural ends drive the worker to Stopped; cancellation is
            // finished by `stop`.
            match summary.exit {
                ExitReason::EndOfStream => {
                    state.send_replace(WorkerState::Stopped);
                }
                ExitReason::ReadFailure(_) => {
                    state.send_replace(WorkerState::Stopping);
                    state.send_replace(WorkerState::Stopped);
                }
                ExitReason::Cancelled => {}
            }
            summary
        });

        *run = Some(RunHandle {
            shutdown: shutdown_tx,
            frame_task,
            stats_task,
        });

        metrics::record_worker_start("started");
        self.logger.log_progress("Running");
        Ok(StartOutcome::Started)
    }

    /// Cancel the run and wait until the source and sink are released.
    ///
    /// Safe to call any number of times.
    pub async fn stop(&self) -> StopOutcome {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return StopOutcome::NotRunning;
        };

        let live = self.is_running();
        if live {
            self.set_state(WorkerState::Stopping);
        }

        let _ = handle.shutdown.send(true);
        match handle.frame_task.await {
            Ok(summary) => self.logger.log_completion(&format!(
                "{} frames read, {} processed, in={} out={}",
                summary.frames_read,
                summary.frames_processed,
                summary.last_snapshot.count_in,
                summary.last_snapshot.count_out
            )),
            Err(e) => self.logger.log_error(&format!("Frame loop task failed: {}", e)),
        }
        if let Err(e) = handle.stats_task.await {
            self.logger.log_error(&format!("Stats task failed: {}", e));
        }

        if live {
            self.set_state(WorkerState::Stopped);
            StopOutcome::Stopped
        } else {
            // The loop had already ended on its own.
            if !self.state().is_terminal() {
                self.set_state(WorkerState::Stopped);
            }
            StopOutcome::NotRunning
        }
    }

    fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(camera_id = %self.camera_id, "{} -> {}", previous, state);
        }
    }

    fn output_path(&self, spec: &WorkerSpec) -> Option<PathBuf> {
        let dir = self.config.output_dir.as_ref()?;
        let base = spec
            .source
            .file_stem()
            .unwrap_or_else(|| self.camera_id.clone());
        Some(dir.join(format!("{}_with_boxes.mp4", base)))
    }

    async fn open_sink(
        &self,
        spec: &WorkerSpec,
        info: SourceInfo,
    ) -> Option<Box<dyn FrameSink>> {
        let factory = self.capabilities.sink.as_ref()?;
        let path = self.output_path(spec)?;
        match factory.create(&path, info).await {
            Ok(sink) => {
                self.logger
                    .log_progress(&format!("Writing annotated output to {}", path.display()));
                Some(sink)
            }
            Err(e) => {
                self.logger.log_warning(&format!(
                    "Annotated output disabled, cannot open {}: {}",
                    path.display(),
                    e
                ));
                None
            }
        }
    }
}

impl std::fmt::Debug for CameraWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraWorker")
            .field("camera_id", &self.camera_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        person_at, RecordingDelivery, RecordingSinkFactory, ScriptedDetector, ScriptedOpener,
        ScriptedSource,
    };
    use crate::tracker::IouTrackerFactory;
    use headcount_models::SourceDescriptor;
    use std::time::Duration;

    struct Fixture {
        worker: CameraWorker,
        opener: Arc<ScriptedOpener>,
        delivery: Arc<RecordingDelivery>,
    }

    fn fixture(opener: ScriptedOpener, config: WorkerConfig) -> Fixture {
        let opener = Arc::new(opener);
        let delivery = Arc::new(RecordingDelivery::new(200));
        let capabilities = Capabilities::new(
            opener.clone(),
            Arc::new(ScriptedDetector::constant(vec![person_at(30.0, 20.0)])),
            delivery.clone(),
        )
        .with_tracker(Arc::new(IouTrackerFactory::default()));
        Fixture {
            worker: CameraWorker::new("cam-1", capabilities, config),
            opener,
            delivery,
        }
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            stats_interval: Duration::from_millis(20),
            delivery_timeout: Duration::from_millis(200),
            ..WorkerConfig::default()
        }
    }

    fn spec() -> WorkerSpec {
        WorkerSpec::new("cam-1", SourceDescriptor::Rtsp { url: "rtsp://cam-1/stream".into() })
            .with_webhook("http://hooks.local/events", Some("s3cret".into()))
    }

    async fn wait_for_state(worker: &CameraWorker, target: WorkerState) {
        let mut rx = worker.subscribe_state();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let f = fixture(
            ScriptedOpener::new(|| ScriptedSource::endless().with_delay(Duration::from_millis(1))),
            test_config(),
        );
        assert_eq!(f.worker.state(), WorkerState::Idle);

        assert_eq!(f.worker.start(spec()).await.unwrap(), StartOutcome::Started);
        assert_eq!(f.worker.state(), WorkerState::Running);
        assert!(f.worker.is_running());

        assert_eq!(f.worker.stop().await, StopOutcome::Stopped);
        assert_eq!(f.worker.state(), WorkerState::Stopped);
        assert!(!f.worker.is_running());
        assert!(f.opener.last_closed());
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let f = fixture(ScriptedOpener::new(ScriptedSource::endless), test_config());
        f.worker.start(spec()).await.unwrap();

        assert_eq!(f.worker.start(spec()).await.unwrap(), StartOutcome::AlreadyRunning);
        assert_eq!(f.opener.opened(), 1);
        assert!(f.worker.is_running());

        f.worker.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let f = fixture(ScriptedOpener::new(ScriptedSource::endless), test_config());
        assert_eq!(f.worker.stop().await, StopOutcome::NotRunning);

        f.worker.start(spec()).await.unwrap();
        assert_eq!(f.worker.stop().await, StopOutcome::Stopped);
        assert_eq!(f.worker.stop().await, StopOutcome::NotRunning);
        assert_eq!(f.worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_finished_worker_cannot_restart() {
        let f = fixture(ScriptedOpener::new(ScriptedSource::endless), test_config());
        f.worker.start(spec()).await.unwrap();
        f.worker.stop().await;

        let err = f.worker.start(spec()).await.unwrap_err();
        assert!(matches!(err, StartError::Finished(WorkerState::Stopped)));
    }

    #[tokio::test]
    async fn test_source_unavailable_fails_and_emits_error() {
        let f = fixture(ScriptedOpener::failing(), test_config());

        let err = f.worker.start(spec()).await.unwrap_err();
        assert!(matches!(err, StartError::SourceUnavailable(_)));
        assert_eq!(f.worker.state(), WorkerState::Failed);
        assert!(!f.worker.is_running());

        f.delivery.wait_for(1).await;
        let events = f.delivery.events();
        assert_eq!(events[0].event_type, "error");
        assert_eq!(events[0].camera_id, "cam-1");
        assert_eq!(f.worker.stop().await, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_dropped_start_fails_worker() {
        let f = fixture(
            ScriptedOpener::new(ScriptedSource::endless).with_open_delay(Duration::from_millis(200)),
            test_config(),
        );

        let dropped = tokio::time::timeout(Duration::from_millis(50), f.worker.start(spec())).await;
        assert!(dropped.is_err());
        assert_eq!(f.worker.state(), WorkerState::Failed);
        assert!(!f.worker.is_running());

        assert!(matches!(
            f.worker.start(spec()).await,
            Err(StartError::Finished(WorkerState::Failed))
        ));
        assert_eq!(f.worker.stop().await, StopOutcome::NotRunning);
        assert_eq!(f.opener.opened(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_opens_nothing() {
        let f = fixture(ScriptedOpener::new(ScriptedSource::endless), test_config());

        let other = WorkerSpec::new("cam-2", SourceDescriptor::Rtsp { url: "rtsp://x".into() });
        assert!(matches!(
            f.worker.start(other).await,
            Err(StartError::InvalidConfig(_))
        ));

        let blank = WorkerSpec::new("cam-1", SourceDescriptor::Hls { url: String::new() });
        assert!(matches!(
            f.worker.start(blank).await,
            Err(StartError::InvalidConfig(_))
        ));

        assert_eq!(f.opener.opened(), 0);
        assert_eq!(f.worker.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_end_of_stream_stops_worker() {
        let f = fixture(ScriptedOpener::new(|| ScriptedSource::frames(10)), test_config());
        f.worker.start(spec()).await.unwrap();

        wait_for_state(&f.worker, WorkerState::Stopped).await;
        assert!(!f.worker.is_running());
        assert_eq!(f.worker.stop().await, StopOutcome::NotRunning);
        assert!(f.opener.last_closed());

        let final_frames = f
            .delivery
            .events()
            .iter()
            .filter(|e| e.event_type == "people-stats")
            .filter_map(|e| e.data["frame_count"].as_u64())
            .max();
        assert_eq!(final_frames, Some(10));
    }

    #[tokio::test]
    async fn test_read_failure_stops_worker_with_error_event() {
        let f = fixture(
            ScriptedOpener::new(|| ScriptedSource::endless().failing_after(6)),
            test_config(),
        );
        f.worker.start(spec()).await.unwrap();

        wait_for_state(&f.worker, WorkerState::Stopped).await;
        f.worker.stop().await;
        assert!(f.delivery.events().iter().any(|e| e.event_type == "error"));
    }

    #[tokio::test]
    async fn test_annotated_output_path_and_finalisation() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = Arc::new(RecordingSinkFactory::default());
        let mut f = fixture(
            ScriptedOpener::new(ScriptedSource::endless),
            WorkerConfig {
                output_dir: Some(dir.path().to_path_buf()),
                ..test_config()
            },
        );
        f.worker.capabilities = f.worker.capabilities.clone().with_sink(sinks.clone());

        f.worker.start(spec()).await.unwrap();
        f.worker.stop().await;

        assert_eq!(sinks.paths(), vec![dir.path().join("cam-1_with_boxes.mp4")]);
        assert!(sinks.all_finished());
    }

    #[test]
    fn test_output_path_uses_file_stem() {
        let f = fixture(
            ScriptedOpener::new(ScriptedSource::endless),
            WorkerConfig {
                output_dir: Some(PathBuf::from("/tmp/out")),
                ..test_config()
            },
        );
        let spec = WorkerSpec::new(
            "cam-1",
            SourceDescriptor::File { path: PathBuf::from("/videos/lobby.mp4") },
        );
        assert_eq!(
            f.worker.output_path(&spec),
            Some(PathBuf::from("/tmp/out/lobby_with_boxes.mp4"))
        );
    }
}

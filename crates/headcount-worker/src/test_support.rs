//! Scripted capabilities for unit tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use headcount_models::{Detection, Point, SignedEvent, SourceDescriptor};
use image::RgbImage;

use crate::capability::{
    DetectionSettings, Detector, FrameSink, FrameSource, SinkFactory, SourceInfo, SourceOpener,
};
use crate::delivery::Delivery;
use crate::error::{DeliveryError, DetectionError, SinkError, SourceError};
use crate::frame::Frame;
use crate::tracker::bbox_around;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn person_at(x: f64, y: f64) -> Detection {
    Detection::person(bbox_around(Point::new(x, y), 40.0, 100.0), 0.9)
}

/// Frame source yielding blank frames.
pub struct ScriptedSource {
    remaining: Option<u64>,
    fail_after: Option<u64>,
    delay: Option<Duration>,
    seq: u64,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn frames(n: u64) -> Self {
        Self {
            remaining: Some(n),
            fail_after: None,
            delay: None,
            seq: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn endless() -> Self {
        Self {
            remaining: None,
            ..Self::frames(0)
        }
    }

    /// Fail the read after `n` frames were delivered.
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        if self.fail_after == Some(self.seq) {
            return Err(SourceError::read_failed("stream dropped"));
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        let frame = Frame::blank(self.seq, WIDTH, HEIGHT);
        self.seq += 1;
        Ok(Some(frame))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: WIDTH,
            height: HEIGHT,
            fps: 25.0,
        }
    }
}

/// Opener handing out a fresh scripted source per call.
pub struct ScriptedOpener {
    make: Box<dyn Fn() -> ScriptedSource + Send + Sync>,
    fail: bool,
    open_delay: Option<Duration>,
    opened: AtomicUsize,
    last_closed: Mutex<Option<Arc<AtomicBool>>>,
}

impl ScriptedOpener {
    pub fn new(make: impl Fn() -> ScriptedSource + Send + Sync + 'static) -> Self {
        Self {
            make: Box::new(make),
            fail: false,
            open_delay: None,
            opened: AtomicUsize::new(0),
            last_closed: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(ScriptedSource::endless)
        }
    }

    /// Sleep in `open` before handing out the source, like a slow RTSP handshake.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether the most recently opened source has been closed.
    pub fn last_closed(&self) -> bool {
        self.last_closed
            .lock()
            .unwrap()
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SourceOpener for ScriptedOpener {
    async fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn FrameSource>, SourceError> {
        if self.fail {
            return Err(SourceError::open_failed(format!("cannot open {}", source)));
        }
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let scripted = (self.make)();
        *self.last_closed.lock().unwrap() = Some(scripted.closed_flag());
        Ok(Box::new(scripted))
    }
}

/// Detector returning canned detections, per call or constant.
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    constant: bool,
    failing: HashSet<u64>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self {
            script: vec![detections],
            constant: true,
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// One entry per call; empty once the script runs out.
    pub fn sequence(script: Vec<Vec<Detection>>) -> Self {
        Self {
            constant: false,
            ..Self::constant(Vec::new())
        }
        .with_script(script)
    }

    fn with_script(mut self, script: Vec<Vec<Detection>>) -> Self {
        self.script = script;
        self
    }

    /// Fail for frames with these sequence numbers.
    pub fn failing_on(mut self, seqs: &[u64]) -> Self {
        self.failing = seqs.iter().copied().collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(
        &self,
        frame: &Frame,
        _settings: &DetectionSettings,
    ) -> Result<Vec<Detection>, DetectionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&frame.seq) {
            return Err(DetectionError::request_failed("scripted failure"));
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.constant {
            return Ok(self.script[0].clone());
        }
        Ok(self.script.get(call).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Delivery that records every event and answers with a fixed status.
pub struct RecordingDelivery {
    status: u16,
    delay: Option<Duration>,
    sent: Mutex<Vec<(String, SignedEvent)>>,
}

impl RecordingDelivery {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            delay: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<SignedEvent> {
        self.sent.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Wait until at least `n` events were recorded, up to two seconds.
    pub async fn wait_for(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.sent.lock().unwrap().len() < n && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(
        &self,
        url: &str,
        body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<u16, DeliveryError> {
        let event: SignedEvent =
            serde_json::from_slice(&body).map_err(|e| DeliveryError::Network(e.to_string()))?;
        self.sent.lock().unwrap().push((url.to_string(), event));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.status)
    }
}

/// Sink counting written frames.
#[derive(Default)]
pub struct RecordingSink {
    written: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn written_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.written)
    }

    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write(&mut self, _image: &RgbImage) -> Result<(), SinkError> {
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink factory remembering the requested output paths.
#[derive(Default)]
pub struct RecordingSinkFactory {
    paths: Mutex<Vec<PathBuf>>,
    finished: Mutex<Vec<Arc<AtomicBool>>>,
}

impl RecordingSinkFactory {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }

    pub fn all_finished(&self) -> bool {
        self.finished
            .lock()
            .unwrap()
            .iter()
            .all(|f| f.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl SinkFactory for RecordingSinkFactory {
    async fn create(&self, path: &Path, _info: SourceInfo) -> Result<Box<dyn FrameSink>, SinkError> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        let sink = RecordingSink::default();
        self.finished.lock().unwrap().push(sink.finished_flag());
        Ok(Box::new(sink))
    }
}

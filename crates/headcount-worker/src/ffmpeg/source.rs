//! Frame source decoding through an `ffmpeg` child process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use headcount_models::SourceDescriptor;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use super::stream_info::read_stream_info;
use crate::capability::{FrameSource, SourceInfo, SourceOpener};
use crate::error::SourceError;
use crate::frame::Frame;

/// Opens files, HLS playlists and RTSP streams with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSourceOpener;

impl FfmpegSourceOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceOpener for FfmpegSourceOpener {
    async fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn FrameSource>, SourceError> {
        which::which("ffmpeg").map_err(|_| SourceError::FfmpegNotFound)?;

        if let SourceDescriptor::File { path } = source {
            if !path.exists() {
                return Err(SourceError::FileNotFound(path.clone()));
            }
        }

        let input = source.input();
        let info = read_stream_info(&input, source.is_live()).await?;
        debug!(
            "Opening {} ({}x{} @ {:.2} fps)",
            source, info.width, info.height, info.fps
        );

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-nostdin", "-v", "error"]);
        if matches!(source, SourceDescriptor::Rtsp { .. }) {
            cmd.args(["-rtsp_transport", "tcp"]);
        }
        let mut child = cmd
            .arg("-i")
            .arg(&input)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::open_failed("ffmpeg stdout not captured"))?;

        Ok(Box::new(FfmpegSource {
            child: Some(child),
            stdout: Some(stdout),
            info,
            live: source.is_live(),
            seq: 0,
            buf: vec![0; Frame::byte_len(info.width, info.height)],
        }))
    }
}

pub struct FfmpegSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    info: SourceInfo,
    live: bool,
    seq: u64,
    buf: Vec<u8>,
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        match stdout.read_exact(&mut self.buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.stdout = None;
                if self.live {
                    return Err(SourceError::read_failed("stream ended unexpectedly"));
                }
                return Ok(None);
            }
            Err(e) => return Err(SourceError::read_failed(e.to_string())),
        }

        let timestamp = Duration::from_secs_f64(self.seq as f64 / self.info.fps);
        let frame = Frame::new(
            self.seq,
            timestamp,
            self.info.width,
            self.info.height,
            self.buf.clone(),
        );
        self.seq += 1;
        Ok(Some(frame))
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop ffmpeg decoder: {}", e);
            }
        }
    }

    fn info(&self) -> SourceInfo {
        self.info
    }
}

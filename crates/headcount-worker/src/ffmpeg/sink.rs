//! Annotated output encoding through an `ffmpeg` child process.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use crate::capability::{FrameSink, SinkFactory, SourceInfo};
use crate::error::SinkError;

#[derive(Debug, Clone)]
pub struct FfmpegSinkFactory {
    preset: String,
    crf: u8,
}

impl Default for FfmpegSinkFactory {
    fn default() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 23,
        }
    }
}

impl FfmpegSinkFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SinkFactory for FfmpegSinkFactory {
    async fn create(&self, path: &Path, info: SourceInfo) -> Result<Box<dyn FrameSink>, SinkError> {
        which::which("ffmpeg").map_err(|_| SinkError::FfmpegNotFound)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = format!("{}x{}", info.width, info.height);
        let rate = format!("{:.3}", info.fps);
        debug!("Writing annotated output to {}", path.display());

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-s", &size, "-r", &rate])
            .args(["-i", "pipe:0"])
            .args(["-c:v", "libx264", "-preset", &self.preset])
            .args(["-crf", &self.crf.to_string(), "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SinkError::OpenFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SinkError::OpenFailed("ffmpeg stdin not captured".to_string()))?;

        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            expected: (info.width, info.height),
        }))
    }
}

pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    expected: (u32, u32),
}

#[async_trait]
impl FrameSink for FfmpegSink {
    async fn write(&mut self, image: &RgbImage) -> Result<(), SinkError> {
        if image.dimensions() != self.expected {
            return Err(SinkError::WriteFailed(format!(
                "frame is {:?}, encoder expects {:?}",
                image.dimensions(),
                self.expected
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SinkError::WriteFailed("output already finished".to_string()))?;
        stdin
            .write_all(image.as_raw())
            .await
            .map_err(|e| SinkError::WriteFailed(e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        // Closing stdin lets ffmpeg flush and write the trailer.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SinkError::WriteFailed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

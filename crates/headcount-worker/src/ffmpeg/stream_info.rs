//! FFprobe stream information.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::capability::SourceInfo;
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Read the first video stream of `input` (file path or stream URL).
pub async fn read_stream_info(input: &str, live: bool) -> Result<SourceInfo, SourceError> {
    which::which("ffprobe").map_err(|_| SourceError::FfprobeNotFound)?;

    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error"]);
    if input.starts_with("rtsp://") {
        cmd.args(["-rtsp_transport", "tcp"]);
    }
    if live {
        // Bound ffprobe on streams that never send a header.
        cmd.args(["-rw_timeout", "10000000"]);
    }
    let output = cmd
        .args([
            "-select_streams",
            "v:0",
            "-show_streams",
            "-print_format",
            "json",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SourceError::open_failed(format!(
            "ffprobe failed for {}: {}",
            input,
            stderr.trim()
        )));
    }

    parse_stream_info(&output.stdout)
}

fn parse_stream_info(stdout: &[u8]) -> Result<SourceInfo, SourceError> {
    let output: FfprobeOutput = serde_json::from_slice(stdout)?;
    let stream = output
        .streams
        .first()
        .ok_or_else(|| SourceError::open_failed("No video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(SourceError::open_failed("Video stream has no dimensions")),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(25.0);

    Ok(SourceInfo { width, height, fps })
}

/// Parse "30000/1001" or "25" into frames per second.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

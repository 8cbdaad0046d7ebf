//! Start request and the validated worker spec derived from it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::geometry::{Line, Zone};

/// Where a worker reads frames from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceDescriptor {
    /// Recorded video file on local disk.
    File { path: PathBuf },
    /// HLS playlist URL.
    Hls { url: String },
    /// RTSP camera URL.
    Rtsp { url: String },
}

impl SourceDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceDescriptor::File { .. } => "file",
            SourceDescriptor::Hls { .. } => "hls",
            SourceDescriptor::Rtsp { .. } => "rtsp",
        }
    }

    /// Input string handed to the decoder.
    pub fn input(&self) -> String {
        match self {
            SourceDescriptor::File { path } => path.to_string_lossy().to_string(),
            SourceDescriptor::Hls { url } | SourceDescriptor::Rtsp { url } => url.clone(),
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, SourceDescriptor::File { .. })
    }

    /// File stem for file sources.
    pub fn file_stem(&self) -> Option<String> {
        match self {
            SourceDescriptor::File { path } => Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::File { path } => write!(f, "file {}", path.display()),
            SourceDescriptor::Hls { url } => write!(f, "HLS stream {}", url),
            SourceDescriptor::Rtsp { url } => write!(f, "RTSP stream {}", url),
        }
    }
}

/// Per-start detector overrides; `None` falls back to worker defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    pub conf: Option<f32>,
    pub imgsz: Option<u32>,
    pub model: Option<String>,
}

/// Body of a start request as sent by the front-end.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[validate(length(min = 1, max = 128))]
    pub camera_id: String,
    /// RTSP URL for live cameras
    #[serde(default)]
    pub rtsp: Option<String>,
    /// HLS playlist URL for live cameras
    #[serde(default)]
    pub hls_url: Option<String>,
    /// Local file path for recorded video
    #[serde(default)]
    pub file_path: Option<String>,
    #[validate(url)]
    pub webhook: String,
    /// Shared HMAC secret
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub line: Option<Line>,
    /// Single polygon (legacy field)
    #[serde(default)]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub conf: Option<f32>,
    #[validate(range(min = 32, max = 4096))]
    #[serde(default)]
    pub imgsz: Option<u32>,
    /// Process every Nth frame (2-3 for CPU savings)
    #[validate(range(min = 1, max = 1000))]
    #[serde(default)]
    pub frame_skip: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
    /// Swap the in/out direction of the counting line.
    #[serde(default)]
    pub invert_direction: bool,
}

impl StartRequest {
    /// Pick the source with precedence file, HLS, RTSP.
    pub fn source(&self) -> Option<SourceDescriptor> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(path) = present(&self.file_path) {
            return Some(SourceDescriptor::File {
                path: PathBuf::from(path),
            });
        }
        if let Some(url) = present(&self.hls_url) {
            return Some(SourceDescriptor::Hls {
                url: url.to_string(),
            });
        }
        present(&self.rtsp).map(|url| SourceDescriptor::Rtsp {
            url: url.to_string(),
        })
    }

    /// Validate once and convert to the typed worker spec.
    pub fn into_spec(self) -> ModelResult<WorkerSpec> {
        self.validate()?;
        let source = self.source().ok_or(ModelError::MissingSource)?;

        let mut zones = Vec::with_capacity(self.zones.len() + 1);
        zones.extend(self.zones);
        if let Some(zone) = self.zone {
            zones.push(zone);
        }

        Ok(WorkerSpec {
            camera_id: self.camera_id,
            source,
            webhook: Some(self.webhook),
            secret: self.secret.filter(|s| !s.is_empty()),
            line: self.line,
            zones,
            detection: DetectionParams {
                conf: self.conf,
                imgsz: self.imgsz,
                model: self.model,
            },
            frame_skip: self.frame_skip,
            invert_direction: self.invert_direction,
        })
    }
}

/// Everything one worker run needs, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub camera_id: String,
    pub source: SourceDescriptor,
    pub webhook: Option<String>,
    pub secret: Option<String>,
    pub line: Option<Line>,
    pub zones: Vec<Zone>,
    pub detection: DetectionParams,
    pub frame_skip: Option<u32>,
    pub invert_direction: bool,
}

impl WorkerSpec {
    /// Minimal spec for a source with no webhook, line or zones.
    pub fn new(camera_id: impl Into<String>, source: SourceDescriptor) -> Self {
        Self {
            camera_id: camera_id.into(),
            source,
            webhook: None,
            secret: None,
            line: None,
            zones: Vec::new(),
            detection: DetectionParams::default(),
            frame_skip: None,
            invert_direction: false,
        }
    }

    pub fn with_webhook(mut self, url: impl Into<String>, secret: Option<String>) -> Self {
        self.webhook = Some(url.into());
        self.secret = secret;
        self
    }

    pub fn with_line(mut self, line: Line) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn with_frame_skip(mut self, n: u32) -> Self {
        self.frame_skip = Some(n);
        self
    }

    /// Re-check invariants for specs built in code rather than from a request.
    pub fn validate(&self) -> ModelResult<()> {
        if self.camera_id.trim().is_empty() {
            return Err(ModelError::validation("cameraId must not be empty"));
        }
        if self.source.input().trim().is_empty() {
            return Err(ModelError::MissingSource);
        }
        if self.frame_skip == Some(0) {
            return Err(ModelError::validation("frameSkip must be at least 1"));
        }
        if let Some(url) = &self.webhook {
            url::Url::parse(url)
                .map_err(|e| ModelError::validation(format!("invalid webhook URL: {}", e)))?;
        }
        Ok(())
    }
}

//! HTTP client for an external person detection service.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use headcount_models::Detection;
use image::ImageFormat;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::capability::{DetectionSettings, Detector};
use crate::error::DetectionError;
use crate::frame::Frame;

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-frame request timeout
    pub timeout: Duration,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl DetectorClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("DETECTOR_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("DETECTOR_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Sends JPEG-encoded frames to `{base_url}/detect`.
pub struct RemoteDetector {
    http: Client,
    config: DetectorClientConfig,
}

impl RemoteDetector {
    pub fn new(config: DetectorClientConfig) -> Result<Self, DetectionError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectionError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, DetectionError> {
        Self::new(DetectorClientConfig::from_env())
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    Err(_) => false,
                }
            }
            Ok(response) => {
                warn!("Detector health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Detector health check error: {}", e);
                false
            }
        }
    }
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, DetectionError> {
    let image = frame
        .to_image()
        .ok_or_else(|| DetectionError::Encode("frame buffer does not match dimensions".into()))?;
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| DetectionError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

#[async_trait]
impl Detector for RemoteDetector {
    async fn detect(
        &self,
        frame: &Frame,
        settings: &DetectionSettings,
    ) -> Result<Vec<Detection>, DetectionError> {
        let url = format!("{}/detect", self.config.base_url);
        let body = encode_jpeg(frame)?;

        debug!(frame = frame.seq, bytes = body.len(), "Sending frame to detector");

        let response = self
            .http
            .post(&url)
            .query(&[
                ("conf", settings.conf.to_string()),
                ("imgsz", settings.imgsz.to_string()),
                ("model", settings.model.clone()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::request_failed(format!(
                "Detector returned {}: {}",
                status, body
            )));
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;
        Ok(parsed.detections)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

//! Webhook transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::DeliveryError;

/// One POST of pre-serialized event bytes.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Returns the HTTP status; the caller decides what counts as success.
    async fn deliver(&self, url: &str, body: Vec<u8>, timeout: Duration)
        -> Result<u16, DeliveryError>;
}

/// `reqwest`-backed delivery with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    http: Client,
}

impl HttpDelivery {
    pub fn new() -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .user_agent(concat!("headcount-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeliveryError::from)?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(
        &self,
        url: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<u16, DeliveryError> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

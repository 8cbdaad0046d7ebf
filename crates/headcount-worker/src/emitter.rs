//! Fire-and-forget event emission.
//!
//! Each event is signed on the caller's task and delivered on its own
//! short-lived task with exactly one attempt. Failures are logged and
//! counted, never retried and never returned to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use headcount_models::{Event, EventKind};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::delivery::Delivery;
use crate::error::DeliveryError;
use crate::metrics;
use crate::signing;

#[derive(Clone)]
pub struct EventEmitter {
    camera_id: String,
    webhook: Option<String>,
    secret: Option<String>,
    delivery: Arc<dyn Delivery>,
    timeout: Duration,
}

impl EventEmitter {
    pub fn new(
        camera_id: impl Into<String>,
        webhook: Option<String>,
        secret: Option<String>,
        delivery: Arc<dyn Delivery>,
        timeout: Duration,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            webhook,
            secret,
            delivery,
            timeout,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook.is_some()
    }

    /// Sign and dispatch `kind`. Returns the delivery task handle, or `None`
    /// when the event was dropped before any network activity.
    pub fn emit(&self, kind: EventKind) -> Option<JoinHandle<()>> {
        let url = self.webhook.clone()?;
        let event = Event::new(self.camera_id.clone(), kind);
        let event_type = event.kind.type_tag();

        let signed = match signing::sign_event(event, self.secret.as_deref()) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(camera_id = %self.camera_id, "Failed to sign {} event: {}", event_type, e);
                metrics::record_event_failed(event_type, "signing");
                return None;
            }
        };
        let body = match serde_json::to_vec(&signed) {
            Ok(body) => body,
            Err(e) => {
                warn!(camera_id = %self.camera_id, "Failed to serialize {} event: {}", event_type, e);
                metrics::record_event_failed(event_type, "serialization");
                return None;
            }
        };

        let delivery = Arc::clone(&self.delivery);
        let timeout = self.timeout;
        let camera_id = self.camera_id.clone();

        Some(tokio::spawn(async move {
            let started = Instant::now();
            // The transport enforces the timeout too; this bounds fakes and
            // slow DNS alike.
            let result = match tokio::time::timeout(timeout, delivery.deliver(&url, body, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout),
            };

            match result {
                Ok(status) if (200..300).contains(&status) => {
                    debug!(camera_id = %camera_id, status, "Delivered {} event", event_type);
                    metrics::record_event_delivered(event_type, started.elapsed().as_secs_f64());
                }
                Ok(status) => {
                    warn!(camera_id = %camera_id, status, "Webhook rejected {} event", event_type);
                    metrics::record_event_failed(event_type, "status");
                }
                Err(DeliveryError::Timeout) => {
                    warn!(camera_id = %camera_id, "Webhook timed out for {} event", event_type);
                    metrics::record_event_failed(event_type, "timeout");
                }
                Err(e) => {
                    warn!(camera_id = %camera_id, "Webhook delivery failed for {} event: {}", event_type, e);
                    metrics::record_event_failed(event_type, "network");
                }
            }
        }))
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("camera_id", &self.camera_id)
            .field("webhook", &self.webhook)
            .field("signed", &self.secret.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

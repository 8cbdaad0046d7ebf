//! Camera id to worker map.
//!
//! The registry is the only place that enforces one live worker per camera.
//! Workers hold no reference back to it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use headcount_models::WorkerSpec;
use tokio::sync::Mutex;
use tracing::info;

use crate::capability::Capabilities;
use crate::config::WorkerConfig;
use crate::error::StartError;
use crate::metrics;
use crate::worker::{CameraWorker, StartOutcome, StopOutcome};

pub struct WorkerRegistry {
    capabilities: Capabilities,
    config: WorkerConfig,
    workers: Mutex<HashMap<String, Arc<CameraWorker>>>,
}

impl WorkerRegistry {
    pub fn new(capabilities: Capabilities, config: WorkerConfig) -> Self {
        Self {
            capabilities,
            config,
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Start a worker for `spec.camera_id` unless one is already live.
    ///
    /// A finished worker left in the map is replaced.
    pub async fn start(&self, spec: WorkerSpec) -> Result<StartOutcome, StartError> {
        spec.validate()?;
        let camera_id = spec.camera_id.clone();

        let worker = {
            let mut workers = self.workers.lock().await;
            match workers.get(&camera_id) {
                Some(existing) if !existing.state().is_terminal() => Arc::clone(existing),
                _ => {
                    let worker = Arc::new(CameraWorker::new(
                        camera_id.clone(),
                        self.capabilities.clone(),
                        self.config.clone(),
                    ));
                    workers.insert(camera_id.clone(), Arc::clone(&worker));
                    worker
                }
            }
        };

        // Opening the source can take a while; the map stays unlocked so other
        // cameras are not held up. Concurrent starts for this camera share the
        // same worker and serialise on it.
        let result = worker.start(spec).await;

        let mut workers = self.workers.lock().await;
        if result.is_err() {
            if let Some(current) = workers.get(&camera_id) {
                if Arc::ptr_eq(current, &worker) && worker.state().is_terminal() {
                    workers.remove(&camera_id);
                }
            }
        }
        metrics::set_active_workers(live_count(&workers));

        if matches!(result, Ok(StartOutcome::Started)) {
            info!(camera_id = %camera_id, "Worker started");
        }
        result
    }

    /// Stop the worker for `camera_id`, waiting until it released its source.
    pub async fn stop(&self, camera_id: &str) -> StopOutcome {
        let worker = {
            let workers = self.workers.lock().await;
            match workers.get(camera_id) {
                Some(worker) => Arc::clone(worker),
                None => return StopOutcome::NotRunning,
            }
        };

        let outcome = worker.stop().await;

        let mut workers = self.workers.lock().await;
        if let Some(current) = workers.get(camera_id) {
            if Arc::ptr_eq(current, &worker) {
                workers.remove(camera_id);
            }
        }
        metrics::set_active_workers(live_count(&workers));

        if outcome == StopOutcome::Stopped {
            info!(camera_id = %camera_id, "Worker stopped");
        }
        outcome
    }

    pub async fn is_running(&self, camera_id: &str) -> bool {
        self.workers
            .lock()
            .await
            .get(camera_id)
            .map(|w| w.is_running())
            .unwrap_or(false)
    }

    /// Ids of cameras with a live worker, sorted. Finished workers are pruned.
    pub async fn camera_ids(&self) -> Vec<String> {
        let mut workers = self.workers.lock().await;
        workers.retain(|_, w| !w.state().is_terminal());
        metrics::set_active_workers(workers.len());

        let mut ids: Vec<String> = workers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop every worker concurrently and empty the map.
    pub async fn stop_all(&self) {
        let workers: Vec<Arc<CameraWorker>> = {
            let mut map = self.workers.lock().await;
            map.drain().map(|(_, w)| w).collect()
        };
        if workers.is_empty() {
            return;
        }

        info!("Stopping {} camera workers", workers.len());
        join_all(workers.iter().map(|w| w.stop())).await;
        metrics::set_active_workers(0);
    }
}

fn live_count(workers: &HashMap<String, Arc<CameraWorker>>) -> usize {
    workers.values().filter(|w| !w.state().is_terminal()).count()
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

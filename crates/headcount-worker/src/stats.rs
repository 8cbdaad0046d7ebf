//! Periodic `people-stats` emission.

use std::time::Duration;

use headcount_models::{EventKind, StatsSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::emitter::EventEmitter;

/// Samples the latest snapshot on a wall-clock interval.
///
/// The frame loop is the only writer of the watch channel. When it drops
/// its sender the aggregator emits one final snapshot and ends.
pub struct StatsAggregator {
    emitter: EventEmitter,
    interval: Duration,
    snapshots: watch::Receiver<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new(
        emitter: EventEmitter,
        interval: Duration,
        snapshots: watch::Receiver<StatsSnapshot>,
    ) -> Self {
        Self {
            emitter,
            interval,
            snapshots,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.snapshots.borrow().clone();
                    self.emitter.emit(EventKind::PeopleStats(snapshot));
                }
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let snapshot = self.snapshots.borrow().clone();
        debug!(
            camera_id = %self.emitter.camera_id(),
            count_in = snapshot.count_in,
            count_out = snapshot.count_out,
            "Emitting final stats"
        );
        if let Some(handle) = self.emitter.emit(EventKind::PeopleStats(snapshot)) {
            let _ = handle.await;
        }
    }
}

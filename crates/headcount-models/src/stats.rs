//! Periodic stats snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Immutable projection of a worker's counters at one point in time.
///
/// `total_detected` is the peak number of people seen in a single processed
/// frame; `current_detected` is the count at the most recent processed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatsSnapshot {
    pub count_in: u64,
    pub count_out: u64,
    /// Never negative; `count_in - count_out` in line mode.
    pub occupancy: u64,
    pub total_detected: u64,
    pub current_detected: u64,
    /// Frames read from the source, including skipped ones.
    pub frame_count: u64,
    /// Frames that went through detection.
    pub total_frames_processed: u64,
    /// Live count per configured zone, in configuration order.
    #[serde(default)]
    pub zone_occupancy: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_keys() {
        let value = serde_json::to_value(StatsSnapshot::default()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "count_in",
            "count_out",
            "occupancy",
            "total_detected",
            "frame_count",
            "total_frames_processed",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }
}

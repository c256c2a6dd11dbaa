//! Worker heartbeat model.

use autotube_core::action::Stage;
use autotube_core::liveness::HeartbeatSample;
use autotube_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `worker_heartbeats` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkerHeartbeat {
    pub worker_name: String,
    pub stage: String,
    pub ttl_secs: i32,
    pub started_at: Timestamp,
    pub last_seen_at: Timestamp,
    pub jobs_processed: i64,
}

impl WorkerHeartbeat {
    /// Convert into the liveness input. Rows with an unknown stage are
    /// skipped.
    pub fn to_sample(&self) -> Option<HeartbeatSample> {
        let stage = Stage::from_str_value(&self.stage).ok()?;
        Some(HeartbeatSample {
            worker_name: self.worker_name.clone(),
            stage,
            last_seen_at: self.last_seen_at,
            ttl_secs: i64::from(self.ttl_secs),
        })
    }
}

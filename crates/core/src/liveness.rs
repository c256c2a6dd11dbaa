//! Per-stage worker liveness.
//!
//! The authoritative signal is an explicit heartbeat younger than its TTL.
//! A data-derived heuristic (a job in the stage's in-flight status, or a
//! recently updated job reporting one of the stage's sub-statuses) is
//! computed alongside as a fallback presence signal.

use serde::Serialize;

use crate::action::Stage;
use crate::job_status::JobStatus;
use crate::sub_status::SubStatus;
use crate::types::Timestamp;

/// Default heartbeat TTL when a worker does not specify one.
pub const DEFAULT_HEARTBEAT_TTL_SECS: i64 = 30;

/// Default recency window for the activity heuristic.
pub const DEFAULT_RECENT_WINDOW_SECS: i64 = 120;

/// In-flight jobs untouched for this long are flagged as possibly stuck.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 15 * 60;

/// A worker heartbeat as recorded in `worker_heartbeats`.
#[derive(Debug, Clone)]
pub struct HeartbeatSample {
    pub worker_name: String,
    pub stage: Stage,
    pub last_seen_at: Timestamp,
    pub ttl_secs: i64,
}

/// The job fields the heuristic looks at.
#[derive(Debug, Clone, Copy)]
pub struct JobActivitySample {
    pub status: JobStatus,
    /// Last progress step, kept after the stage finishes.
    pub sub_status: Option<SubStatus>,
    pub sub_status_at: Option<Timestamp>,
}

/// Which signal decided a stage is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessSource {
    Heartbeat,
    InFlightJob,
    RecentSubStatus,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageLiveness {
    pub stage: Stage,
    pub alive: bool,
    pub source: LivenessSource,
    /// Workers with a fresh heartbeat for this stage.
    pub workers: Vec<String>,
    pub last_heartbeat_at: Option<Timestamp>,
    pub heartbeat_alive: bool,
    pub heuristic_alive: bool,
    pub in_flight_jobs: usize,
}

/// Whether a heartbeat seen at `last_seen_at` is still within its TTL.
pub fn heartbeat_is_fresh(last_seen_at: Timestamp, ttl_secs: i64, now: Timestamp) -> bool {
    (now - last_seen_at).num_seconds() < ttl_secs
}

/// Whether an in-flight job has gone without updates for longer than
/// `stale_after_secs`. Never true for idle or terminal jobs.
pub fn is_possibly_stuck(
    status: JobStatus,
    updated_at: Timestamp,
    now: Timestamp,
    stale_after_secs: i64,
) -> bool {
    status.is_in_flight() && (now - updated_at).num_seconds() >= stale_after_secs
}

/// Compute liveness for every stage.
pub fn infer_stage_liveness(
    heartbeats: &[HeartbeatSample],
    activity: &[JobActivitySample],
    now: Timestamp,
    window_secs: i64,
) -> Vec<StageLiveness> {
    Stage::ALL
        .into_iter()
        .map(|stage| {
            let stage_beats: Vec<&HeartbeatSample> =
                heartbeats.iter().filter(|h| h.stage == stage).collect();
            let workers: Vec<String> = stage_beats
                .iter()
                .filter(|h| heartbeat_is_fresh(h.last_seen_at, h.ttl_secs, now))
                .map(|h| h.worker_name.clone())
                .collect();
            let last_heartbeat_at = stage_beats.iter().map(|h| h.last_seen_at).max();

            let in_flight_jobs = activity
                .iter()
                .filter(|a| a.status.stage() == Some(stage))
                .count();
            let recent_sub_status = activity.iter().any(|a| {
                a.sub_status.is_some_and(|s| s.stage() == stage)
                    && a.sub_status_at
                        .is_some_and(|at| (now - at).num_seconds() <= window_secs)
            });

            let heartbeat_alive = !workers.is_empty();
            let heuristic_alive = in_flight_jobs > 0 || recent_sub_status;
            let source = if heartbeat_alive {
                LivenessSource::Heartbeat
            } else if in_flight_jobs > 0 {
                LivenessSource::InFlightJob
            } else if recent_sub_status {
                LivenessSource::RecentSubStatus
            } else {
                LivenessSource::None
            };

            StageLiveness {
                stage,
                alive: heartbeat_alive || heuristic_alive,
                source,
                workers,
                last_heartbeat_at,
                heartbeat_alive,
                heuristic_alive,
                in_flight_jobs,
            }
        })
        .collect()
}

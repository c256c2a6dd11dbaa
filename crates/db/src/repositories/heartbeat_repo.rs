//! Repository for the `worker_heartbeats` table.

use autotube_core::action::Stage;
use sqlx::PgPool;

use crate::models::heartbeat::WorkerHeartbeat;

/// Column list for `worker_heartbeats` queries.
const COLUMNS: &str = "worker_name, stage, ttl_secs, started_at, last_seen_at, jobs_processed";

pub struct HeartbeatRepo;

impl HeartbeatRepo {
    /// Register a runner at startup, resetting its counters.
    pub async fn register(
        pool: &PgPool,
        worker_name: &str,
        stage: Stage,
        ttl_secs: i32,
    ) -> Result<WorkerHeartbeat, sqlx::Error> {
        let query = format!(
            "INSERT INTO worker_heartbeats (worker_name, stage, ttl_secs) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (worker_name) DO UPDATE SET \
                 stage = EXCLUDED.stage, ttl_secs = EXCLUDED.ttl_secs, \
                 started_at = NOW(), last_seen_at = NOW(), jobs_processed = 0 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkerHeartbeat>(&query)
            .bind(worker_name)
            .bind(stage.as_str())
            .bind(ttl_secs)
            .fetch_one(pool)
            .await
    }

    /// Refresh `last_seen_at` and add `processed` to the job counter.
    ///
    /// Re-creates the row if it was removed while the runner was alive.
    pub async fn beat(
        pool: &PgPool,
        worker_name: &str,
        stage: Stage,
        ttl_secs: i32,
        processed: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO worker_heartbeats (worker_name, stage, ttl_secs, jobs_processed) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (worker_name) DO UPDATE SET \
                 last_seen_at = NOW(), \
                 jobs_processed = worker_heartbeats.jobs_processed + EXCLUDED.jobs_processed",
        )
        .bind(worker_name)
        .bind(stage.as_str())
        .bind(ttl_secs)
        .bind(processed)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a runner's row on clean shutdown.
    pub async fn remove(pool: &PgPool, worker_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM worker_heartbeats WHERE worker_name = $1")
            .bind(worker_name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<WorkerHeartbeat>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM worker_heartbeats ORDER BY stage, worker_name");
        sqlx::query_as::<_, WorkerHeartbeat>(&query)
            .fetch_all(pool)
            .await
    }
}

//! Polling loop for one pipeline stage.
//!
//! Every `poll_interval` the runner refreshes its heartbeat and claims the
//! oldest job queued for its stage via [`JobRepo::claim_next`]
//! (`SELECT FOR UPDATE SKIP LOCKED`), so several runners for the same stage
//! never take the same row.

use std::sync::Arc;
use std::time::Duration;

use autotube_core::action::Stage;
use autotube_core::job_status::JobStatus;
use autotube_core::state_machine::{missing_dependencies, success_transition};
use autotube_core::types::DbId;
use autotube_db::models::job::Job;
use autotube_db::repositories::{HeartbeatRepo, JobRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::executor::{DbProgress, StageExecutor};

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was queued for this stage.
    Idle,
    /// The stage succeeded; the job moved to `status`.
    Completed { job_id: DbId, status: JobStatus },
    /// The stage failed and the job was marked `failed`.
    Failed { job_id: DbId, error: String },
    /// The job was deleted or changed hands before the result was written.
    Lost { job_id: DbId },
}

pub struct StageRunner {
    pool: PgPool,
    executor: Arc<dyn StageExecutor>,
    worker_name: String,
    poll_interval: Duration,
    heartbeat_ttl_secs: i32,
}

impl StageRunner {
    pub fn new(
        pool: PgPool,
        executor: Arc<dyn StageExecutor>,
        worker_name: String,
        poll_interval: Duration,
        heartbeat_ttl_secs: i32,
    ) -> Self {
        Self {
            pool,
            executor,
            worker_name,
            poll_interval,
            heartbeat_ttl_secs,
        }
    }

    pub fn stage(&self) -> Stage {
        self.executor.stage()
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Run the polling loop until the cancellation token is triggered.
    ///
    /// A job in progress when cancellation arrives is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        let stage = self.stage();
        if let Err(e) = self.register().await {
            tracing::error!(worker = %self.worker_name, error = %e, "Failed to register heartbeat");
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            worker = %self.worker_name,
            %stage,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Stage runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker = %self.worker_name, %stage, "Stage runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(worker = %self.worker_name, %stage, error = %e, "Poll cycle failed");
                    }
                }
            }
        }

        if let Err(e) = HeartbeatRepo::remove(&self.pool, &self.worker_name).await {
            tracing::warn!(worker = %self.worker_name, error = %e, "Failed to remove heartbeat");
        }
    }

    /// Upsert this runner's heartbeat row with fresh counters.
    pub async fn register(&self) -> Result<(), sqlx::Error> {
        HeartbeatRepo::register(
            &self.pool,
            &self.worker_name,
            self.stage(),
            self.heartbeat_ttl_secs,
        )
        .await?;
        Ok(())
    }

    /// One poll: heartbeat, claim, execute, record the result.
    pub async fn tick(&self) -> Result<TickOutcome, sqlx::Error> {
        let stage = self.stage();
        self.beat(0).await?;

        let Some(job) = JobRepo::claim_next(&self.pool, stage, &self.worker_name).await? else {
            return Ok(TickOutcome::Idle);
        };
        tracing::info!(job_id = job.id, worker = %self.worker_name, %stage, "Job claimed");

        let outcome = self.process(job).await?;
        self.beat(1).await?;
        Ok(outcome)
    }

    async fn process(&self, job: Job) -> Result<TickOutcome, sqlx::Error> {
        let stage = self.stage();

        // Fields may have been blanked since the action was queued.
        let missing = missing_dependencies(stage.action(), &job.artifacts());
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            let error = format!("Missing dependencies: {}", names.join(", "));
            return self.fail(job.id, error).await;
        }

        let progress = DbProgress {
            pool: &self.pool,
            job_id: job.id,
            stage,
            worker: &self.worker_name,
        };

        match self.executor.execute(&job, &progress).await {
            Ok(outputs) => {
                let pending = job.pending_action().unwrap_or_else(|e| {
                    tracing::warn!(job_id = job.id, error = %e, "Unreadable pending action");
                    None
                });
                let transition =
                    success_transition(stage, pending, &job.artifacts().with_stage_output(stage));

                match JobRepo::complete_stage(
                    &self.pool,
                    job.id,
                    stage,
                    &self.worker_name,
                    &outputs,
                    transition,
                )
                .await?
                {
                    Some(updated) => {
                        tracing::info!(
                            job_id = job.id,
                            %stage,
                            status = %updated.status,
                            next = ?transition.pending_action,
                            "Stage completed",
                        );
                        Ok(TickOutcome::Completed {
                            job_id: job.id,
                            status: transition.status,
                        })
                    }
                    None => {
                        tracing::warn!(job_id = job.id, %stage, "Job changed before completion was recorded");
                        Ok(TickOutcome::Lost { job_id: job.id })
                    }
                }
            }
            Err(e) => self.fail(job.id, e.to_string()).await,
        }
    }

    async fn fail(&self, job_id: DbId, error: String) -> Result<TickOutcome, sqlx::Error> {
        let stage = self.stage();
        tracing::error!(job_id, %stage, error = %error, "Stage failed");
        if JobRepo::fail_stage(&self.pool, job_id, stage, &self.worker_name, &error).await? {
            Ok(TickOutcome::Failed { job_id, error })
        } else {
            tracing::warn!(job_id, %stage, "Job changed before failure was recorded");
            Ok(TickOutcome::Lost { job_id })
        }
    }

    async fn beat(&self, processed: i64) -> Result<(), sqlx::Error> {
        HeartbeatRepo::beat(
            &self.pool,
            &self.worker_name,
            self.stage(),
            self.heartbeat_ttl_secs,
            processed,
        )
        .await
    }
}

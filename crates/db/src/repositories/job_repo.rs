//! Repository for the `video_jobs` table.
//!
//! Every write that changes `status` is conditional:
//! - queueing compares against the row as it was validated,
//! - claiming uses `FOR UPDATE SKIP LOCKED`,
//! - stage results only land while the writer still holds the claim.

use autotube_core::action::{PendingAction, Stage};
use autotube_core::job_status::JobStatus;
use autotube_core::state_machine::{claim_transition, Transition};
use autotube_core::sub_status::SubStatus;
use autotube_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{
    CreateJob, CreateManualUploadJob, Job, JobListQuery, StageOutputs, StatusCount,
    UpdateJobFields,
};

/// Column list for `video_jobs` queries.
const COLUMNS: &str = "\
    id, topic, status, script, title, description, tags, \
    voiceover_url, video_url, youtube_url, youtube_video_id, error_message, \
    action_needed, run_all_stage, sub_status, sub_status_at, manual_upload, privacy_status, \
    claimed_by, claimed_at, started_at, completed_at, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Result of [`JobRepo::queue_actions`].
#[derive(Debug)]
pub enum QueueOutcome {
    /// Every job was updated; rows as written.
    Queued(Vec<Job>),
    /// A job changed between validation and write. Nothing was written.
    Conflict { job_id: DbId },
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

/// Provides persistence operations for video jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new idle job.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO video_jobs (topic) VALUES ($1) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.topic)
            .fetch_one(pool)
            .await
    }

    /// Reserve an id for a job whose artifacts are stored before the row
    /// is inserted.
    pub async fn reserve_id(pool: &PgPool) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) =
            sqlx::query_as("SELECT nextval(pg_get_serial_sequence('video_jobs', 'id'))")
                .fetch_one(pool)
                .await?;
        Ok(id)
    }

    /// Insert a job seeded from an uploaded video, using an id from
    /// [`reserve_id`](Self::reserve_id). The topic is the title.
    pub async fn create_manual_upload(
        pool: &PgPool,
        id: DbId,
        input: &CreateManualUploadJob,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO video_jobs \
                (id, topic, title, description, tags, video_url, manual_upload, privacy_status) \
             VALUES ($1, $2, $2, $3, $4, $5, true, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(&input.video_url)
            .bind(input.privacy_status.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM video_jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the jobs among `ids` that exist, ordered by id.
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM video_jobs WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, Job>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List jobs newest first with an optional status filter.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM video_jobs \
             {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Job>(&query);
        if let Some(status) = &params.status {
            q = q.bind(status);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Record validated action requests for a batch of jobs.
    ///
    /// Each row is updated only if its `status`, queued action, and
    /// `updated_at` still match the row that was validated. All updates
    /// run in one transaction; if any row no longer matches, the whole
    /// batch is rolled back.
    pub async fn queue_actions(
        pool: &PgPool,
        requests: &[(Job, PendingAction)],
    ) -> Result<QueueOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE video_jobs \
             SET status = $2, action_needed = $3, run_all_stage = $4, \
                 claimed_by = NULL, claimed_at = NULL \
             WHERE id = $1 \
               AND status = $5 \
               AND action_needed IS NOT DISTINCT FROM $6 \
               AND run_all_stage IS NOT DISTINCT FROM $7 \
               AND updated_at = $8 \
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut written = Vec::with_capacity(requests.len());

        for (observed, pending) in requests {
            let (action_needed, run_all_stage) = PendingAction::to_columns(Some(*pending));
            let row = sqlx::query_as::<_, Job>(&query)
                .bind(observed.id)
                .bind(JobStatus::Pending.as_str())
                .bind(action_needed)
                .bind(run_all_stage)
                .bind(&observed.status)
                .bind(&observed.action_needed)
                .bind(&observed.run_all_stage)
                .bind(observed.updated_at)
                .fetch_optional(&mut *tx)
                .await?;

            match row {
                Some(job) => written.push(job),
                None => {
                    tx.rollback().await?;
                    return Ok(QueueOutcome::Conflict {
                        job_id: observed.id,
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(QueueOutcome::Queued(written))
    }

    /// Atomically claim the oldest job waiting on `stage`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent runners never
    /// claim the same row. The claimed row moves to the stage's in-flight
    /// status; a single-stage request is consumed, a `run_all` chain stays
    /// recorded.
    pub async fn claim_next(
        pool: &PgPool,
        stage: Stage,
        worker: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let select = format!(
            "SELECT {COLUMNS} FROM video_jobs \
             WHERE status = $1 \
               AND (action_needed = $2 OR (action_needed = 'run_all' AND run_all_stage = $3)) \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED"
        );
        let candidate = sqlx::query_as::<_, Job>(&select)
            .bind(JobStatus::Pending.as_str())
            .bind(stage.action().as_str())
            .bind(stage.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(job) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let pending = job
            .pending_action()
            .map_err(decode_err)?
            .ok_or_else(|| decode_err(format!("job {} matched without a pending action", job.id)))?;
        let transition = claim_transition(stage, pending);
        let (action_needed, run_all_stage) = PendingAction::to_columns(transition.pending_action);

        let update = format!(
            "UPDATE video_jobs \
             SET status = $2, action_needed = $3, run_all_stage = $4, \
                 sub_status = NULL, sub_status_at = NULL, claimed_by = $5, claimed_at = NOW(), \
                 started_at = COALESCE(started_at, NOW()), completed_at = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, Job>(&update)
            .bind(job.id)
            .bind(transition.status.as_str())
            .bind(action_needed)
            .bind(run_all_stage)
            .bind(worker)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(claimed))
    }

    /// Record progress within a stage and stamp `sub_status_at`. Returns
    /// `false` if the worker no longer holds the job.
    pub async fn set_sub_status(
        pool: &PgPool,
        job_id: DbId,
        stage: Stage,
        worker: &str,
        sub_status: SubStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE video_jobs SET sub_status = $4, sub_status_at = NOW() \
             WHERE id = $1 AND status = $2 AND claimed_by = $3",
        )
        .bind(job_id)
        .bind(stage.in_flight_status().as_str())
        .bind(worker)
        .bind(sub_status.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a successful stage's outputs and its transition.
    ///
    /// Only applies while the job is still in `stage`'s in-flight status
    /// and claimed by `worker`; returns `None` otherwise (deleted or taken
    /// over). Clears any previous `error_message`.
    pub async fn complete_stage(
        pool: &PgPool,
        job_id: DbId,
        stage: Stage,
        worker: &str,
        outputs: &StageOutputs,
        transition: Transition,
    ) -> Result<Option<Job>, sqlx::Error> {
        let (action_needed, run_all_stage) = PendingAction::to_columns(transition.pending_action);
        let query = format!(
            "UPDATE video_jobs SET \
                 script = COALESCE($4, script), \
                 title = COALESCE($5, title), \
                 description = COALESCE($6, description), \
                 tags = COALESCE($7, tags), \
                 voiceover_url = COALESCE($8, voiceover_url), \
                 video_url = COALESCE($9, video_url), \
                 youtube_url = COALESCE($10, youtube_url), \
                 youtube_video_id = COALESCE($11, youtube_video_id), \
                 status = $12, action_needed = $13, run_all_stage = $14, \
                 error_message = NULL, \
                 claimed_by = NULL, claimed_at = NULL, \
                 completed_at = CASE WHEN $12 = 'completed' THEN NOW() ELSE completed_at END \
             WHERE id = $1 AND status = $2 AND claimed_by = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(stage.in_flight_status().as_str())
            .bind(worker)
            .bind(&outputs.script)
            .bind(&outputs.title)
            .bind(&outputs.description)
            .bind(&outputs.tags)
            .bind(&outputs.voiceover_url)
            .bind(&outputs.video_url)
            .bind(&outputs.youtube_url)
            .bind(&outputs.youtube_video_id)
            .bind(transition.status.as_str())
            .bind(action_needed)
            .bind(run_all_stage)
            .fetch_optional(pool)
            .await
    }

    /// Mark a claimed job as failed and clear its queued action.
    ///
    /// Guarded like [`complete_stage`](Self::complete_stage). Returns
    /// `false` if the worker no longer holds the job.
    pub async fn fail_stage(
        pool: &PgPool,
        job_id: DbId,
        stage: Stage,
        worker: &str,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE video_jobs \
             SET status = $4, error_message = $5, \
                 action_needed = NULL, run_all_stage = NULL, \
                 claimed_by = NULL, claimed_at = NULL, completed_at = NOW() \
             WHERE id = $1 AND status = $2 AND claimed_by = $3",
        )
        .bind(job_id)
        .bind(stage.in_flight_status().as_str())
        .bind(worker)
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Partially update user-editable fields. Never touches `status`.
    pub async fn update_fields(
        pool: &PgPool,
        id: DbId,
        input: &UpdateJobFields,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE video_jobs SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 script = COALESCE($4, script), \
                 tags = COALESCE($5, tags) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.script)
            .bind(&input.tags)
            .fetch_optional(pool)
            .await
    }

    /// Delete jobs by id. Dependent rows cascade. Returns the ids that
    /// existed and were removed.
    pub async fn delete_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> =
            sqlx::query_as("DELETE FROM video_jobs WHERE id = ANY($1) RETURNING id")
                .bind(ids)
                .fetch_all(pool)
                .await?;
        let mut deleted: Vec<DbId> = rows.into_iter().map(|(id,)| id).collect();
        deleted.sort_unstable();
        Ok(deleted)
    }

    /// Number of jobs per status. Statuses with no jobs are absent.
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM video_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }

    /// Jobs currently in one of the in-flight statuses, oldest claim first.
    pub async fn list_in_flight(pool: &PgPool) -> Result<Vec<Job>, sqlx::Error> {
        let in_flight: Vec<&str> = JobStatus::IN_FLIGHT.iter().map(JobStatus::as_str).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM video_jobs WHERE status = ANY($1) \
             ORDER BY claimed_at ASC NULLS LAST, id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&in_flight)
            .fetch_all(pool)
            .await
    }

    /// Jobs updated at or after `since`, most recent first.
    pub async fn list_updated_since(
        pool: &PgPool,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM video_jobs WHERE updated_at >= $1 \
             ORDER BY updated_at DESC, id DESC LIMIT $2"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(since)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// Jobs the liveness heuristic looks at: everything in flight, plus
    /// anything that reported progress at or after `since` (finished jobs
    /// keep their last sub-status).
    pub async fn list_activity(pool: &PgPool, since: Timestamp) -> Result<Vec<Job>, sqlx::Error> {
        let in_flight: Vec<&str> = JobStatus::IN_FLIGHT.iter().map(JobStatus::as_str).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM video_jobs \
             WHERE status = ANY($1) OR sub_status_at >= $2"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&in_flight)
            .bind(since)
            .fetch_all(pool)
            .await
    }
}

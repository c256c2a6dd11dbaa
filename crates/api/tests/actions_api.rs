//! HTTP-level tests for `POST /api/v1/jobs/actions`.

mod common;

use autotube_core::action::Stage;
use autotube_db::models::job::StageOutputs;
use autotube_db::repositories::JobRepo;
use autotube_core::state_machine::success_transition;
use axum::http::StatusCode;
use common::{
    body_json, build_test_app, create_job, dispatch, get, patch_json, post_json, post_raw,
};
use sqlx::PgPool;

async fn fetch(pool: &PgPool, id: i64) -> serde_json::Value {
    let response = get(build_test_app(pool.clone()), &format!("/api/v1/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

async fn set_outputs(pool: &PgPool, id: i64, sql_set: &str) {
    sqlx::query(&format!("UPDATE video_jobs SET {sql_set} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

/// Claim `stage` as a test worker and finish it with `outputs`.
async fn run_stage(pool: &PgPool, stage: Stage, outputs: StageOutputs) {
    let claimed = JobRepo::claim_next(pool, stage, "test-worker")
        .await
        .unwrap()
        .expect("a job should be claimable");
    let after = {
        let mut job = claimed.clone();
        job.script = outputs.script.clone().or(job.script);
        job.title = outputs.title.clone().or(job.title);
        job.description = outputs.description.clone().or(job.description);
        job.voiceover_url = outputs.voiceover_url.clone().or(job.voiceover_url);
        job.video_url = outputs.video_url.clone().or(job.video_url);
        job.youtube_url = outputs.youtube_url.clone().or(job.youtube_url);
        job
    };
    let transition = success_transition(
        stage,
        claimed.pending_action().unwrap(),
        &after.artifacts(),
    );
    JobRepo::complete_stage(pool, claimed.id, stage, "test-worker", &outputs, transition)
        .await
        .unwrap()
        .expect("worker should still hold the claim");
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn generate_script_then_voiceover(pool: PgPool) {
    let id = create_job(&pool, "side hustle ideas").await;

    let response = dispatch(&pool, "generate_script", &[id]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["queued"], 1);
    assert_eq!(json["data"]["message"], "Queued generate_script for 1 job");
    assert_eq!(json["data"]["job_ids"], serde_json::json!([id]));

    let job = fetch(&pool, id).await;
    assert_eq!(job["status"], "pending");
    assert_eq!(job["action_needed"], "generate_script");
    assert_eq!(job["queued_action"], "generate_script");

    run_stage(
        &pool,
        Stage::Script,
        StageOutputs {
            script: Some("Here are five ideas...".into()),
            title: Some("Five Side Hustles".into()),
            description: Some("Ideas".into()),
            ..Default::default()
        },
    )
    .await;

    let job = fetch(&pool, id).await;
    assert_eq!(job["status"], "completed");
    assert!(job["action_needed"].is_null());
    assert_eq!(job["next_action"], "generate_voiceover");

    let response = dispatch(&pool, "generate_voiceover", &[id]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetch(&pool, id).await["action_needed"], "generate_voiceover");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_all_chains_through_missing_stages(pool: PgPool) {
    let id = create_job(&pool, "deep sea creatures").await;

    let response = dispatch(&pool, "run_all", &[id]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = fetch(&pool, id).await;
    assert_eq!(job["action_needed"], "run_all");
    assert_eq!(job["run_all_stage"], "script");
    assert_eq!(job["label"], "Queued: run_all (next: script)");

    run_stage(
        &pool,
        Stage::Script,
        StageOutputs {
            script: Some("Deep below...".into()),
            title: Some("Deep Sea".into()),
            description: Some(String::new()),
            ..Default::default()
        },
    )
    .await;

    let job = fetch(&pool, id).await;
    assert_eq!(job["status"], "pending");
    assert_eq!(job["action_needed"], "run_all");
    assert_eq!(job["run_all_stage"], "voiceover");

    // A second run_all while the chain is queued is refused.
    let response = dispatch(&pool, "run_all", &[id]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ALREADY_PROCESSING");
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn in_flight_job_is_already_processing_and_untouched(pool: PgPool) {
    let id = create_job(&pool, "volcanoes").await;
    assert_eq!(dispatch(&pool, "generate_script", &[id]).await.status(), StatusCode::OK);
    JobRepo::claim_next(&pool, Stage::Script, "w1").await.unwrap().unwrap();
    let before = fetch(&pool, id).await;

    let response = dispatch(&pool, "generate_script", &[id]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_PROCESSING");
    assert_eq!(json["details"][0]["job_id"], id);

    let after = fetch(&pool, id).await;
    assert_eq!(after["status"], "generating_script");
    assert_eq!(after["updated_at"], before["updated_at"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeat_request_is_already_queued(pool: PgPool) {
    let id = create_job(&pool, "rainforests").await;
    assert_eq!(dispatch(&pool, "generate_script", &[id]).await.status(), StatusCode::OK);
    let before = fetch(&pool, id).await;

    let response = dispatch(&pool, "generate_script", &[id]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_QUEUED");
    assert_eq!(json["error"], format!("Job {id}: generate_script is already queued"));

    assert_eq!(fetch(&pool, id).await["updated_at"], before["updated_at"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_video_without_script_lists_missing_fields(pool: PgPool) {
    let id = create_job(&pool, "x").await;

    let response = dispatch(&pool, "create_video", &[id]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "MISSING_DEPENDENCY");
    assert_eq!(
        json["details"][0]["missing_fields"],
        serde_json::json!(["script", "voiceover_url"])
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_job_accepts_retry_of_same_action(pool: PgPool) {
    let id = create_job(&pool, "glaciers").await;
    set_outputs(&pool, id, "script = 's', title = 't', description = 'd'").await;
    assert_eq!(dispatch(&pool, "generate_voiceover", &[id]).await.status(), StatusCode::OK);
    JobRepo::claim_next(&pool, Stage::Voiceover, "w1").await.unwrap().unwrap();
    assert!(JobRepo::fail_stage(&pool, id, Stage::Voiceover, "w1", "tts exploded")
        .await
        .unwrap());

    let job = fetch(&pool, id).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["error_message"], "tts exploded");

    let response = dispatch(&pool, "generate_voiceover", &[id]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = fetch(&pool, id).await;
    assert_eq!(job["status"], "pending");
    assert_eq!(job["action_needed"], "generate_voiceover");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_action_on_failed_row_does_not_block_retry(pool: PgPool) {
    let id = create_job(&pool, "comets").await;
    set_outputs(
        &pool,
        id,
        "status = 'failed', action_needed = 'generate_script', error_message = 'boom'",
    )
    .await;

    let response = dispatch(&pool, "generate_script", &[id]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_all_on_finished_job_is_already_complete(pool: PgPool) {
    let id = create_job(&pool, "done").await;
    set_outputs(
        &pool,
        id,
        "script = 's', title = 't', description = '', voiceover_url = 'v', \
         video_url = 'm', youtube_url = 'y', status = 'completed'",
    )
    .await;

    let response = dispatch(&pool, "run_all", &[id]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ALREADY_COMPLETE");
}

// ---------------------------------------------------------------------------
// Batches and input errors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_is_all_or_nothing(pool: PgPool) {
    let ready = create_job(&pool, "ready").await;
    let bare = create_job(&pool, "bare").await;
    set_outputs(&pool, ready, "script = 's', title = 't', description = 'd'").await;

    let response = dispatch(&pool, "generate_voiceover", &[ready, bare]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["details"].as_array().unwrap().len(), 1);
    assert_eq!(json["details"][0]["job_id"], bare);

    let job = fetch(&pool, ready).await;
    assert!(job["action_needed"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_reports_earliest_rejection_kind(pool: PgPool) {
    let queued = create_job(&pool, "queued").await;
    let bare = create_job(&pool, "bare").await;
    set_outputs(&pool, queued, "script = 's', title = 't'").await;
    set_outputs(&pool, queued, "action_needed = 'generate_voiceover'").await;

    let response = dispatch(&pool, "generate_voiceover", &[bare, queued]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_QUEUED");
    assert_eq!(json["details"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_job_ids_are_not_found(pool: PgPool) {
    let id = create_job(&pool, "real").await;

    let response = dispatch(&pool, "generate_script", &[id, 999_999]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["job_ids"], serde_json::json!([999_999]));
    assert!(fetch(&pool, id).await["action_needed"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_action_and_empty_batch_are_bad_requests(pool: PgPool) {
    let id = create_job(&pool, "topic").await;

    let response = dispatch(&pool, "make_coffee", &[id]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ACTION");

    let response = dispatch(&pool, "generate_script", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn camel_case_job_ids_are_accepted(pool: PgPool) {
    let id = create_job(&pool, "camel").await;
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/jobs/actions",
        serde_json::json!({ "action": "generate_script", "jobIds": [id] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blanked_field_is_a_missing_dependency(pool: PgPool) {
    let id = create_job(&pool, "blank").await;
    set_outputs(&pool, id, "script = 's', title = 't'").await;

    let response = patch_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/jobs/{id}"),
        serde_json::json!({ "script": "   " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = dispatch(&pool, "generate_voiceover", &[id]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["details"][0]["missing_fields"], serde_json::json!(["script"]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_bodies_are_validation_errors(pool: PgPool) {
    let id = create_job(&pool, "shape").await;
    let bodies = [
        serde_json::json!({ "job_ids": [id] }),
        serde_json::json!({ "action": "run_all" }),
        serde_json::json!({ "action": "run_all", "job_ids": "all" }),
    ];

    for body in bodies {
        let response =
            post_json(build_test_app(pool.clone()), "/api/v1/jobs/actions", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR", "{body}");
        assert!(json["error"].is_string());
    }

    let response = post_raw(
        build_test_app(pool.clone()),
        "/api/v1/jobs/actions",
        "application/json",
        "{\"action\": ",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    // Nothing was queued by any of the above.
    assert!(fetch(&pool, id).await["action_needed"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_action_is_distinct_from_missing_dependency(pool: PgPool) {
    let id = create_job(&pool, "distinct").await;

    let malformed = post_json(
        build_test_app(pool.clone()),
        "/api/v1/jobs/actions",
        serde_json::json!({ "job_ids": [id] }),
    )
    .await;
    let gated = dispatch(&pool, "generate_voiceover", &[id]).await;

    assert_ne!(malformed.status(), gated.status());
    assert_eq!(body_json(gated).await["code"], "MISSING_DEPENDENCY");
}

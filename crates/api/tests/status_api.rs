//! Integration tests for the `/status` projections.

mod common;

use autotube_core::action::Stage;
use autotube_db::repositories::{HeartbeatRepo, JobRepo};
use axum::http::StatusCode;
use common::{body_json, build_test_app, create_job, dispatch, get};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn counts_include_every_status(pool: PgPool) {
    create_job(&pool, "one").await;
    create_job(&pool, "two").await;

    let response = get(build_test_app(pool), "/api/v1/status/counts").await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();

    assert_eq!(data["total"], 2);
    assert_eq!(data["counts"]["pending"], 2);
    for status in [
        "generating_script",
        "creating_voiceover",
        "rendering_video",
        "uploading",
        "completed",
        "failed",
    ] {
        assert_eq!(data["counts"][status], 0, "{status} should be present");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn in_flight_groups_claimed_jobs(pool: PgPool) {
    let id = create_job(&pool, "claimed").await;
    create_job(&pool, "idle").await;
    assert_eq!(dispatch(&pool, "generate_script", &[id]).await.status(), StatusCode::OK);
    JobRepo::claim_next(&pool, Stage::Script, "w1").await.unwrap().unwrap();

    let response = get(build_test_app(pool), "/api/v1/status/in-flight").await;
    let data = body_json(response).await["data"].clone();

    let scripting = data["generating_script"].as_array().unwrap();
    assert_eq!(scripting.len(), 1);
    assert_eq!(scripting[0]["id"], id);
    assert_eq!(scripting[0]["label"], "Generating script");
    assert_eq!(scripting[0]["possibly_stuck"], false);
    assert!(data["uploading"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn recent_lists_jobs_inside_window(pool: PgPool) {
    let fresh = create_job(&pool, "fresh").await;
    let old = create_job(&pool, "old").await;
    // Bypass the updated_at trigger to age one row.
    sqlx::query("ALTER TABLE video_jobs DISABLE TRIGGER set_updated_at")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE video_jobs SET updated_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(old)
        .execute(&pool)
        .await
        .unwrap();

    let response = get(build_test_app(pool), "/api/v1/status/recent?window_secs=600").await;
    let data = body_json(response).await["data"].clone();
    let ids: Vec<i64> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![fresh]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn workers_reports_heartbeat_and_heuristic(pool: PgPool) {
    HeartbeatRepo::register(&pool, "script-1", Stage::Script, 30)
        .await
        .unwrap();

    let id = create_job(&pool, "video").await;
    sqlx::query(
        "UPDATE video_jobs SET script = 's', voiceover_url = 'v', \
         status = 'rendering_video', sub_status = 'rendering_video' WHERE id = $1",
    )
    .bind(id)
    .execute(&pool)
    .await
    .unwrap();

    let response = get(build_test_app(pool), "/api/v1/status/workers").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stages = body_json(response).await["data"]["stages"].clone();
    let stages = stages.as_array().unwrap();
    assert_eq!(stages.len(), 4);

    let script = &stages[0];
    assert_eq!(script["stage"], "script");
    assert_eq!(script["alive"], true);
    assert_eq!(script["source"], "heartbeat");
    assert_eq!(script["workers"], serde_json::json!(["script-1"]));

    let video = &stages[2];
    assert_eq!(video["stage"], "video");
    assert_eq!(video["heartbeat_alive"], false);
    assert_eq!(video["heuristic_alive"], true);
    assert_eq!(video["source"], "in_flight_job");

    let upload = &stages[3];
    assert_eq!(upload["alive"], false);
    assert_eq!(upload["source"], "none");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn recently_finished_stage_keeps_heuristic_alive(pool: PgPool) {
    let id = create_job(&pool, "done").await;
    sqlx::query(
        "UPDATE video_jobs SET script = 's', voiceover_url = 'v', status = 'completed', \
         sub_status = 'uploading_voiceover', sub_status_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(&pool)
    .await
    .unwrap();

    let response = get(build_test_app(pool), "/api/v1/status/workers").await;
    let stages = body_json(response).await["data"]["stages"].clone();

    let voiceover = &stages[1];
    assert_eq!(voiceover["stage"], "voiceover");
    assert_eq!(voiceover["alive"], true);
    assert_eq!(voiceover["in_flight_jobs"], 0);
    assert_eq!(voiceover["source"], "recent_sub_status");
}

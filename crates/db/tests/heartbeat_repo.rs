//! Integration tests for worker heartbeats.

use autotube_core::action::Stage;
use autotube_core::liveness::heartbeat_is_fresh;
use autotube_db::repositories::HeartbeatRepo;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_register_then_beat_accumulates(pool: PgPool) {
    let hb = HeartbeatRepo::register(&pool, "voiceover-1", Stage::Voiceover, 30)
        .await
        .unwrap();
    assert_eq!(hb.jobs_processed, 0);
    assert_eq!(hb.stage, "voiceover");

    HeartbeatRepo::beat(&pool, "voiceover-1", Stage::Voiceover, 30, 2).await.unwrap();
    HeartbeatRepo::beat(&pool, "voiceover-1", Stage::Voiceover, 30, 1).await.unwrap();

    let rows = HeartbeatRepo::list(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].jobs_processed, 3);

    let sample = rows[0].to_sample().unwrap();
    assert_eq!(sample.stage, Stage::Voiceover);
    assert!(heartbeat_is_fresh(sample.last_seen_at, sample.ttl_secs, chrono::Utc::now()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_register_resets_counter(pool: PgPool) {
    HeartbeatRepo::beat(&pool, "script-1", Stage::Script, 30, 5).await.unwrap();
    let hb = HeartbeatRepo::register(&pool, "script-1", Stage::Script, 30).await.unwrap();
    assert_eq!(hb.jobs_processed, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remove(pool: PgPool) {
    HeartbeatRepo::register(&pool, "upload-1", Stage::Upload, 30).await.unwrap();
    assert!(HeartbeatRepo::remove(&pool, "upload-1").await.unwrap());
    assert!(!HeartbeatRepo::remove(&pool, "upload-1").await.unwrap());
    assert!(HeartbeatRepo::list(&pool).await.unwrap().is_empty());
}

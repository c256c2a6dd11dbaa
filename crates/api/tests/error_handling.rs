//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server or
//! database is needed.

use autotube_api::error::AppError;
use autotube_core::action::{PendingAction, PipelineAction, Stage};
use autotube_core::error::CoreError;
use autotube_core::job_status::JobStatus;
use autotube_core::state_machine::{
    ActionRejection, BatchRejection, DependencyField, JobRejection, RejectionKind,
};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound { entity: "Job", id: 42 });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with id 42 not found");
}

#[tokio::test]
async fn jobs_not_found_lists_ids() {
    let err = AppError::Core(CoreError::JobsNotFound { ids: vec![3, 9] });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["job_ids"], serde_json::json!([3, 9]));
    assert_eq!(json["error"], "Jobs not found: 3, 9");
}

#[tokio::test]
async fn invalid_action_returns_400() {
    let err = AppError::Core(CoreError::InvalidAction("make_coffee".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_ACTION");
}

#[tokio::test]
async fn missing_dependency_returns_422_with_details() {
    let err = AppError::Rejected(BatchRejection {
        action: PipelineAction::CreateVideo,
        kind: RejectionKind::MissingDependency,
        rejections: vec![JobRejection {
            job_id: 7,
            rejection: ActionRejection::MissingDependencies {
                missing: vec![DependencyField::Script, DependencyField::VoiceoverUrl],
            },
        }],
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "MISSING_DEPENDENCY");
    assert_eq!(
        json["error"],
        "Job 7: missing dependencies: script, voiceover_url"
    );
    assert_eq!(json["details"][0]["job_id"], 7);
    assert_eq!(
        json["details"][0]["missing_fields"],
        serde_json::json!(["script", "voiceover_url"])
    );
}

#[tokio::test]
async fn processing_rejection_returns_409_without_missing_fields() {
    let err = AppError::Rejected(BatchRejection {
        action: PipelineAction::RunAll,
        kind: RejectionKind::AlreadyProcessing,
        rejections: vec![JobRejection {
            job_id: 1,
            rejection: ActionRejection::AlreadyProcessing {
                status: JobStatus::Pending,
                pending: Some(PendingAction::RunAll { next: Stage::Video }),
            },
        }],
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_PROCESSING");
    assert!(json["details"][0].get("missing_fields").is_none());
}

#[tokio::test]
async fn database_errors_are_sanitized() {
    let err = AppError::Database(sqlx::Error::PoolTimedOut);
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

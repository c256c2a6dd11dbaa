use autotube_core::error::CoreError;
use autotube_core::state_machine::{BatchRejection, RejectionKind};
use autotube_core::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `autotube_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The artifact store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An action request was refused for one or more jobs.
    #[error("{}", .0.message())]
    Rejected(BatchRejection),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra: Option<(&'static str, Value)> = None;

        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::JobsNotFound { ids } => {
                    extra = Some(("job_ids", json!(ids)));
                    (StatusCode::NOT_FOUND, "NOT_FOUND", jobs_not_found_message(ids))
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::InvalidAction(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ACTION", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage error");
                internal()
            }

            AppError::Rejected(rejection) => {
                extra = Some(("details", rejection_details(rejection)));
                let (status, code) = rejection_status(rejection.kind);
                (status, code, rejection.message())
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let (Some((key, value)), Some(obj)) = (extra, body.as_object_mut()) {
            obj.insert(key.to_string(), value);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn jobs_not_found_message(ids: &[i64]) -> String {
    let list: Vec<String> = ids.iter().map(i64::to_string).collect();
    format!("Jobs not found: {}", list.join(", "))
}

/// HTTP status and error code for a rejection kind.
pub fn rejection_status(kind: RejectionKind) -> (StatusCode, &'static str) {
    match kind {
        RejectionKind::AlreadyProcessing => (StatusCode::CONFLICT, "ALREADY_PROCESSING"),
        RejectionKind::AlreadyQueued => (StatusCode::CONFLICT, "ALREADY_QUEUED"),
        RejectionKind::AlreadyComplete => (StatusCode::CONFLICT, "ALREADY_COMPLETE"),
        RejectionKind::StageNotApplicable => (StatusCode::CONFLICT, "STAGE_NOT_APPLICABLE"),
        RejectionKind::MissingDependency => {
            (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_DEPENDENCY")
        }
    }
}

fn rejection_details(rejection: &BatchRejection) -> Value {
    rejection
        .rejections
        .iter()
        .map(|r| {
            let mut entry = json!({
                "job_id": r.job_id,
                "reason": r.rejection.reason(),
            });
            if let (Some(missing), Some(obj)) =
                (r.rejection.missing_fields(), entry.as_object_mut())
            {
                obj.insert("missing_fields".into(), json!(missing));
            }
            entry
        })
        .collect()
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations map to 409.
/// - Check constraint violations map to 400.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            match db_err.code().as_deref() {
                Some("23505") => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                ),
                Some("23514") => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    format!("Value violates check constraint: {constraint}"),
                ),
                _ => {
                    tracing::error!(error = %db_err, "Database error");
                    internal()
                }
            }
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

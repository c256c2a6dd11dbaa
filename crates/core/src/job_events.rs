//! Job change-feed payloads and WebSocket message types.
//!
//! The `video_jobs` trigger publishes `{op, id, status}` on
//! [`JOB_CHANGES_CHANNEL`]; the API relays each notification to WebSocket
//! clients as a [`JobChangeMessage`].

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Postgres NOTIFY channel written by the `video_jobs` trigger.
pub const JOB_CHANGES_CHANNEL: &str = "video_job_changes";

/// A job row was inserted.
pub const MSG_TYPE_JOB_CREATED: &str = "job_created";

/// A job row was updated (status, outputs, sub-status, fields).
pub const MSG_TYPE_JOB_UPDATED: &str = "job_updated";

/// A job row was deleted.
pub const MSG_TYPE_JOB_DELETED: &str = "job_deleted";

/// Raw trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobChangeNotification {
    /// `INSERT`, `UPDATE`, or `DELETE`.
    pub op: String,
    pub id: DbId,
    pub status: Option<String>,
}

/// What WebSocket clients receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobChangeMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub job_id: DbId,
    pub status: Option<String>,
}

impl JobChangeNotification {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// The client message for this notification, `None` for unknown ops.
    pub fn to_message(&self) -> Option<JobChangeMessage> {
        let msg_type = match self.op.as_str() {
            "INSERT" => MSG_TYPE_JOB_CREATED,
            "UPDATE" => MSG_TYPE_JOB_UPDATED,
            "DELETE" => MSG_TYPE_JOB_DELETED,
            _ => return None,
        };
        Some(JobChangeMessage {
            msg_type,
            job_id: self.id,
            status: self.status.clone(),
        })
    }
}

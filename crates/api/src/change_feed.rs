//! Relays `video_jobs` change notifications to WebSocket clients.
//!
//! A trigger publishes `{op, id, status}` on [`JOB_CHANGES_CHANNEL`] for
//! every insert, update, and delete. The feed `LISTEN`s on that channel and
//! broadcasts each change as a [`JobChangeMessage`] JSON text frame.
//! Notifications lost while the listener reconnects are not replayed;
//! dashboards also poll.

use std::sync::Arc;
use std::time::Duration;

use autotube_core::job_events::{JobChangeNotification, JOB_CHANGES_CHANNEL};
use autotube_db::DbPool;
use axum::extract::ws::Message;
use sqlx::postgres::PgListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ws::Subscribers;

/// Delay before reconnecting after the listener fails.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Turn a raw notification payload into the text frame sent to clients.
/// Returns `None` for payloads that should not be forwarded.
pub fn frame_for_payload(payload: &str) -> Option<String> {
    let notification = match JobChangeNotification::parse(payload) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, payload, "Malformed job change notification");
            return None;
        }
    };
    let message = notification.to_message()?;
    serde_json::to_string(&message).ok()
}

pub struct ChangeFeed {
    pool: DbPool,
    subscribers: Arc<Subscribers>,
}

impl ChangeFeed {
    pub fn new(pool: DbPool, subscribers: Arc<Subscribers>) -> Self {
        Self { pool, subscribers }
    }

    /// Run the feed on a background task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            match self.listen(&cancel).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Job change listener failed, reconnecting");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        tracing::info!("Job change feed stopped");
    }

    /// Listen until cancelled (`Ok`) or the connection fails (`Err`).
    async fn listen(&self, cancel: &CancellationToken) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(JOB_CHANGES_CHANNEL).await?;
        tracing::info!(channel = JOB_CHANGES_CHANNEL, "Listening for job changes");

        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                n = listener.recv() => n?,
            };

            if let Some(frame) = frame_for_payload(notification.payload()) {
                let delivered = self.subscribers.publish(Message::Text(frame.into())).await;
                tracing::trace!(delivered, "Relayed job change");
            }
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use autotube_core::types::Timestamp;
use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often idle dashboard sockets are pinged.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

struct Subscriber {
    outbox: mpsc::UnboundedSender<Message>,
    joined_at: Timestamp,
}

/// Dashboard sockets listening to the job change feed, keyed by a
/// per-connection id. Share behind an `Arc`.
#[derive(Default)]
pub struct Subscribers {
    by_id: RwLock<HashMap<String, Subscriber>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and hand back its outbox. The socket task drains it.
    pub async fn subscribe(&self, id: String) -> mpsc::UnboundedReceiver<Message> {
        let (outbox, rx) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            outbox,
            joined_at: chrono::Utc::now(),
        };
        self.by_id.write().await.insert(id, subscriber);
        rx
    }

    pub async fn unsubscribe(&self, id: &str) {
        let removed = self.by_id.write().await.remove(id);
        if let Some(subscriber) = removed {
            let secs = (chrono::Utc::now() - subscriber.joined_at).num_seconds();
            tracing::debug!(subscriber = id, secs, "Unsubscribed from job feed");
        }
    }

    /// Queue `message` for every subscriber; returns how many accepted it.
    pub async fn publish(&self, message: Message) -> usize {
        let by_id = self.by_id.read().await;
        let mut delivered = 0;
        for subscriber in by_id.values() {
            if subscriber.outbox.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn len(&self) -> usize {
        self.by_id.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Tell every socket to close, then forget them all.
    pub async fn close_all(&self) {
        let drained: Vec<Subscriber> = self.by_id.write().await.drain().map(|(_, s)| s).collect();
        for subscriber in &drained {
            let _ = subscriber.outbox.send(Message::Close(None));
        }
        tracing::info!(count = drained.len(), "Closed job feed subscribers");
    }

    /// Ping every socket on [`KEEPALIVE_INTERVAL`] until `cancel` fires.
    pub fn spawn_keepalive(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let pinged = self.publish(Message::Ping(Bytes::new())).await;
                        tracing::debug!(pinged, "Job feed keepalive");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_skips_dropped_outboxes() {
        let subscribers = Subscribers::new();
        let mut live = subscribers.subscribe("live".into()).await;
        drop(subscribers.subscribe("gone".into()).await);

        let frame = Message::Text(r#"{"type":"job_updated"}"#.into());
        assert_eq!(subscribers.publish(frame.clone()).await, 1);
        assert_eq!(live.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn unsubscribe_forgets_the_socket() {
        let subscribers = Subscribers::new();
        let _rx = subscribers.subscribe("a".into()).await;
        subscribers.unsubscribe("a").await;
        subscribers.unsubscribe("a").await;
        assert!(subscribers.is_empty().await);
    }

    #[tokio::test]
    async fn close_all_sends_close_frames() {
        let subscribers = Subscribers::new();
        let mut rx = subscribers.subscribe("a".into()).await;
        subscribers.close_all().await;

        assert!(subscribers.is_empty().await);
        assert_eq!(rx.recv().await, Some(Message::Close(None)));
    }

    #[tokio::test]
    async fn keepalive_pings_until_cancelled() {
        // The first interval tick is immediate.
        let subscribers = Arc::new(Subscribers::new());
        let mut rx = subscribers.subscribe("a".into()).await;
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&subscribers).spawn_keepalive(cancel.clone());

        assert_eq!(rx.recv().await, Some(Message::Ping(Bytes::new())));
        cancel.cancel();
        handle.await.unwrap();
    }
}

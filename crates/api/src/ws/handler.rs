use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::state::AppState;
use crate::ws::Subscribers;

/// `GET /api/v1/ws`: subscribe to the job change feed.
///
/// The feed is one-way. Anything the dashboard sends besides Close and Pong
/// frames is dropped.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let feed = Arc::clone(&state.subscribers);
    ws.on_upgrade(move |socket| serve_subscriber(socket, feed))
}

async fn serve_subscriber(socket: WebSocket, feed: Arc<Subscribers>) {
    let subscriber = uuid::Uuid::new_v4().to_string();
    let outbox = feed.subscribe(subscriber.clone()).await;
    tracing::info!(subscriber = %subscriber, "Job feed subscriber joined");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(forward_outbox(subscriber.clone(), outbox, sink));
    read_until_closed(&subscriber, stream).await;

    feed.unsubscribe(&subscriber).await;
    writer.abort();
    tracing::info!(subscriber = %subscriber, "Job feed subscriber left");
}

/// Push queued feed messages to the socket. Stops after a Close frame or
/// once the peer is gone.
async fn forward_outbox(
    subscriber: String,
    mut outbox: UnboundedReceiver<Message>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(message) = outbox.recv().await {
        let is_close = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            tracing::debug!(subscriber = %subscriber, error = %e, "Job feed write failed");
            return;
        }
        if is_close {
            return;
        }
    }
}

async fn read_until_closed(subscriber: &str, mut stream: SplitStream<WebSocket>) {
    loop {
        match stream.next().await {
            None | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Pong(_))) => tracing::trace!(subscriber, "Pong"),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(subscriber, error = %e, "Job feed read failed");
                return;
            }
        }
    }
}

//! Live gaze stream over WebSocket
//!
//! Each connection registers a [`ChannelSubscriber`]. A writer task drains its
//! queue into the socket while the reader loop watches for the `STOP`
//! sentinel, a close frame or a receive error. Whichever side ends first,
//! the subscriber is deregistered.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::broadcast::{ChannelSubscriber, Payload, Subscriber};
use crate::protocol::ClientCommand;
use crate::ui::server::AppState;

/// How long the writer gets to flush and send a close frame
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why a viewer connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    StopRequested,
    ClientClosed,
    ReceiveError,
    SendFailed,
}

/// WebSocket upgrade for `/ws`
pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    let (subscriber, rx) = ChannelSubscriber::new("ws", state.subscriber_queue);
    let id = subscriber.id();
    let registry = state.controller.registry().clone();
    registry.add(Arc::new(subscriber));
    tracing::info!("WebSocket client {} connected", id);

    let mut writer = tokio::spawn(forward_samples(rx, sender));
    let mut writer_done = false;

    let reason = tokio::select! {
        reason = read_until_close(&mut receiver) => reason,
        _ = &mut writer => {
            writer_done = true;
            CloseReason::SendFailed
        }
    };

    // Dropping the registry's handle closes the queue, which lets the writer
    // flush and send a close frame.
    registry.remove(id);
    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!("WebSocket client {} disconnected ({:?})", id, reason);
}

/// Drain the subscriber queue into the socket
async fn forward_samples(mut rx: mpsc::Receiver<Payload>, mut sender: SplitSink<WebSocket, Message>) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = sender.send(Message::Text(payload.to_string())).await {
            tracing::debug!("WebSocket send failed: {}", e);
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
}

/// Read client frames until the viewer leaves
async fn read_until_close(receiver: &mut SplitStream<WebSocket>) -> CloseReason {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientCommand::parse(&text) {
                ClientCommand::Stop => return CloseReason::StopRequested,
                ClientCommand::Other(text) => {
                    tracing::debug!("Ignoring WebSocket message: {}", text);
                }
            },
            Ok(Message::Close(_)) => return CloseReason::ClientClosed,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                return CloseReason::ReceiveError;
            }
        }
    }
    CloseReason::ClientClosed
}

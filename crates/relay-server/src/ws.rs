//! WebSocket adapter: turns each socket into a registered participant
//! whose callback handle enqueues frames onto the connection's writer
//! task. Connection-loss detection lives here, not in the core.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use relay_core::{CallbackHandle, DeliveryError, ParticipantCallback};

use crate::config::AppState;
use crate::wire::{self, ClientFrame, ServerFrame};

/// Frames queued per connection before deliveries start failing. A
/// socket that stops draining hits this bound instead of growing the
/// queue forever.
pub const OUTBOUND_QUEUE: usize = 256;

/// Callback handle backed by the connection's outbound queue.
pub struct WsCallback {
    tx: mpsc::Sender<ServerFrame>,
}

impl WsCallback {
    pub fn new(tx: mpsc::Sender<ServerFrame>) -> Self {
        Self { tx }
    }

    fn send(&self, frame: ServerFrame) -> Result<(), DeliveryError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(DeliveryError::Transport("outbound queue full".to_string()))
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }
}

#[async_trait]
impl ParticipantCallback for WsCallback {
    async fn receive_message(&self, sender: &str, body: &str) -> Result<(), DeliveryError> {
        self.send(ServerFrame::Message {
            sender: sender.to_string(),
            body: body.to_string(),
        })
    }

    async fn receive_file(
        &self,
        sender: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<(), DeliveryError> {
        self.send(ServerFrame::File {
            sender: sender.to_string(),
            file_name: file_name.to_string(),
            data: wire::encode_bytes(data),
        })
    }

    async fn update_roster(&self, identities: &[String]) -> Result<(), DeliveryError> {
        self.send(ServerFrame::Roster {
            identities: identities.to_vec(),
        })
    }
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let identity = match expect_register(&mut stream).await {
        Some(identity) => identity,
        None => {
            let frame = ServerFrame::Error {
                message: "first frame must be register".to_string(),
            };
            let _ = send_frame(&mut sink, &frame).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if send_frame(&mut sink, &frame).await.is_err() {
                break;
            }
        }
    });

    let handle: CallbackHandle = Arc::new(WsCallback::new(tx.clone()));
    if let Err(e) = state.relay.register(&identity, handle).await {
        warn!(identity, error = %e, "registration rejected");
        let _ = tx.try_send(ServerFrame::Error {
            message: e.to_string(),
        });
        drop(tx);
        // let the writer drain the rejection before closing
        let _ = writer.await;
        return;
    }
    let _ = tx.try_send(ServerFrame::Registered);

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(identity, error = %e, "socket read error");
                break;
            }
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => dispatch(&state, &identity, frame).await,
                Err(e) => warn!(identity, error = %e, "ignoring malformed frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // covers both explicit leave and dropped connections
    state.relay.unregister(&identity).await;
}

async fn expect_register(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(message) = stream.next().await {
        match message.ok()? {
            Message::Text(text) => {
                return match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(ClientFrame::Register { identity }) => Some(identity),
                    _ => None,
                };
            }
            Message::Close(_) => return None,
            // ping/pong before registering is fine
            _ => continue,
        }
    }
    None
}

async fn dispatch(state: &AppState, identity: &str, frame: ClientFrame) {
    match frame {
        ClientFrame::Register { .. } => {
            warn!(identity, "duplicate register frame ignored");
        }
        ClientFrame::Message { body } => {
            state.relay.broadcast_message(identity, &body).await;
        }
        ClientFrame::File { file_name, data } => match wire::decode_bytes(&data) {
            Ok(bytes) => {
                if let Err(e) = state
                    .relay
                    .broadcast_file(identity, &file_name, &bytes)
                    .await
                {
                    error!(identity, file_name = %file_name, error = %e, "file broadcast failed");
                }
            }
            Err(e) => {
                warn!(identity, file_name = %file_name, error = %e, "ignoring file frame with invalid base64");
            }
        },
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "frame serialization failed");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}

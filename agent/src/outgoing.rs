//! Ordered delivery of outbound messages.
//!
//! Every response, error, and notification funnels through one writer task,
//! so a message is written atomically (one line, flushed) and write order
//! matches send order. The channel is bounded: a slow peer backpressures
//! turn emission instead of buffering without limit.

use serde::Serialize;
use tether_protocol::JsonRpcMessage;
use tether_protocol::RequestId;
use tether_protocol::SESSION_UPDATE_METHOD;
use tether_protocol::SessionNotification;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::codec::MessageWriter;

const OUTGOING_CHANNEL_CAPACITY: usize = 64;

pub(crate) struct OutgoingMessageSender {
    tx: mpsc::Sender<JsonRpcMessage>,
}

impl OutgoingMessageSender {
    /// Spawns the writer task; the returned handle resolves when the
    /// transport closes or fails.
    pub(crate) fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<JsonRpcMessage>(OUTGOING_CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move {
            let mut writer = MessageWriter::new(writer);
            while let Some(message) = rx.recv().await {
                if let Err(err) = writer.write_message(&message).await {
                    error!("failed to write outgoing message: {err}");
                    break;
                }
            }
            debug!("outgoing writer task finished");
        });
        (Self { tx }, handle)
    }

    pub(crate) async fn send_response(&self, id: RequestId, result: impl Serialize) {
        match serde_json::to_value(result) {
            Ok(result) => {
                self.send(JsonRpcMessage::response(id, result)).await;
            }
            Err(err) => {
                error!("failed to serialize response for request {id}: {err}");
            }
        }
    }

    pub(crate) async fn send_error(&self, id: RequestId, code: i64, message: String) {
        self.send(JsonRpcMessage::error(id, code, message)).await;
    }

    /// One-way turn-progress notification; not a response to any request.
    /// Returns false when the connection is gone.
    pub(crate) async fn send_session_update(&self, notification: SessionNotification) -> bool {
        match serde_json::to_value(&notification) {
            Ok(params) => {
                self.tx
                    .send(JsonRpcMessage::notification(SESSION_UPDATE_METHOD, params))
                    .await
                    .is_ok()
            }
            Err(err) => {
                error!("failed to serialize session update: {err}");
                false
            }
        }
    }

    async fn send(&self, message: JsonRpcMessage) {
        if self.tx.send(message).await.is_err() {
            debug!("outgoing channel closed; dropping message");
        }
    }
}

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::messages::{InboundFrame, OutboundFrame};
use crate::bridge::{BridgeManager, Session};

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text frame to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text frame from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketError::SendFailed(msg) => write!(f, "send failed: {}", msg),
            SocketError::ReceiveFailed(msg) => write!(f, "receive failed: {}", msg),
        }
    }
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(WsMessage::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // binary/ping/pong
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(WsMessage::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// A managed WebSocket connection bound to one attached session.
///
/// The replay snapshot goes out before the live channel is drained; the
/// channel has been buffering since attach, so the client sees history in
/// ascending sequence order followed by live messages with no gap and no
/// duplicate.
pub struct Connection {
    display_name: String,
    session: Session,
    socket: Box<dyn SocketWrapper>,
    bridge_manager: Arc<BridgeManager>,
}

impl Connection {
    pub fn new(
        display_name: String,
        session: Session,
        socket: Box<dyn SocketWrapper>,
        bridge_manager: Arc<BridgeManager>,
    ) -> Self {
        Self {
            display_name,
            session,
            socket,
            bridge_manager,
        }
    }

    /// Run the connection - replay, then send and receive until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        for message in std::mem::take(&mut self.session.replay) {
            self.send_frame(OutboundFrame::message(message)).await?;
        }

        loop {
            tokio::select! {
                // live messages (bridge -> client)
                delivered = self.session.receiver.recv() => {
                    match delivered {
                        Some(message) => {
                            self.send_frame(OutboundFrame::message(message)).await?
                        }
                        // channel closed: detached (slow consumer or shutdown)
                        None => break,
                    }
                }

                // inbound frames (client -> bridge)
                inbound = self.socket.receive_message() => {
                    match inbound {
                        Ok(Some(raw)) => self.handle_inbound(&raw).await?,
                        Ok(None) => break, // client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }

    async fn handle_inbound(&mut self, raw: &str) -> Result<(), SocketError> {
        let frame: InboundFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                // malformed frames stay isolated to this session
                warn!(
                    room_id = %self.session.room_id,
                    error = %err,
                    "Malformed inbound frame"
                );
                return self
                    .send_frame(OutboundFrame::error("malformed frame"))
                    .await;
            }
        };

        match self
            .bridge_manager
            .publish(
                &self.session.room_id,
                &self.display_name,
                &frame.text,
                Some(self.session.id),
            )
            .await
        {
            Ok(message) => {
                debug!(
                    room_id = %self.session.room_id,
                    sequence = message.sequence,
                    "Inbound frame published"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    room_id = %self.session.room_id,
                    error = %err,
                    "Publish failed for inbound frame"
                );
                // local fan-out already delivered; tell the publisher the
                // message may not have reached the bus or persistence
                self.send_frame(OutboundFrame::error(format!(
                    "message delivered locally but may not be durable: {}",
                    err
                )))
                .await
            }
        }
    }

    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), SocketError> {
        let encoded = frame
            .encode()
            .map_err(|e| SocketError::SendFailed(e.to_string()))?;
        self.socket.send_message(encoded).await
    }
}

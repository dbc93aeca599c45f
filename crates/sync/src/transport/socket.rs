//! `tokio-tungstenite` implementation of the persistent connection.
//!
//! After connecting, the socket is split into a sink and a stream managed
//! by two spawned tasks: the sender forwards queued [`ClientMessage`]s,
//! the reader decodes inbound frames into [`ServerMessage`]s. Lifecycle
//! transitions are reported on a separate channel so the connectivity
//! monitor can react without touching frame traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use callsheet_core::{ClientMessage, ServerMessage, SyncError};

use crate::connectivity::ConnectionEvent;
use crate::locks::LockTransport;

/// Receiving ends of the socket: decoded pushes plus lifecycle events.
pub struct SocketEvents {
    pub messages: mpsc::UnboundedReceiver<ServerMessage>,
    pub lifecycle: mpsc::UnboundedReceiver<ConnectionEvent>,
}

/// Handle to one persistent connection.
///
/// Cheap to share behind `Arc`; dropping the handle does not close the
/// connection, call [`close`](SocketClient::close) for that.
pub struct SocketClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl SocketClient {
    /// Open the connection and spawn the sender and reader tasks.
    ///
    /// An `Opened` event is emitted immediately; a single `Closed` event
    /// follows whenever the connection ends, however it ends.
    pub async fn connect(url: &str) -> Result<(Self, SocketEvents), SyncError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await.map_err(|err| {
            tracing::warn!(url, error = %err, "Socket connect failed");
            SyncError::ConnectionLost
        })?;

        let conn_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(conn_id = %conn_id, url, "Socket connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (message_tx, message_rx) = mpsc::unbounded_channel::<ServerMessage>();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel::<ConnectionEvent>();

        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let _ = lifecycle_tx.send(ConnectionEvent::Opened);

        // Sender task: serialize and forward queued client messages.
        let send_cancel = cancel.clone();
        let send_conn_id = conn_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = send_cancel.cancelled() => break,
                    queued = outbound_rx.recv() => {
                        let Some(message) = queued else { break };
                        let frame = match serde_json::to_string(&message) {
                            Ok(json) => Message::Text(json),
                            Err(err) => {
                                tracing::warn!(error = %err, "Unencodable client message dropped");
                                continue;
                            }
                        };
                        if sink.send(frame).await.is_err() {
                            tracing::debug!(conn_id = %send_conn_id, "Socket sink closed");
                            break;
                        }
                    }
                }
            }
        });

        // Reader task: decode inbound frames and report the close.
        let read_cancel = cancel.clone();
        let read_connected = connected.clone();
        let read_conn_id = conn_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = read_cancel.cancelled() => break,
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(message) => {
                                        let _ = message_tx.send(message);
                                    }
                                    Err(err) => {
                                        tracing::warn!(error = %err, "Undecodable server frame ignored");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {
                                tracing::trace!(conn_id = %read_conn_id, "Control frame");
                            }
                            Some(Err(err)) => {
                                tracing::debug!(conn_id = %read_conn_id, error = %err, "Socket receive error");
                                break;
                            }
                        }
                    }
                }
            }
            if read_connected.swap(false, Ordering::SeqCst) {
                let _ = lifecycle_tx.send(ConnectionEvent::Closed);
                tracing::info!(conn_id = %read_conn_id, "Socket disconnected");
            }
        });

        Ok((
            Self {
                outbound: outbound_tx,
                connected,
                cancel,
            },
            SocketEvents {
                messages: message_rx,
                lifecycle: lifecycle_rx,
            },
        ))
    }

    /// Close the connection and stop both tasks.
    pub fn close(&self) {
        self.cancel.cancel();
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl LockTransport for SocketClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: ClientMessage) -> Result<(), SyncError> {
        if !self.is_connected() {
            return Err(SyncError::ConnectionLost);
        }
        self.outbound
            .send(message)
            .map_err(|_| SyncError::ConnectionLost)
    }
}

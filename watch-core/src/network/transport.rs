//! Relay WebSocket transport
//!
//! One background task owns the socket. The engine talks to it through a
//! cloneable [`TransportHandle`] and hears back through a channel of
//! [`TransportEvent`]s. Reconnection is left to whoever owns the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::engine::Outbox;
use crate::sync::{encode, CodecError, Outbound};

/// Transport-related errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected to the relay")]
    NotConnected,

    #[error("Relay connection closed")]
    Closed,

    #[error("Failed to connect to relay: {0}")]
    Connect(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Connection lifecycle and inbound frames
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    /// One inbound text frame
    Message(String),
    Closed,
    Error(String),
}

/// Commands sent to the transport task
#[derive(Debug)]
enum TransportCommand {
    Send(String),
    Shutdown,
}

/// Handle to communicate with the running transport
#[derive(Clone)]
pub struct TransportHandle {
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    connected: Arc<AtomicBool>,
}

impl TransportHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue one text frame. Fails instead of buffering while disconnected.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.command_tx
            .send(TransportCommand::Send(text))
            .map_err(|_| TransportError::Closed)
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(TransportCommand::Shutdown);
    }
}

impl Outbox for TransportHandle {
    fn send(&self, frame: &Outbound) -> Result<(), TransportError> {
        self.send_text(encode(frame)?)
    }

    fn close(&self) {
        self.shutdown();
    }
}

/// Connects to the relay in a background task
pub struct RelayTransport {
    config: TransportConfig,
}

impl RelayTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Start connecting and return a handle plus the event stream.
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> (TransportHandle, mpsc::UnboundedReceiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let handle = TransportHandle {
            command_tx,
            connected: connected.clone(),
        };

        tokio::spawn(async move {
            self.run(event_tx, command_rx, connected).await;
        });

        (handle, event_rx)
    }

    async fn run(
        self,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        connected: Arc<AtomicBool>,
    ) {
        info!("Connecting to relay {}", self.config.relay_url);

        let ws_stream = match connect_async(self.config.relay_url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                let error = TransportError::Connect(e.to_string());
                warn!("{}", error);
                let _ = event_tx.send(TransportEvent::Error(error.to_string()));
                return;
            }
        };

        info!("Connected to relay");
        connected.store(true, Ordering::SeqCst);
        let _ = event_tx.send(TransportEvent::Opened);

        let (mut sink, mut stream) = ws_stream.split();
        let mut failure = None;

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        failure = Some(e.to_string());
                        break;
                    }
                },
                Some(command) = command_rx.recv() => match command {
                    TransportCommand::Send(text) => {
                        if let Err(e) = sink.send(Message::text(text)).await {
                            failure = Some(e.to_string());
                            break;
                        }
                    }
                    TransportCommand::Shutdown => {
                        debug!("Transport shutting down");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }

        connected.store(false, Ordering::SeqCst);
        match failure {
            Some(message) => {
                warn!("Relay connection failed: {}", message);
                let _ = event_tx.send(TransportEvent::Error(message));
            }
            None => {
                let _ = event_tx.send(TransportEvent::Closed);
            }
        }
    }
}

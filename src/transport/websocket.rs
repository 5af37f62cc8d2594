//! WebSocket adapter.
//!
//! Outbound messages are sent as text frames terminated by `\r\n`; every
//! inbound text frame is handed to the inbound sink as-is.
//!
//! # Event Loop
//!
//! The adapter spawns one tokio task that handles:
//!
//! - Incoming frames from the server
//! - Outgoing messages from [`Adapter::send`]
//! - Shutdown on [`Adapter::close`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::{Adapter, InboundSink, LINE_TERMINATOR};

// ============================================================================
// AdapterCommand
// ============================================================================

/// Internal commands for the event loop.
enum AdapterCommand {
    /// Send one message as a text frame.
    Send(String),
    /// Close the WebSocket.
    Shutdown,
}

// ============================================================================
// WebSocketAdapter
// ============================================================================

/// WebSocket transport adapter.
pub struct WebSocketAdapter {
    /// Channel to the event loop.
    command_tx: mpsc::UnboundedSender<AdapterCommand>,
    /// Set by `close`.
    closed: AtomicBool,
}

impl WebSocketAdapter {
    /// Connects to a `ws://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the handshake fails.
    pub async fn connect(url: &str, sink: InboundSink) -> Result<Self> {
        debug!(url, "Connecting WebSocket transport");

        let (ws_stream, _) = connect_async(url).await?;

        debug!(url, "WebSocket transport connected");
        Ok(Self::from_stream(ws_stream, sink))
    }

    /// Wraps an established WebSocket stream.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, sink: InboundSink) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, sink));

        Self {
            command_tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<AdapterCommand>,
        sink: InboundSink,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let text = text.as_str().to_owned();
                            trace!(rx = %text, "Received frame");
                            sink(text);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the connection
                command = command_rx.recv() => {
                    match command {
                        Some(AdapterCommand::Send(message)) => {
                            trace!(tx = %message, "Sending frame");
                            let frame = Message::Text(format!("{message}{LINE_TERMINATOR}").into());
                            if let Err(e) = ws_write.send(frame).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }

                        Some(AdapterCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        debug!("WebSocket event loop terminated");
    }
}

impl Adapter for WebSocketAdapter {
    fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        self.command_tx
            .send(AdapterCommand::Send(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.command_tx.send(AdapterCommand::Shutdown);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

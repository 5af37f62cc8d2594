//! Line-delimited TCP adapter.
//!
//! Each outbound message is written followed by `\r\n`. Inbound bytes are
//! read line by line; every non-blank line is handed to the inbound sink.
//! Lines that are not valid UTF-8 are logged and skipped.
//!
//! # Tasks
//!
//! The adapter spawns two tokio tasks:
//!
//! - a writer draining the command channel into the socket
//! - a reader forwarding lines to the [`InboundSink`]

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::{Adapter, InboundSink, LINE_TERMINATOR};

// ============================================================================
// WriterCommand
// ============================================================================

/// Internal commands for the writer task.
enum WriterCommand {
    /// Write one message.
    Send(String),
    /// Shut down the write half.
    Shutdown,
}

// ============================================================================
// SocketAdapter
// ============================================================================

/// TCP transport adapter.
pub struct SocketAdapter {
    /// Channel to the writer task.
    command_tx: mpsc::UnboundedSender<WriterCommand>,
    /// Reader task, aborted on close.
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Set by `close`.
    closed: AtomicBool,
    /// Remote address.
    peer: SocketAddr,
}

impl SocketAdapter {
    /// Connects to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connection fails.
    pub async fn connect(host: &str, port: u16, sink: InboundSink) -> Result<Self> {
        debug!(host, port, "Connecting socket transport");

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::connection(format!("{host}:{port}: {e}")))?;

        Self::from_stream(stream, sink)
    }

    /// Wraps an already-connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the peer address cannot be read.
    pub fn from_stream(stream: TcpStream, sink: InboundSink) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_writer(write_half, command_rx));
        let reader = tokio::spawn(Self::run_reader(read_half, sink));

        debug!(%peer, "Socket transport connected");

        Ok(Self {
            command_tx,
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
            peer,
        })
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn run_writer(
        write_half: OwnedWriteHalf,
        mut command_rx: mpsc::UnboundedReceiver<WriterCommand>,
    ) {
        let mut writer = BufWriter::new(write_half);

        while let Some(command) = command_rx.recv().await {
            match command {
                WriterCommand::Send(message) => {
                    trace!(tx = %message, "Sending message");

                    let result = async {
                        writer.write_all(message.as_bytes()).await?;
                        writer.write_all(LINE_TERMINATOR.as_bytes()).await?;
                        writer.flush().await
                    }
                    .await;

                    if let Err(e) = result {
                        warn!(error = %e, "Socket write failed");
                        break;
                    }
                }

                WriterCommand::Shutdown => {
                    let _ = writer.shutdown().await;
                    break;
                }
            }
        }

        debug!("Socket writer terminated");
    }

    async fn run_reader(read_half: OwnedReadHalf, sink: InboundSink) {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("Socket closed by remote");
                    break;
                }

                Ok(_) => {
                    let Ok(text) = std::str::from_utf8(&buf) else {
                        warn!(len = buf.len(), "Skipping non UTF-8 line");
                        continue;
                    };

                    let line = text.trim();
                    if line.is_empty() {
                        continue;
                    }

                    trace!(rx = %line, "Received message");
                    sink(line.to_string());
                }

                Err(e) => {
                    error!(error = %e, "Socket read failed");
                    break;
                }
            }
        }
    }
}

impl Adapter for SocketAdapter {
    fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        self.command_tx
            .send(WriterCommand::Send(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let _ = self.command_tx.send(WriterCommand::Shutdown);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }

        debug!(peer = %self.peer, "Socket transport closed");
        Ok(())
    }
}

impl Drop for SocketAdapter {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Connection management.

use crate::error::ClientError;
use arrowgate_core::Datum;
use arrowgate_protocol::{Decoder, Encoder, Incoming, DEFAULT_MAX_PAYLOAD};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Default read buffer size (16 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, covering the write and the complete response.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Largest frame payload accepted.
    pub max_payload: u64,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_payload(mut self, max: u64) -> Self {
        self.max_payload = max;
        self
    }
}

struct Channel {
    stream: TcpStream,
    decoder: Decoder,
}

/// A connection to an arrowgate server.
///
/// Every message yields exactly one frame or one reply line, in order, so a
/// request holds the channel from its write until its response is read.
pub struct Connection {
    config: ConnectionConfig,
    channel: Mutex<Option<Channel>>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        *self.channel.lock().await = Some(Channel {
            stream,
            decoder: Decoder::with_max_payload(self.config.max_payload),
        });
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Sends a raw command and waits for its response.
    pub async fn send_command(&self, command: &str) -> Result<Incoming, ClientError> {
        self.request(&Encoder::encode_command(command)).await
    }

    /// Sends a structured call `[operation, argument]` and waits for its
    /// response.
    pub async fn send_call(&self, operation: &str, argument: &Datum) -> Result<Incoming, ClientError> {
        let encoded = Encoder::encode_call(operation, &argument.to_json()?)?;
        self.request(&encoded).await
    }

    /// Sends an already encoded line and waits for its response.
    ///
    /// Any failure leaves the channel in an unknown position (a late reply
    /// or an unread frame may follow), so it is dropped and the next
    /// request needs a fresh [`connect`](Self::connect).
    pub async fn request(&self, line: &[u8]) -> Result<Incoming, ClientError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = tokio::time::timeout(self.config.request_timeout, async {
            channel.stream.write_all(line).await?;
            tracing::debug!("Sent {} bytes", line.len());
            Self::read_from(channel, self.config.read_buffer_size).await
        })
        .await
        .map_err(|_| ClientError::Timeout)
        .and_then(|r| r);

        if let Err(ref e) = result {
            self.discard(&mut guard, e);
        }
        result
    }

    /// Reads the next frame or reply line.
    pub async fn read_incoming(&self) -> Result<Incoming, ClientError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = tokio::time::timeout(
            self.config.request_timeout,
            Self::read_from(channel, self.config.read_buffer_size),
        )
        .await
        .map_err(|_| ClientError::Timeout)
        .and_then(|r| r);

        if let Err(ref e) = result {
            self.discard(&mut guard, e);
        }
        result
    }

    fn discard(&self, channel: &mut Option<Channel>, cause: &ClientError) {
        tracing::debug!("Dropping connection to {}: {}", self.config.addr, cause);
        self.connected.store(false, Ordering::SeqCst);
        *channel = None;
    }

    async fn read_from(channel: &mut Channel, buffer_size: usize) -> Result<Incoming, ClientError> {
        let mut buf = vec![0u8; buffer_size];
        loop {
            if let Some(incoming) = channel.decoder.decode()? {
                return Ok(incoming);
            }

            let n = channel.stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!(
                    "Connection closed with {} bytes buffered",
                    channel.decoder.buffered()
                );
                return Err(ClientError::ConnectionClosed);
            }
            tracing::debug!("Read {} bytes from socket", n);
            channel.decoder.extend(&buf[..n]);
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut channel) = self.channel.lock().await.take() {
            tracing::debug!("Shutting down connection");
            let _ = channel.stream.shutdown().await;
        }
        Ok(())
    }
}

//! TCP server implementation.

use crate::dispatcher::ConnectionDispatcher;
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::session::Session;
use arrowgate_protocol::{Encoder, Inbound, LineDecoder, ReplyLine, DEFAULT_MAX_LINE_BYTES};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum length of one inbound line.
    pub max_line_bytes: usize,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, arrowgate_protocol::DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 1000,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the maximum inbound line length.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub frames_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for arrowgate.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<ConnectionDispatcher>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, dispatcher: ConnectionDispatcher) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = match config.metrics {
            Some(ref metrics) => {
                metrics
                    .table_rows
                    .set(dispatcher.state().table.row_count() as f64);
                dispatcher.with_metrics(metrics.clone())
            }
            None => dispatcher,
        };
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Runs the server on an already bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let dispatcher = self.dispatcher.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    dispatcher,
                                    config.clone(),
                                    stats.clone(),
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);

                                if let Some(ref metrics) = config.metrics {
                                    metrics.connections_active.dec();
                                }

                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Handles a single connection.
    ///
    /// Messages on one connection are handled in arrival order, one at a
    /// time, so frames and reply lines never interleave.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        dispatcher: Arc<ConnectionDispatcher>,
        config: ServerConfig,
        stats: Arc<ServerStats>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let session = Session::new(addr);
        let mut decoder = LineDecoder::with_max_line(config.max_line_bytes);
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!(
                                "[{}] Connection closed by client ({} requests, {} frames)",
                                addr,
                                session.request_count(),
                                session.frames_sent()
                            );
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            session.touch();
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(config.idle_timeout) => {
                    if session.idle_duration() >= config.idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            while let Some(line) = decoder.decode_line()? {
                let message = Inbound::parse(&line);
                let kind = message.kind();
                let request_no = session.record_request();
                stats.requests_total.fetch_add(1, Ordering::Relaxed);

                let started = Instant::now();
                let outcome = dispatcher.handle(&mut stream, message).await;
                let elapsed = started.elapsed();

                if let Some(ref metrics) = config.metrics {
                    metrics.requests_total.with_label_values(&[kind]).inc();
                    metrics
                        .request_duration
                        .with_label_values(&[kind])
                        .observe(elapsed.as_secs_f64());
                }

                let reply_line = match outcome {
                    Ok(reply) => {
                        if reply.is_sent() {
                            stats.frames_total.fetch_add(1, Ordering::Relaxed);
                            session.record_frame();
                        }
                        tracing::info!(
                            "[{}] Request #{}: {} -> {} ({:?})",
                            addr,
                            request_no,
                            kind,
                            if reply.is_sent() { "FRAME" } else { "REPLY" },
                            elapsed
                        );
                        reply.into_line()
                    }
                    Err(e) => {
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        if let Some(ref metrics) = config.metrics {
                            metrics
                                .errors_total
                                .with_label_values(&[e.error_code().as_str()])
                                .inc();
                        }
                        if e.is_fatal() {
                            tracing::warn!("[{}] Request #{}: {} failed: {}", addr, request_no, kind, e);
                            return Err(e.into());
                        }
                        tracing::info!(
                            "[{}] Request #{}: {} -> ERROR {}",
                            addr,
                            request_no,
                            kind,
                            e.error_code()
                        );
                        Some(ReplyLine::error(e.error_code(), e.to_string()))
                    }
                };

                if let Some(reply_line) = reply_line {
                    let bytes = Encoder::encode_reply(&reply_line)?;
                    tracing::debug!("[{}] Writing {} bytes", addr, bytes.len());
                    stream.write_all(&bytes).await?;
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns a receiver notified on shutdown.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

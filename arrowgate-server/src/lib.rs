//! # arrowgate-server
//!
//! TCP server for arrowgate.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Frame building from a table and serialization options
//! - Dispatch of raw commands and structured calls
//! - Session bookkeeping and idle timeouts
//! - Configuration loading and Prometheus metrics

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame_builder;
pub mod metrics;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, MetricsConfig, NetworkConfig, TableConfig};
pub use dispatcher::{ConnectionDispatcher, ServerState};
pub use error::{DispatchError, ServerError};
pub use frame_builder::build_frame;
pub use metrics::Metrics;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;

//! # arrowgate-client
//!
//! Async client library for arrowgate.
//!
//! # Example
//!
//! ```rust,no_run
//! use arrowgate_client::{Client, ConnectionConfig};
//! use arrowgate_core::Datum;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new("127.0.0.1:5001".parse()?);
//!     let client = Client::new(config);
//!     client.connect().await?;
//!
//!     let table = client.fetch_table().await?;
//!     println!("{} rows", table.row_count());
//!
//!     let head = client.call("head", &Datum::scalar(10)).await?;
//!     println!("{:?}", head);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod retry;

pub use client::{CallOutcome, Client};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use retry::RetryPolicy;
